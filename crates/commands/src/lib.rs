//! Operator commands.
//!
//! Lines typed at the console are parsed into a [`Command`] and run against
//! the [`beacon_gateway::ConnectionSupervisor`] by a [`Console`], which
//! renders a one-message reply.

pub mod console;
pub mod error;
pub mod parse;

pub use {
    console::Console,
    error::CommandError,
    parse::{Command, parse, parse_target},
};
