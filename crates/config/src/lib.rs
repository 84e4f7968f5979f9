//! Configuration loading for beacon.
//!
//! Config files are discovered as `beacon.{toml,yaml,yml,json}`, `${VAR}`
//! placeholders are substituted from the process environment, and finally the
//! legacy environment variables (`USER_TOKENS`, `STATUS`, ...) are overlaid.

pub mod env_overlay;
pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    env_overlay::apply_env_overlay,
    loader::{CONFIG_FILENAMES, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        BeaconConfig, ClientProperties, ConsoleConfig, GatewayConfig, PresenceConfig,
        ServerConfig,
    },
};
