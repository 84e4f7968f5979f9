use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(
        "usage: status <status> [token]. Status is one of online, idle, dnd or invisible; \
         the optional token is a 1-based number, a number word or the raw value"
    )]
    MissingStatus,

    #[error(transparent)]
    Gateway(#[from] beacon_gateway::Error),
}
