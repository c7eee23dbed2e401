//! Error types for FerroCache

use thiserror::Error;

/// Main error type for FerroCache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while turning a request line into a command.
///
/// The `Display` text is what the client sees after `ERROR: `.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No command specified")]
    EmptyCommand,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Not enough arguments for {0}")]
    NotEnoughArguments(&'static str),

    #[error("Incorrect number of arguments for {0}")]
    WrongArity(&'static str),

    #[error("Invalid expire value")]
    InvalidExpire,

    #[error("syntax error near '{0}'")]
    SyntaxError(String),

    #[error("Command line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Command line too long")]
    LineTooLong,
}

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("value is not an integer or out of range")]
    NotInteger,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(String),

    #[error("Snapshot decoding error: {0}")]
    Decoding(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
