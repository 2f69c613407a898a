//! Error types for netspoof

use thiserror::Error;

/// Result type alias for netspoof operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type shared by every netspoof crate
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol-specific error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Start requested on a module that is already running
    #[error("Module {0} is already running")]
    AlreadyStarted(String),

    /// Stop requested on a module that is not running
    #[error("Module {0} is not running")]
    AlreadyStopped(String),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Unknown parameter name
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A target expression item that is neither an address, a MAC nor an alias
    #[error("Invalid target '{0}'")]
    InvalidTarget(String),

    /// Alias not present in the session alias table
    #[error("Unknown alias '{0}'")]
    UnknownAlias(String),

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Capture error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unknown module or command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl Error {
    /// Create a protocol error with a custom message
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error::NotFound(what.into())
    }

    /// True for the already-started / already-stopped kind, which callers
    /// treat as a harmless no-op rather than a failure.
    pub fn is_idempotency(&self) -> bool {
        matches!(self, Error::AlreadyStarted(_) | Error::AlreadyStopped(_))
    }
}
