// Error types for the Girder framework

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Request-time failures. These are produced by formatters and readers and
    // converted into model-state entries at the binder boundary.
    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Request aborted by the client")]
    RequestAborted,

    #[error("Request body has already been consumed")]
    BodyConsumed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Startup-time failures. Always fatal.
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Invalid attribute '{attribute}' on '{target}': {reason}")]
    InvalidAttribute {
        attribute: String,
        target: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnsupportedMediaType(_) | Error::UnsupportedEncoding(_) => 415,
            Error::Deserialization(_) | Error::BodyConsumed => 400,
            Error::PayloadTooLarge(_) => 413,
            // Non-standard, but what proxies report for a client that hung up
            Error::RequestAborted => 499,
            Error::Io(_)
            | Error::Discovery(_)
            | Error::InvalidAttribute { .. }
            | Error::Configuration(_)
            | Error::Filter(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }

    /// Whether this error happened while discovering controllers at startup.
    pub fn is_discovery_error(&self) -> bool {
        matches!(self, Error::Discovery(_) | Error::InvalidAttribute { .. })
    }
}
