//! Error types for redmine-mcp.

use thiserror::Error;

/// Main error type for redmine-mcp operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced an HTTP response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Redmine answered with a non-success status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Tool arguments did not match the declared schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool name was registered twice
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing a transport stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Build the transport failure for a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether Redmine reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type alias for redmine-mcp operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        let err = Error::from_status(422, "{\"errors\":[\"Subject cannot be blank\"]}");
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("Subject cannot be blank"));
    }

    #[test]
    fn test_not_found() {
        let err = Error::from_status(404, "");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_non_api_errors_have_no_status() {
        assert_eq!(Error::Http("connection refused".into()).status(), None);
        assert_eq!(Error::Config("missing".into()).status(), None);
        assert!(!Error::InvalidData("bad".into()).is_not_found());
    }
}
