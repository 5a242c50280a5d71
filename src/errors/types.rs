use thiserror::Error;

/// Every failure the synchronization layer can report.
///
/// The type is `Clone` because a single in-flight read is shared by every
/// consumer waiting on the same query key, and each of them receives the
/// same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// No response was received. The detail is logged, never shown.
    #[error("Network error")]
    Network(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Message shown in the transient notification for this failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(err: serde_yaml::Error) -> Self {
        ClientError::Config(format!("YAML error: {}", err))
    }
}
