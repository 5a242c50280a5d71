use super::types::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ClientError {
    /// Classify this error so a caller can decide on its own retry policy.
    /// Nothing in this crate retries.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            ClientError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ClientError::Http { status, .. } if *status >= 500 || *status == 429 => {
                ErrorClassification {
                    error_type: "HttpError",
                    retryable: true,
                }
            }

            // Non-retryable errors
            ClientError::Http { .. } => ErrorClassification {
                error_type: "HttpError",
                retryable: false,
            },
            ClientError::Decode(_) => ErrorClassification {
                error_type: "DecodeError",
                retryable: false,
            },
            ClientError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            ClientError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
            },
            ClientError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ClientError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: false,
            },
            ClientError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }

    /// Whether this failure is surfaced as a transient notification.
    /// Validation and startup failures are handled where they occur.
    pub fn is_notified(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::Http { .. }
                | ClientError::Decode(_)
                | ClientError::Authentication(_)
        )
    }
}
