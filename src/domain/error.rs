use thiserror::Error;

/// Failures raised by domain setters and persist-time validation.
///
/// The display text is the user-facing message; callers surface it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The acting user lacks the permission a setter requires.
    #[error("{message}")]
    Permission { message: String },
    /// A setter received a value it cannot accept.
    #[error("{message}")]
    Value { message: String },
    /// The staged entity failed validation before it was written.
    #[error("{message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::Value {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Permission { message } | Self::Value { message } | Self::Validation { message } => {
                message
            }
        }
    }
}
