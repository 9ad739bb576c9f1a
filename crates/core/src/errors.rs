use thiserror::Error;

use crate::flows::DialogTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    DialogTransition(#[from] DialogTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Failure that escaped every typed error path, such as a panicking handler.
    pub fn internal(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), correlation_id: correlation_id.into() }
    }

    /// Short text that is safe to show to any user of the bot.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "⚠️ An error occurred. Please try again with /start",
            Self::Internal { .. } => "⚠️ An error occurred. Please try again later.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        match self {
            ApplicationError::Domain(DomainError::DialogTransition(_))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                InterfaceError::BadRequest {
                    message: "dialog validation failed".to_owned(),
                    correlation_id: correlation_id.into(),
                }
            }
        }
    }
}
