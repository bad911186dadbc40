use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    UserCancelled,
    Configuration,
    Network,
    StoreProblem,
    Unknown,
}

/// Failure reported by the entitlement store for a request/response call.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn user_cancelled() -> Self {
        Self::new(
            StoreErrorKind::UserCancelled,
            "purchase was cancelled by the user",
        )
    }

    pub fn is_user_cancelled(&self) -> bool {
        matches!(self.kind, StoreErrorKind::UserCancelled)
    }
}
