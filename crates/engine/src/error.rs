//! The module contains the errors the engine can throw.
//!
//! Business-rule failures map to a dedicated variant carrying a human-readable
//! message. Store failures never leak as raw [`DbErr`]s: transient ones become
//! [`Unavailable`], conflicting writes become [`ConcurrentModification`] and
//! everything else is wrapped in [`Database`].
//!
//!  [`Unavailable`]: EngineError::Unavailable
//!  [`ConcurrentModification`]: EngineError::ConcurrentModification
//!  [`Database`]: EngineError::Database
use std::mem::discriminant;

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Insufficient holdings: {0}")]
    InsufficientHoldings(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Not owner: {0}")]
    NotOwner(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Exceeds max amount: {0}")]
    ExceedsMaxAmount(String),
    #[error("Already paid: {0}")]
    AlreadyPaid(String),
    #[error("Not a recipient: {0}")]
    NotARecipient(String),
    #[error("Fund closed: {0}")]
    FundClosed(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Empty recipient set: {0}")]
    EmptyRecipientSet(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(DbErr),
}

impl EngineError {
    /// Returns `true` when the same call may succeed if issued again.
    ///
    /// The engine never retries money movements on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ConcurrentModification(_))
    }
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::Unavailable(err.to_string()),
            DbErr::RecordNotUpdated => {
                Self::ConcurrentModification("row changed while updating".to_string())
            }
            DbErr::Exec(_) | DbErr::Query(_) if is_busy(&err) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}

// SQLite reports lock contention as a plain execution error.
fn is_busy(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("database is locked") || message.contains("database is busy")
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other) && self.to_string() == other.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_not_updated_is_a_concurrent_modification() {
        let err = EngineError::from(DbErr::RecordNotUpdated);
        assert!(matches!(err, EngineError::ConcurrentModification(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn custom_store_errors_are_not_retryable() {
        let err = EngineError::from(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, EngineError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn equality_compares_kind_and_message() {
        assert_eq!(
            EngineError::AlreadyPaid("bill".to_string()),
            EngineError::AlreadyPaid("bill".to_string())
        );
        assert_ne!(
            EngineError::AlreadyPaid("bill".to_string()),
            EngineError::NotARecipient("bill".to_string())
        );
    }
}
