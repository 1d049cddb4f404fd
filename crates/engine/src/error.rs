//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a business rule on the input is violated
//!   (sum mismatch, invalid enum value, future date, missing split field).
//! - [`Unauthorized`] thrown when the acting user is not allowed to perform
//!   the operation (wrong settlement actor, non-member of a group).
//! - [`InvalidState`] thrown when a settlement or expense is not in a state
//!   that allows the transition.
//! - [`KeyNotFound`] thrown when an item are not found.
//! - [`ExistingKey`] thrown when creating an item that already exists.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Unauthorized`]: EngineError::Unauthorized
//!  [`InvalidState`]: EngineError::InvalidState
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already exists!")]
    ExistingKey(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
