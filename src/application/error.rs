use thiserror::Error;

use crate::domain::{Cents, EngineError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Friend not found: {0}")]
    FriendNotFound(String),

    #[error("A friend named '{0}' already exists")]
    FriendAlreadyExists(String),

    #[error("Invalid friend name: {0}")]
    InvalidName(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Expense already exists: {0}")]
    ExpenseAlreadyExists(String),

    #[error("Invalid amount: {0} cents (must be positive)")]
    InvalidAmount(Cents),

    #[error("Description cannot be empty")]
    InvalidDescription,

    #[error("At least one participant must be selected")]
    NoParticipants,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
