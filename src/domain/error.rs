use thiserror::Error;

use super::{Cents, ExpenseId, FriendId};

/// Failures raised by the balance and settlement computations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid expense {expense_id}: {reason}")]
    InvalidExpense { expense_id: ExpenseId, reason: String },

    #[error("Balances do not sum to zero: total {total} cents exceeds tolerance {tolerance} cents")]
    ConservationViolation { total: Cents, tolerance: Cents },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Expense {expense_id} references unknown friend {friend_id}")]
    UnknownParticipant {
        expense_id: ExpenseId,
        friend_id: FriendId,
    },
}
