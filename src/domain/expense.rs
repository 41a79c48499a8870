use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, EngineError, FriendId, split_evenly};

pub type ExpenseId = Uuid;

/// A shared cost: one friend paid the full amount on behalf of the participants,
/// who split it in equal shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    /// Amount in cents (always positive for a valid expense)
    pub amount_cents: Cents,
    /// Friend who fronted the money
    pub payer_id: FriendId,
    /// Friends sharing the cost, in the order they were listed (no duplicates)
    pub participant_ids: Vec<FriendId>,
    /// Calendar date the expense happened
    pub date: NaiveDate,
    /// When we recorded this expense in the system
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Create a new expense. Duplicate participants are dropped, keeping the first occurrence.
    pub fn new(
        description: impl Into<String>,
        amount_cents: Cents,
        payer_id: FriendId,
        participant_ids: Vec<FriendId>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount_cents,
            payer_id,
            participant_ids: dedup_preserving_order(participant_ids),
            date,
            created_at: Utc::now(),
        }
    }

    /// Keep the identity of an existing record (used when editing or importing).
    pub fn with_id(mut self, id: ExpenseId) -> Self {
        self.id = id;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Check the invariants the balance computation relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.amount_cents <= 0 {
            return Err(EngineError::InvalidExpense {
                expense_id: self.id,
                reason: format!("amount must be positive, got {} cents", self.amount_cents),
            });
        }
        if self.participant_ids.is_empty() {
            return Err(EngineError::InvalidExpense {
                expense_id: self.id,
                reason: "expense has no participants".to_string(),
            });
        }
        Ok(())
    }

    /// Returns true if the friend paid for or shares this expense.
    pub fn involves(&self, friend_id: FriendId) -> bool {
        self.payer_id == friend_id || self.participant_ids.contains(&friend_id)
    }

    /// Each participant paired with the share they owe.
    /// Shares sum exactly to the amount; earlier participants absorb leftover cents.
    pub fn shares(&self) -> Result<Vec<(FriendId, Cents)>, EngineError> {
        self.validate()?;
        let shares = split_evenly(self.amount_cents, self.participant_ids.len()).ok_or_else(
            || EngineError::InvalidExpense {
                expense_id: self.id,
                reason: "expense has no participants".to_string(),
            },
        )?;
        Ok(self
            .participant_ids
            .iter()
            .copied()
            .zip(shares)
            .collect())
    }

    /// The share owed by a participant, or None if the friend does not participate.
    pub fn share_of(&self, friend_id: FriendId) -> Option<Cents> {
        self.shares()
            .ok()?
            .into_iter()
            .find(|(id, _)| *id == friend_id)
            .map(|(_, share)| share)
    }

    /// The expense as it looks once a friend leaves the group.
    ///
    /// The friend is dropped from the participants. Returns None when the
    /// expense should disappear: the friend paid for it, or nobody is left to share it.
    pub fn without_friend(&self, friend_id: FriendId) -> Option<Expense> {
        if self.payer_id == friend_id {
            return None;
        }
        let participant_ids: Vec<FriendId> = self
            .participant_ids
            .iter()
            .copied()
            .filter(|id| *id != friend_id)
            .collect();
        if participant_ids.is_empty() {
            return None;
        }
        Some(Expense {
            participant_ids,
            ..self.clone()
        })
    }
}

fn dedup_preserving_order(ids: Vec<FriendId>) -> Vec<FriendId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
