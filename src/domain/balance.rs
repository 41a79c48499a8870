use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Cents, EngineError, Expense, Friend, FriendId};

/// Net position of every friend: positive means they are owed money, negative means they owe.
/// Ordered by friend id so that anything iterating it is reproducible.
pub type Balances = BTreeMap<FriendId, Cents>;

/// What to do with payer or participant ids that are not in the friend list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownIdPolicy {
    /// Keep a balance entry under the unknown id.
    #[default]
    Record,
    /// Fail with `EngineError::UnknownParticipant`.
    Reject,
}

impl UnknownIdPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownIdPolicy::Record => "record",
            UnknownIdPolicy::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "record" => Some(UnknownIdPolicy::Record),
            "reject" => Some(UnknownIdPolicy::Reject),
            _ => None,
        }
    }
}

/// Compute every friend's net balance from the expense ledger.
/// Ids that don't belong to a known friend still get an entry.
pub fn compute_balances(friends: &[Friend], expenses: &[Expense]) -> Result<Balances, EngineError> {
    compute_balances_with(friends, expenses, UnknownIdPolicy::Record)
}

/// Compute balances, handling unknown ids according to `policy`.
///
/// The payer is credited with the full amount and each participant is debited
/// their share, so every expense nets to zero. Friends without expenses appear
/// with a zero balance.
pub fn compute_balances_with(
    friends: &[Friend],
    expenses: &[Expense],
    policy: UnknownIdPolicy,
) -> Result<Balances, EngineError> {
    let mut balances: Balances = friends.iter().map(|friend| (friend.id, 0)).collect();
    let known: BTreeSet<FriendId> = balances.keys().copied().collect();

    for expense in expenses {
        let shares = expense.shares()?;

        let check_known = |friend_id: FriendId| -> Result<(), EngineError> {
            if known.contains(&friend_id) {
                return Ok(());
            }
            match policy {
                UnknownIdPolicy::Record => {
                    tracing::warn!(
                        expense_id = %expense.id,
                        friend_id = %friend_id,
                        "expense references unknown friend, keeping its balance"
                    );
                    Ok(())
                }
                UnknownIdPolicy::Reject => Err(EngineError::UnknownParticipant {
                    expense_id: expense.id,
                    friend_id,
                }),
            }
        };

        check_known(expense.payer_id)?;
        credit(&mut balances, expense.payer_id, expense.amount_cents)?;

        for (participant_id, share) in shares {
            check_known(participant_id)?;
            credit(&mut balances, participant_id, -share)?;
        }
    }

    tracing::debug!(
        friends = friends.len(),
        expenses = expenses.len(),
        entries = balances.len(),
        "computed balances"
    );

    Ok(balances)
}

/// Sum of all balances, widened so that large balances can't overflow it.
/// Zero for any map produced by `compute_balances`.
pub fn total_balance(balances: &Balances) -> i128 {
    balances.values().map(|balance| i128::from(*balance)).sum()
}

fn credit(balances: &mut Balances, friend_id: FriendId, amount: Cents) -> Result<(), EngineError> {
    let entry = balances.entry(friend_id).or_insert(0);
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| EngineError::InvalidArgument("balance overflows".to_string()))?;
    Ok(())
}
