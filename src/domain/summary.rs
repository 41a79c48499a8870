use serde::{Deserialize, Serialize};

use super::{Balances, Cents, EngineError, Expense, Friend, FriendId, Settlement, is_settled};

/// Label used when a settlement refers to a friend that is not in the list.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceStatus {
    /// Owed money by the group
    ToReceive,
    /// Owes money to the group
    ToPay,
    Settled,
}

impl BalanceStatus {
    pub fn from_balance(balance: Cents) -> Self {
        if is_settled(balance) {
            BalanceStatus::Settled
        } else if balance > 0 {
            BalanceStatus::ToReceive
        } else {
            BalanceStatus::ToPay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::ToReceive => "to-receive",
            BalanceStatus::ToPay => "to-pay",
            BalanceStatus::Settled => "settled",
        }
    }

    /// Human-readable label for tables.
    pub fn label(&self) -> &'static str {
        match self {
            BalanceStatus::ToReceive => "To Receive",
            BalanceStatus::ToPay => "To Pay",
            BalanceStatus::Settled => "Settled",
        }
    }
}

impl std::fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A friend together with their balance, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendSummary {
    pub id: FriendId,
    pub name: String,
    pub balance: Cents,
    pub status: BalanceStatus,
}

/// A settlement with the names of both parties resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSettlement {
    pub from: FriendId,
    pub from_name: String,
    pub to: FriendId,
    pub to_name: String,
    pub amount_cents: Cents,
}

/// One summary per friend, in the order the friends were given.
pub fn build_summaries(friends: &[Friend], balances: &Balances) -> Vec<FriendSummary> {
    friends
        .iter()
        .map(|friend| {
            let balance = balances.get(&friend.id).copied().unwrap_or(0);
            FriendSummary {
                id: friend.id,
                name: friend.name.clone(),
                balance,
                status: BalanceStatus::from_balance(balance),
            }
        })
        .collect()
}

/// Total amount spent across all expenses.
pub fn build_total(expenses: &[Expense]) -> Result<Cents, EngineError> {
    expenses.iter().try_fold(0 as Cents, |total, expense| {
        total
            .checked_add(expense.amount_cents)
            .ok_or_else(|| EngineError::InvalidArgument("expense total overflows".to_string()))
    })
}

/// Attach friend names to settlements.
pub fn name_settlements(settlements: &[Settlement], friends: &[Friend]) -> Vec<NamedSettlement> {
    let name_of = |id: FriendId| {
        friends
            .iter()
            .find(|friend| friend.id == id)
            .map(|friend| friend.name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };

    settlements
        .iter()
        .map(|s| NamedSettlement {
            from: s.from,
            from_name: name_of(s.from),
            to: s.to,
            to_name: name_of(s.to),
            amount_cents: s.amount_cents,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_summaries_keep_friend_order_and_status() {
        let alice = Friend::new("Alice");
        let bob = Friend::new("Bob");
        let carol = Friend::new("Carol");
        let balances: Balances = [(alice.id, 2000), (bob.id, -2000)].into_iter().collect();

        let summaries = build_summaries(&[carol.clone(), alice.clone(), bob.clone()], &balances);

        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Carol", "Alice", "Bob"]);
        assert_eq!(summaries[0].balance, 0);
        assert_eq!(summaries[0].status, BalanceStatus::Settled);
        assert_eq!(summaries[1].status, BalanceStatus::ToReceive);
        assert_eq!(summaries[2].status, BalanceStatus::ToPay);
    }

    #[test]
    fn test_build_total() {
        let payer = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expenses = vec![
            Expense::new("A", 1250, payer, vec![payer], date),
            Expense::new("B", 750, payer, vec![payer], date),
        ];

        assert_eq!(build_total(&expenses), Ok(2000));
        assert_eq!(build_total(&[]), Ok(0));
    }

    #[test]
    fn test_build_total_overflow() {
        let payer = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expenses = vec![
            Expense::new("A", i64::MAX, payer, vec![payer], date),
            Expense::new("B", 1, payer, vec![payer], date),
        ];

        assert!(matches!(
            build_total(&expenses),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_name_settlements_uses_unknown_label() {
        let alice = Friend::new("Alice");
        let ghost = Uuid::new_v4();
        let settlements = vec![Settlement {
            from: ghost,
            to: alice.id,
            amount_cents: 500,
        }];

        let named = name_settlements(&settlements, &[alice.clone()]);

        assert_eq!(named[0].from_name, UNKNOWN_NAME);
        assert_eq!(named[0].to_name, "Alice");
        assert_eq!(named[0].amount_cents, 500);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&BalanceStatus::ToReceive).unwrap();
        assert_eq!(json, "\"to-receive\"");
    }
}
