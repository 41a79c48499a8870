// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use divvy::application::{GroupService, NewExpense};
use divvy::domain::{Cents, Expense};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(GroupService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = GroupService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Build an expense input dated 2024-03-01
pub fn new_expense(
    description: &str,
    amount_cents: Cents,
    payer: &str,
    participants: &[&str],
) -> NewExpense {
    NewExpense {
        description: description.to_string(),
        amount_cents,
        payer: payer.to_string(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        date: parse_date("2024-03-01"),
    }
}

/// Test fixture: the Alice, Bob and Carol group
pub struct StandardGroup;

impl StandardGroup {
    /// Add Alice, Bob and Carol, in that order
    pub async fn create(service: &GroupService) -> Result<()> {
        service.add_friend("Alice").await?;
        service.add_friend("Bob").await?;
        service.add_friend("Carol").await?;
        Ok(())
    }

    /// Alice pays 30.00 for all three, Bob pays 12.00 for himself and Carol.
    ///
    /// Balances end up Alice +20.00, Bob -4.00, Carol -16.00.
    pub async fn create_with_expenses(service: &GroupService) -> Result<Vec<Expense>> {
        Self::create(service).await?;
        let dinner = service
            .add_expense(new_expense("Dinner", 3000, "Alice", &["Alice", "Bob", "Carol"]))
            .await?;
        let taxi = service
            .add_expense(new_expense("Taxi", 1200, "Bob", &["Bob", "Carol"]))
            .await?;
        Ok(vec![dinner, taxi])
    }
}
