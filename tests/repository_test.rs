use anyhow::Result;
use chrono::NaiveDate;
use divvy::domain::{Expense, Friend};
use divvy::storage::{CascadeOutcome, Repository};
use tempfile::TempDir;

async fn test_repository() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
    Ok((repo, temp_dir))
}

#[tokio::test]
async fn test_remove_friend_cascade_reads_current_expenses() -> Result<()> {
    let (repo, _temp) = test_repository().await?;
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let alice = Friend::new("Alice");
    let bob = Friend::new("Bob");
    repo.save_friend(&alice).await?;
    repo.save_friend(&bob).await?;

    let shared = Expense::new("Lunch", 2000, alice.id, vec![alice.id, bob.id], date);
    let paid_by_bob = Expense::new("Cinema", 1800, bob.id, vec![alice.id], date);
    let only_bob = Expense::new("Book", 900, alice.id, vec![bob.id], date);
    for expense in [&shared, &paid_by_bob, &only_bob] {
        repo.save_expense(expense).await?;
    }

    let outcome = repo.remove_friend_cascade(bob.id).await?;
    assert_eq!(
        outcome,
        CascadeOutcome {
            updated_expenses: 1,
            deleted_expenses: 2,
        }
    );

    assert!(repo.get_friend(bob.id).await?.is_none());
    let expenses = repo.list_expenses().await?;
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].id, shared.id);
    assert_eq!(expenses[0].participant_ids, vec![alice.id]);

    Ok(())
}

#[tokio::test]
async fn test_friend_lookup_uses_folded_name() -> Result<()> {
    let (repo, _temp) = test_repository().await?;

    let elodie = Friend::new("Élodie");
    repo.save_friend(&elodie).await?;

    let found = repo.get_friend_by_name(" ÉLODIE ").await?;
    assert_eq!(found.map(|f| f.id), Some(elodie.id));

    // The unique index rejects a second friend with the same folded name
    assert!(repo.save_friend(&Friend::new("élodie")).await.is_err());

    Ok(())
}
