use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{Expense, ExpenseId, Friend, FriendId, name_key};

use super::MIGRATION_001_INITIAL;

const DATE_FORMAT: &str = "%Y-%m-%d";

const EXPENSE_COLUMNS: &str =
    "id, description, amount_cents, payer_id, participant_ids, date, created_at";

/// Friends and expenses read together, so the balances computed from them agree.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub friends: Vec<Friend>,
    pub expenses: Vec<Expense>,
}

/// What removing a friend did to the expense ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Expenses the friend was dropped from
    pub updated_expenses: usize,
    /// Expenses deleted because the friend paid them or nobody was left to share them
    pub deleted_expenses: usize,
}

/// Repository for persisting and querying friends and expenses.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        tracing::debug!("applied migration 001");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Friend operations
    // ========================

    /// Save a new friend.
    pub async fn save_friend(&self, friend: &Friend) -> Result<()> {
        sqlx::query("INSERT INTO friends (id, name, name_key, created_at) VALUES (?, ?, ?, ?)")
            .bind(friend.id.to_string())
            .bind(&friend.name)
            .bind(friend.name_key())
            .bind(friend.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save friend")?;
        Ok(())
    }

    /// Get a friend by ID.
    pub async fn get_friend(&self, id: FriendId) -> Result<Option<Friend>> {
        let row = sqlx::query("SELECT id, name, created_at FROM friends WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch friend")?;

        row.as_ref().map(Self::row_to_friend).transpose()
    }

    /// Get a friend by name, ignoring case and surrounding whitespace.
    pub async fn get_friend_by_name(&self, name: &str) -> Result<Option<Friend>> {
        let row = sqlx::query("SELECT id, name, created_at FROM friends WHERE name_key = ?")
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch friend by name")?;

        row.as_ref().map(Self::row_to_friend).transpose()
    }

    /// List all friends in the order they were added.
    pub async fn list_friends(&self) -> Result<Vec<Friend>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM friends ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list friends")?;

        rows.iter().map(Self::row_to_friend).collect()
    }

    /// Change a friend's name.
    pub async fn rename_friend(&self, id: FriendId, name: &str) -> Result<()> {
        sqlx::query("UPDATE friends SET name = ?, name_key = ? WHERE id = ?")
            .bind(name)
            .bind(name_key(name))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to rename friend")?;
        Ok(())
    }

    /// Delete a friend and clean up the expenses that mention them, in one transaction.
    ///
    /// The expenses are read inside the transaction, so an expense recorded
    /// concurrently can't keep pointing at the removed friend.
    pub async fn remove_friend_cascade(&self, friend_id: FriendId) -> Result<CascadeOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let query = format!("SELECT {} FROM expenses ORDER BY date, rowid", EXPENSE_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&mut *tx)
            .await
            .context("Failed to list expenses")?;

        let mut outcome = CascadeOutcome::default();
        for row in &rows {
            let expense = Self::row_to_expense(row)?;
            if !expense.involves(friend_id) {
                continue;
            }

            match expense.without_friend(friend_id) {
                Some(remaining) => {
                    let participants_json = serde_json::to_string(&remaining.participant_ids)?;
                    sqlx::query("UPDATE expenses SET participant_ids = ? WHERE id = ?")
                        .bind(&participants_json)
                        .bind(remaining.id.to_string())
                        .execute(&mut *tx)
                        .await
                        .context("Failed to update expense participants")?;
                    outcome.updated_expenses += 1;
                }
                None => {
                    sqlx::query("DELETE FROM expenses WHERE id = ?")
                        .bind(expense.id.to_string())
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete expense")?;
                    outcome.deleted_expenses += 1;
                }
            }
        }

        sqlx::query("DELETE FROM friends WHERE id = ?")
            .bind(friend_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete friend")?;

        tx.commit().await.context("Failed to commit friend removal")?;
        Ok(outcome)
    }

    fn row_to_friend(row: &sqlx::sqlite::SqliteRow) -> Result<Friend> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Friend {
            id: Uuid::parse_str(&id_str).context("Invalid friend ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense.
    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        let participants_json = serde_json::to_string(&expense.participant_ids)?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, description, amount_cents, payer_id, participant_ids, date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.payer_id.to_string())
        .bind(&participants_json)
        .bind(expense.date.format(DATE_FORMAT).to_string())
        .bind(expense.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;

        Ok(())
    }

    /// Overwrite an existing expense. Returns false if no row has that id.
    pub async fn update_expense(&self, expense: &Expense) -> Result<bool> {
        let participants_json = serde_json::to_string(&expense.participant_ids)?;

        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET description = ?, amount_cents = ?, payer_id = ?, participant_ids = ?, date = ?
            WHERE id = ?
            "#,
        )
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.payer_id.to_string())
        .bind(&participants_json)
        .bind(expense.date.format(DATE_FORMAT).to_string())
        .bind(expense.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update expense")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an expense. Returns false if no row has that id.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let query = format!("SELECT {} FROM expenses WHERE id = ?", EXPENSE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List all expenses, oldest first.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        self.list_expenses_filtered(None, None, None).await
    }

    /// List expenses within an optional date range (inclusive), oldest first.
    pub async fn list_expenses_filtered(
        &self,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<Expense>> {
        let mut query = format!("SELECT {} FROM expenses WHERE 1=1", EXPENSE_COLUMNS);

        let from_date_str = from_date.map(|d| d.format(DATE_FORMAT).to_string());
        let to_date_str = to_date.map(|d| d.format(DATE_FORMAT).to_string());

        if from_date_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date, rowid");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref fd) = from_date_str {
            sql_query = sql_query.bind(fd);
        }
        if let Some(ref td) = to_date_str {
            sql_query = sql_query.bind(td);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Read all friends and expenses inside a single transaction.
    pub async fn load_snapshot(&self) -> Result<LedgerSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let friend_rows = sqlx::query("SELECT id, name, created_at FROM friends ORDER BY rowid")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to list friends")?;

        let query = format!(
            "SELECT {} FROM expenses ORDER BY date, rowid",
            EXPENSE_COLUMNS
        );
        let expense_rows = sqlx::query(&query)
            .fetch_all(&mut *tx)
            .await
            .context("Failed to list expenses")?;

        tx.commit().await.context("Failed to close snapshot")?;
        tracing::debug!(
            friends = friend_rows.len(),
            expenses = expense_rows.len(),
            "loaded snapshot"
        );

        Ok(LedgerSnapshot {
            friends: friend_rows
                .iter()
                .map(Self::row_to_friend)
                .collect::<Result<_>>()?,
            expenses: expense_rows
                .iter()
                .map(Self::row_to_expense)
                .collect::<Result<_>>()?,
        })
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let payer_str: String = row.get("payer_id");
        let participants_json: String = row.get("participant_ids");
        let date_str: String = row.get("date");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            description: row.get("description"),
            amount_cents: row.get("amount_cents"),
            payer_id: Uuid::parse_str(&payer_str).context("Invalid payer ID")?,
            participant_ids: serde_json::from_str(&participants_json)
                .context("Invalid participant list")?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).context("Invalid date")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
