use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{
    Balances, Cents, EngineError, Expense, ExpenseId, Friend, FriendId, FriendSummary,
    NamedSettlement, Settlement, UNKNOWN_NAME, UnknownIdPolicy, build_summaries, build_total,
    compute_balances_with, name_settlements, plan_settlements, plan_settlements_unchecked,
};
use crate::storage::{LedgerSnapshot, Repository};

use super::AppError;

/// Knobs for the balance and settlement computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Refuse to plan settlements when balances don't sum to zero.
    pub strict_conservation: bool,
    /// How expenses referring to unknown friends are handled.
    pub unknown_participants: UnknownIdPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict_conservation: true,
            unknown_participants: UnknownIdPolicy::Record,
        }
    }
}

/// Application service providing the group's use cases.
/// This is the primary interface for any client (CLI, export, tests).
pub struct GroupService {
    repo: Repository,
    options: EngineOptions,
}

/// Input for creating or editing an expense, with friends referred to by name.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub description: String,
    pub amount_cents: Cents,
    pub payer: String,
    pub participants: Vec<String>,
    pub date: NaiveDate,
}

/// Filter for querying expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    /// Only expenses the friend paid for or shares
    pub friend: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Outcome of removing a friend from the group
#[derive(Debug, Clone)]
pub struct FriendRemoval {
    pub friend: Friend,
    /// Expenses the friend was dropped from
    pub updated_expenses: usize,
    /// Expenses deleted because the friend paid them or nobody was left to share them
    pub deleted_expenses: usize,
}

/// An expense with payer and participant names resolved
#[derive(Debug, Clone)]
pub struct ExpenseDetails {
    pub expense: Expense,
    pub payer_name: String,
    pub shares: Vec<(String, Cents)>,
}

/// Everything the expense summary view shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub total_cents: Cents,
    pub friends: Vec<FriendSummary>,
    pub settlements: Vec<NamedSettlement>,
}

/// Headline counters for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub friend_count: usize,
    pub expense_count: usize,
    pub total_cents: Cents,
    /// Number of payments still needed to settle up
    pub unsettled_count: usize,
}

impl GroupService {
    /// Create a new service with the given repository and default options.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        tracing::info!(database = database_path, "initialized database");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Friend operations
    // ========================

    /// Add a friend. Names are trimmed and must be unique ignoring case.
    pub async fn add_friend(&self, name: &str) -> Result<Friend, AppError> {
        let name = validate_name(name)?;

        if self.repo.get_friend_by_name(&name).await?.is_some() {
            return Err(AppError::FriendAlreadyExists(name));
        }

        let friend = Friend::new(name);
        self.repo.save_friend(&friend).await?;
        tracing::info!(friend_id = %friend.id, name = %friend.name, "added friend");
        Ok(friend)
    }

    /// Get a friend by name.
    pub async fn get_friend(&self, name: &str) -> Result<Friend, AppError> {
        self.repo
            .get_friend_by_name(name.trim())
            .await?
            .ok_or_else(|| AppError::FriendNotFound(name.to_string()))
    }

    /// Get a friend by ID.
    pub async fn get_friend_by_id(&self, id: FriendId) -> Result<Friend, AppError> {
        self.repo
            .get_friend(id)
            .await?
            .ok_or_else(|| AppError::FriendNotFound(id.to_string()))
    }

    /// List all friends in the order they were added.
    pub async fn list_friends(&self) -> Result<Vec<Friend>, AppError> {
        Ok(self.repo.list_friends().await?)
    }

    /// Rename a friend. The new name may only differ in case from the old one
    /// if no other friend already uses it.
    pub async fn rename_friend(&self, name: &str, new_name: &str) -> Result<Friend, AppError> {
        let friend = self.get_friend(name).await?;
        let new_name = validate_name(new_name)?;

        if let Some(existing) = self.repo.get_friend_by_name(&new_name).await? {
            if existing.id != friend.id {
                return Err(AppError::FriendAlreadyExists(new_name));
            }
        }

        self.repo.rename_friend(friend.id, &new_name).await?;
        tracing::info!(friend_id = %friend.id, from = %friend.name, to = %new_name, "renamed friend");
        Ok(Friend {
            name: new_name,
            ..friend
        })
    }

    /// Remove a friend and clean up the expenses that mention them.
    ///
    /// The friend is dropped from every expense they share. Expenses they paid
    /// for, or that are left without participants, are deleted.
    pub async fn remove_friend(&self, name: &str) -> Result<FriendRemoval, AppError> {
        let friend = self.get_friend(name).await?;
        let outcome = self.repo.remove_friend_cascade(friend.id).await?;

        tracing::info!(
            friend_id = %friend.id,
            updated = outcome.updated_expenses,
            deleted = outcome.deleted_expenses,
            "removed friend"
        );

        Ok(FriendRemoval {
            friend,
            updated_expenses: outcome.updated_expenses,
            deleted_expenses: outcome.deleted_expenses,
        })
    }

    /// Get a map of friend IDs to names (useful for display).
    pub async fn get_friend_names(&self) -> Result<HashMap<FriendId, String>, AppError> {
        let friends = self.repo.list_friends().await?;
        Ok(friends.into_iter().map(|f| (f.id, f.name)).collect())
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a new expense.
    pub async fn add_expense(&self, input: NewExpense) -> Result<Expense, AppError> {
        let expense = self.resolve_expense(&input).await?;
        self.repo.save_expense(&expense).await?;
        tracing::info!(
            expense_id = %expense.id,
            amount_cents = expense.amount_cents,
            participants = expense.participant_ids.len(),
            "recorded expense"
        );
        Ok(expense)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// Get an expense with names and per-participant shares.
    pub async fn expense_details(&self, id: ExpenseId) -> Result<ExpenseDetails, AppError> {
        let expense = self.get_expense(id).await?;
        let names = self.get_friend_names().await?;
        let name_of = |id: &FriendId| {
            names
                .get(id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string())
        };

        let shares = expense
            .shares()?
            .into_iter()
            .map(|(id, share)| (name_of(&id), share))
            .collect();

        Ok(ExpenseDetails {
            payer_name: name_of(&expense.payer_id),
            shares,
            expense,
        })
    }

    /// List expenses with filters, oldest first.
    pub async fn list_expenses(&self, filter: ExpenseFilter) -> Result<Vec<Expense>, AppError> {
        let friend_id = match &filter.friend {
            Some(name) => Some(self.get_friend(name).await?.id),
            None => None,
        };

        // The friend filter runs in memory, so the limit has to wait until after it.
        let sql_limit = if friend_id.is_some() { None } else { filter.limit };
        let expenses = self
            .repo
            .list_expenses_filtered(filter.from_date, filter.to_date, sql_limit)
            .await?;

        Ok(match friend_id {
            Some(id) => expenses
                .into_iter()
                .filter(|e| e.involves(id))
                .take(filter.limit.unwrap_or(usize::MAX))
                .collect(),
            None => expenses,
        })
    }

    /// List every expense a friend paid for or shares.
    pub async fn expenses_for_friend(&self, name: &str) -> Result<Vec<Expense>, AppError> {
        self.list_expenses(ExpenseFilter {
            friend: Some(name.to_string()),
            ..ExpenseFilter::default()
        })
        .await
    }

    /// Replace the contents of an existing expense, keeping its id.
    pub async fn update_expense(
        &self,
        id: ExpenseId,
        input: NewExpense,
    ) -> Result<Expense, AppError> {
        let existing = self.get_expense(id).await?;
        let expense = self
            .resolve_expense(&input)
            .await?
            .with_id(existing.id)
            .with_created_at(existing.created_at);

        if !self.repo.update_expense(&expense).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        tracing::info!(expense_id = %expense.id, "updated expense");
        Ok(expense)
    }

    /// Delete an expense.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        let expense = self.get_expense(id).await?;
        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        tracing::info!(expense_id = %id, "deleted expense");
        Ok(expense)
    }

    /// Store friends and expenses exactly as given (ids included), for imports.
    pub async fn restore_friend(&self, friend: &Friend) -> Result<(), AppError> {
        validate_name(&friend.name)?;
        if self.repo.get_friend(friend.id).await?.is_some() {
            return Err(AppError::FriendAlreadyExists(friend.name.clone()));
        }
        if self.repo.get_friend_by_name(&friend.name).await?.is_some() {
            return Err(AppError::FriendAlreadyExists(friend.name.clone()));
        }
        self.repo.save_friend(friend).await?;
        Ok(())
    }

    pub async fn restore_expense(&self, expense: &Expense) -> Result<(), AppError> {
        validate_expense_fields(
            &expense.description,
            expense.amount_cents,
            expense.participant_ids.len(),
        )?;
        expense.validate()?;
        if self.repo.get_expense(expense.id).await?.is_some() {
            return Err(AppError::ExpenseAlreadyExists(expense.id.to_string()));
        }
        for id in std::iter::once(&expense.payer_id).chain(&expense.participant_ids) {
            if self.repo.get_friend(*id).await?.is_none() {
                return Err(AppError::FriendNotFound(id.to_string()));
            }
        }
        self.repo.save_expense(expense).await?;
        Ok(())
    }

    async fn resolve_expense(&self, input: &NewExpense) -> Result<Expense, AppError> {
        let description = validate_expense_fields(
            &input.description,
            input.amount_cents,
            input.participants.len(),
        )?;

        let payer = self.get_friend(&input.payer).await?;
        let mut participant_ids = Vec::with_capacity(input.participants.len());
        for name in &input.participants {
            participant_ids.push(self.get_friend(name).await?.id);
        }

        let expense = Expense::new(
            description,
            input.amount_cents,
            payer.id,
            participant_ids,
            input.date,
        );
        expense.validate()?;
        Ok(expense)
    }

    // ========================
    // Balances and settlements
    // ========================

    /// Net balance of every friend.
    pub async fn balances(&self) -> Result<Balances, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        Ok(self.compute(&snapshot)?)
    }

    /// Balance and status per friend, in the order friends were added.
    pub async fn friend_summaries(&self) -> Result<Vec<FriendSummary>, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        let balances = self.compute(&snapshot)?;
        Ok(build_summaries(&snapshot.friends, &balances))
    }

    /// The payments that settle every balance, with names.
    pub async fn settlements(&self) -> Result<Vec<NamedSettlement>, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        let balances = self.compute(&snapshot)?;
        let plan = self.plan(&balances)?;
        Ok(name_settlements(&plan, &snapshot.friends))
    }

    /// Total amount spent by the group.
    pub async fn total_expenses(&self) -> Result<Cents, AppError> {
        let expenses = self.repo.list_expenses().await?;
        Ok(build_total(&expenses)?)
    }

    /// Total, per-friend balances, and settlements from one consistent snapshot.
    pub async fn group_summary(&self) -> Result<GroupSummary, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        let balances = self.compute(&snapshot)?;
        let plan = self.plan(&balances)?;

        Ok(GroupSummary {
            total_cents: build_total(&snapshot.expenses)?,
            friends: build_summaries(&snapshot.friends, &balances),
            settlements: name_settlements(&plan, &snapshot.friends),
        })
    }

    /// Counters shown on the dashboard.
    pub async fn dashboard(&self) -> Result<DashboardStats, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        let balances = self.compute(&snapshot)?;
        let plan = self.plan(&balances)?;

        Ok(DashboardStats {
            friend_count: snapshot.friends.len(),
            expense_count: snapshot.expenses.len(),
            total_cents: build_total(&snapshot.expenses)?,
            unsettled_count: plan.len(),
        })
    }

    /// Friends and expenses as stored, for export.
    pub async fn snapshot(&self) -> Result<LedgerSnapshot, AppError> {
        Ok(self.repo.load_snapshot().await?)
    }

    fn compute(&self, snapshot: &LedgerSnapshot) -> Result<Balances, EngineError> {
        compute_balances_with(
            &snapshot.friends,
            &snapshot.expenses,
            self.options.unknown_participants,
        )
    }

    fn plan(&self, balances: &Balances) -> Result<Vec<Settlement>, EngineError> {
        if self.options.strict_conservation {
            plan_settlements(balances)
        } else {
            Ok(plan_settlements_unchecked(balances))
        }
    }
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidName("name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

fn validate_expense_fields(
    description: &str,
    amount_cents: Cents,
    participant_count: usize,
) -> Result<String, AppError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::InvalidDescription);
    }
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(amount_cents));
    }
    if participant_count == 0 {
        return Err(AppError::NoParticipants);
    }
    Ok(description.to_string())
}
