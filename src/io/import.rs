use anyhow::Result;
use std::collections::HashSet;
use std::io::Read;

use crate::application::{AppError, GroupService};
use crate::domain::{Expense, Friend, FriendId};
use crate::io::export::DatabaseSnapshot;

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub friends_imported: usize,
    pub expenses_imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    /// "friend" or "expense"
    pub record: &'static str,
    /// Position of the record within its list (0-based)
    pub index: usize,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate and count without writing anything
    pub dry_run: bool,
    /// Silently skip records that already exist instead of reporting them
    pub skip_duplicates: bool,
}

/// Importer for loading a JSON snapshot into the group
pub struct Importer<'a> {
    service: &'a GroupService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a GroupService) -> Self {
        Self { service }
    }

    /// Import friends, then expenses, from a snapshot produced by `export full`.
    ///
    /// Existing records are never overwritten. Expenses must reference friends
    /// that exist after the import.
    pub async fn import_full_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let snapshot: DatabaseSnapshot = serde_json::from_reader(reader)?;
        let mut result = ImportResult::default();

        let existing = self.service.list_friends().await?;
        let mut known: HashSet<FriendId> = existing.iter().map(|f| f.id).collect();
        let mut taken_names: HashSet<String> = existing.iter().map(Friend::name_key).collect();

        for (index, friend) in snapshot.friends.iter().enumerate() {
            let duplicate =
                known.contains(&friend.id) || taken_names.contains(&friend.name_key());
            if duplicate {
                self.record_duplicate(&mut result, &options, "friend", index, &friend.name);
                continue;
            }

            if !options.dry_run {
                if let Err(e) = self.service.restore_friend(friend).await {
                    result.errors.push(ImportError {
                        record: "friend",
                        index,
                        error: e.to_string(),
                    });
                    continue;
                }
            } else if friend.name.trim().is_empty() {
                result.errors.push(ImportError {
                    record: "friend",
                    index,
                    error: "name cannot be empty".to_string(),
                });
                continue;
            }

            known.insert(friend.id);
            taken_names.insert(friend.name_key());
            result.friends_imported += 1;
        }

        for (index, expense) in snapshot.expenses.iter().enumerate() {
            if let Err(e) = check_expense(expense, &known) {
                result.errors.push(ImportError {
                    record: "expense",
                    index,
                    error: e.to_string(),
                });
                continue;
            }

            if options.dry_run {
                match self.service.get_expense(expense.id).await {
                    Ok(_) => self.record_duplicate(
                        &mut result,
                        &options,
                        "expense",
                        index,
                        &expense.id.to_string(),
                    ),
                    Err(AppError::ExpenseNotFound(_)) => result.expenses_imported += 1,
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            match self.service.restore_expense(expense).await {
                Ok(()) => result.expenses_imported += 1,
                Err(AppError::ExpenseAlreadyExists(id)) => {
                    self.record_duplicate(&mut result, &options, "expense", index, &id);
                }
                Err(e) => result.errors.push(ImportError {
                    record: "expense",
                    index,
                    error: e.to_string(),
                }),
            }
        }

        tracing::info!(
            friends = result.friends_imported,
            expenses = result.expenses_imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            dry_run = options.dry_run,
            "imported snapshot"
        );

        Ok(result)
    }

    fn record_duplicate(
        &self,
        result: &mut ImportResult,
        options: &ImportOptions,
        record: &'static str,
        index: usize,
        label: &str,
    ) {
        if options.skip_duplicates {
            result.skipped += 1;
        } else {
            result.errors.push(ImportError {
                record,
                index,
                error: format!("{} already exists: {}", record, label),
            });
        }
    }
}

fn check_expense(expense: &Expense, known: &HashSet<FriendId>) -> Result<(), AppError> {
    expense.validate()?;
    if expense.description.trim().is_empty() {
        return Err(AppError::InvalidDescription);
    }
    for id in std::iter::once(&expense.payer_id).chain(&expense.participant_ids) {
        if !known.contains(id) {
            return Err(AppError::FriendNotFound(id.to_string()));
        }
    }
    Ok(())
}
