use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

use crate::application::GroupService;
use crate::domain::{Expense, Friend, FriendId, UNKNOWN_NAME, format_cents};

/// Database snapshot for full export/import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub friends: Vec<Friend>,
    pub expenses: Vec<Expense>,
}

/// Exporter for converting group data to various formats
pub struct Exporter<'a> {
    service: &'a GroupService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a GroupService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV format, participants separated by ';'
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let snapshot = self.service.snapshot().await?;
        let names: HashMap<FriendId, String> = snapshot
            .friends
            .iter()
            .map(|f| (f.id, f.name.clone()))
            .collect();
        let name_of = |id: FriendId| {
            names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string())
        };
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "description",
            "amount",
            "amount_cents",
            "payer",
            "participants",
        ])?;

        for expense in &snapshot.expenses {
            let participants: Vec<String> =
                expense.participant_ids.iter().map(|id| name_of(*id)).collect();

            csv_writer.write_record(&[
                expense.id.to_string(),
                expense.date.format("%Y-%m-%d").to_string(),
                expense.description.clone(),
                format_cents(expense.amount_cents),
                expense.amount_cents.to_string(),
                name_of(expense.payer_id),
                participants.join(";"),
            ])?;
        }

        csv_writer.flush()?;
        Ok(snapshot.expenses.len())
    }

    /// Export per-friend balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let summaries = self.service.friend_summaries().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["name", "balance", "balance_cents", "status"])?;

        for summary in &summaries {
            csv_writer.write_record(&[
                summary.name.clone(),
                format_cents(summary.balance),
                summary.balance.to_string(),
                summary.status.as_str().to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(summaries.len())
    }

    /// Export the settlement plan to CSV format
    pub async fn export_settlements_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let settlements = self.service.settlements().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount", "amount_cents"])?;

        for settlement in &settlements {
            csv_writer.write_record(&[
                settlement.from_name.clone(),
                settlement.to_name.clone(),
                format_cents(settlement.amount_cents),
                settlement.amount_cents.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(settlements.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let ledger = self.service.snapshot().await?;

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            friends: ledger.friends,
            expenses: ledger.expenses,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
