use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::application::{ExpenseFilter, GroupService, NewExpense};
use crate::config::Config;
use crate::domain::{Expense, format_cents, parse_cents};
use crate::logging::{LogFormat, init_logging};

/// Divvy - Shared Expense Splitter
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "Split group expenses and plan the fewest payments to settle up")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the config file)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Config file path (defaults to ./divvy.toml when present)
    #[arg(short, long, env = "DIVVY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format: compact, json (overrides the config file)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Friend management commands
    #[command(subcommand)]
    Friend(FriendCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Show every friend's balance
    Balances {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show the payments that settle all debts
    Settle {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show total spent, balances and settlements
    Summary {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show headline counters
    Dashboard,

    /// Export data to CSV or JSON
    Export {
        /// What to export: expenses, balances, settlements, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import a JSON snapshot produced by `export full`
    Import {
        /// What to import: full
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip records that already exist
        #[arg(long)]
        skip_duplicates: bool,
    },
}

#[derive(Subcommand)]
pub enum FriendCommands {
    /// Add a friend to the group
    Add {
        /// Friend name (unique, case-insensitive)
        name: String,
    },

    /// List all friends
    List,

    /// Rename a friend
    Rename {
        /// Current name
        name: String,

        /// New name
        new_name: String,
    },

    /// Remove a friend; expenses they paid for are deleted
    Remove {
        /// Friend name
        name: String,
    },

    /// Show a friend's balance and expenses
    Show {
        /// Friend name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shared expense
    Add {
        /// Amount paid (e.g., "42.50" or "42")
        amount: String,

        /// What the money was spent on
        #[arg(short, long)]
        description: String,

        /// Friend who paid
        #[arg(short, long)]
        payer: String,

        /// Friends sharing the cost, comma separated
        #[arg(long, value_delimiter = ',')]
        participants: Vec<String>,

        /// Split among every friend in the group
        #[arg(long, conflicts_with = "participants")]
        all: bool,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List expenses
    List {
        /// Only expenses involving this friend
        #[arg(long)]
        friend: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of expenses to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show detailed expense information
    Show {
        /// Expense ID
        id: String,
    },

    /// Edit an expense; omitted fields keep their current value
    Edit {
        /// Expense ID
        id: String,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New payer
        #[arg(short, long)]
        payer: Option<String>,

        /// New participants, comma separated
        #[arg(long, value_delimiter = ',')]
        participants: Option<Vec<String>>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).context("Failed to load config")?;

        let log_format = match &self.log_format {
            Some(s) => LogFormat::from_str(s).ok_or_else(|| {
                anyhow::anyhow!("Invalid log format '{}'. Valid formats: compact, json", s)
            })?,
            None => config.logging.format,
        };
        init_logging(&config.logging.level, log_format, self.verbose);

        let database = self
            .database
            .clone()
            .unwrap_or_else(|| config.storage.database.clone());
        tracing::debug!(database = %database, options = ?config.engine, "starting");

        match self.command {
            Commands::Init => {
                GroupService::init(&database).await?;
                println!("Database initialized: {}", database);
            }
            command => {
                let service = GroupService::connect(&database)
                    .await
                    .with_context(|| {
                        format!("Failed to open '{}'. Run `divvy init` first", database)
                    })?
                    .with_options(config.engine);
                run_command(&service, command).await?;
            }
        }

        Ok(())
    }
}

async fn run_command(service: &GroupService, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            anyhow::bail!("Database is already open; `init` takes no other action")
        }

        Commands::Friend(cmd) => run_friend_command(service, cmd).await?,

        Commands::Expense(cmd) => run_expense_command(service, cmd).await?,

        Commands::Balances { format } => run_balances_command(service, &format).await?,

        Commands::Settle { format } => run_settle_command(service, &format).await?,

        Commands::Summary { format } => run_summary_command(service, &format).await?,

        Commands::Dashboard => {
            let stats = service.dashboard().await?;
            println!("Friends:            {}", stats.friend_count);
            println!("Expenses:           {}", stats.expense_count);
            println!("Total spent:        {}", format_cents(stats.total_cents));
            println!("Pending payments:   {}", stats.unsettled_count);
        }

        Commands::Export {
            export_type,
            output,
        } => run_export_command(service, &export_type, output.as_deref()).await?,

        Commands::Import {
            import_type,
            input,
            dry_run,
            skip_duplicates,
        } => {
            run_import_command(
                service,
                &import_type,
                input.as_deref(),
                dry_run,
                skip_duplicates,
            )
            .await?
        }
    }

    Ok(())
}

async fn run_friend_command(service: &GroupService, cmd: FriendCommands) -> Result<()> {
    match cmd {
        FriendCommands::Add { name } => {
            let friend = service.add_friend(&name).await?;
            println!("Added friend: {}", friend.name);
        }

        FriendCommands::List => {
            let friends = service.list_friends().await?;
            if friends.is_empty() {
                println!("No friends found.");
            } else {
                println!("{:<24} {:<12}", "NAME", "SINCE");
                println!("{}", "-".repeat(38));
                for friend in friends {
                    println!(
                        "{:<24} {:<12}",
                        truncate(&friend.name, 24),
                        friend.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        FriendCommands::Rename { name, new_name } => {
            let friend = service.rename_friend(&name, &new_name).await?;
            println!("Renamed friend: {} -> {}", name, friend.name);
        }

        FriendCommands::Remove { name } => {
            let removal = service.remove_friend(&name).await?;
            println!("Removed friend: {}", removal.friend.name);
            if removal.updated_expenses > 0 {
                println!("  Dropped from {} expense(s)", removal.updated_expenses);
            }
            if removal.deleted_expenses > 0 {
                println!("  Deleted {} expense(s)", removal.deleted_expenses);
            }
        }

        FriendCommands::Show { name } => {
            let friend = service.get_friend(&name).await?;
            let summary = service
                .friend_summaries()
                .await?
                .into_iter()
                .find(|s| s.id == friend.id)
                .ok_or_else(|| anyhow::anyhow!("Friend disappeared: {}", friend.name))?;
            let expenses = service.expenses_for_friend(&friend.name).await?;

            println!("Friend: {}", friend.name);
            println!("  ID:       {}", friend.id);
            println!("  Added:    {}", friend.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!(
                "  Balance:  {} ({})",
                format_cents(summary.balance),
                summary.status.label()
            );
            println!("  Expenses: {}", expenses.len());
            for expense in &expenses {
                let role = if expense.payer_id == friend.id {
                    "paid"
                } else {
                    "shared"
                };
                println!(
                    "    {} {:>10} {:<7} {}",
                    expense.date.format("%Y-%m-%d"),
                    format_cents(expense.amount_cents),
                    role,
                    truncate(&expense.description, 30)
                );
            }
        }
    }
    Ok(())
}

async fn run_expense_command(service: &GroupService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            description,
            payer,
            participants,
            all,
            date,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '42.50' or '42'")?;
            let date = match date {
                Some(date_str) => parse_date(&date_str).with_context(|| {
                    format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                })?,
                None => Utc::now().date_naive(),
            };
            let participants = if all {
                service
                    .list_friends()
                    .await?
                    .into_iter()
                    .map(|f| f.name)
                    .collect()
            } else {
                participants
            };

            let expense = service
                .add_expense(NewExpense {
                    description,
                    amount_cents,
                    payer,
                    participants,
                    date,
                })
                .await?;

            println!(
                "Recorded expense: {} split {} way(s) ({})",
                format_cents(expense.amount_cents),
                expense.participant_ids.len(),
                expense.id
            );
        }

        ExpenseCommands::List {
            friend,
            from_date,
            to_date,
            limit,
        } => {
            let filter = ExpenseFilter {
                friend,
                from_date: from_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid from-date")?,
                to_date: to_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid to-date")?,
                limit,
            };
            let expenses = service.list_expenses(filter).await?;
            print_expenses(service, &expenses).await?;
        }

        ExpenseCommands::Show { id } => {
            let expense_id = parse_expense_id(&id)?;
            let details = service.expense_details(expense_id).await?;
            let expense = &details.expense;

            println!("Expense: {}", expense.id);
            println!("  Date:        {}", expense.date.format("%Y-%m-%d"));
            println!("  Description: {}", expense.description);
            println!("  Amount:      {}", format_cents(expense.amount_cents));
            println!("  Paid by:     {}", details.payer_name);
            println!("  Split:");
            for (name, share) in &details.shares {
                println!("    {:<20} {:>10}", truncate(name, 20), format_cents(*share));
            }
            println!(
                "  Recorded:    {}",
                expense.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        ExpenseCommands::Edit {
            id,
            amount,
            description,
            payer,
            participants,
            date,
        } => {
            let expense_id = parse_expense_id(&id)?;
            let current = service.expense_details(expense_id).await?;

            let input = NewExpense {
                description: description.unwrap_or_else(|| current.expense.description.clone()),
                amount_cents: match amount {
                    Some(a) => parse_cents(&a).context("Invalid amount format")?,
                    None => current.expense.amount_cents,
                },
                payer: payer.unwrap_or_else(|| current.payer_name.clone()),
                participants: participants.unwrap_or_else(|| {
                    current.shares.iter().map(|(name, _)| name.clone()).collect()
                }),
                date: match date {
                    Some(d) => parse_date(&d).context("Invalid date")?,
                    None => current.expense.date,
                },
            };

            let expense = service.update_expense(expense_id, input).await?;
            println!(
                "Updated expense: {} {} ({})",
                format_cents(expense.amount_cents),
                expense.description,
                expense.id
            );
        }

        ExpenseCommands::Delete { id } => {
            let expense_id = parse_expense_id(&id)?;
            let expense = service.delete_expense(expense_id).await?;
            println!(
                "Deleted expense: {} {}",
                format_cents(expense.amount_cents),
                expense.description
            );
        }
    }
    Ok(())
}

async fn print_expenses(service: &GroupService, expenses: &[Expense]) -> Result<()> {
    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    let names = service.get_friend_names().await?;
    println!(
        "{:<12} {:>10} {:<15} {:>6} DESCRIPTION",
        "DATE", "AMOUNT", "PAID BY", "SPLIT"
    );
    println!("{}", "-".repeat(70));

    for expense in expenses {
        let payer = names
            .get(&expense.payer_id)
            .map(|s| s.as_str())
            .unwrap_or("?");
        println!(
            "{:<12} {:>10} {:<15} {:>6} {}",
            expense.date.format("%Y-%m-%d"),
            format_cents(expense.amount_cents),
            truncate(payer, 15),
            expense.participant_ids.len(),
            truncate(&expense.description, 30)
        );
    }
    Ok(())
}

async fn run_balances_command(service: &GroupService, format: &str) -> Result<()> {
    let summaries = service.friend_summaries().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summaries)?),
        "table" => {
            if summaries.is_empty() {
                println!("No friends found.");
            } else {
                println!("{:<20} {:>12} {:<12}", "FRIEND", "BALANCE", "STATUS");
                println!("{}", "-".repeat(46));
                for summary in summaries {
                    println!(
                        "{:<20} {:>12} {:<12}",
                        truncate(&summary.name, 20),
                        format_cents(summary.balance),
                        summary.status.label()
                    );
                }
            }
        }
        _ => anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format),
    }
    Ok(())
}

async fn run_settle_command(service: &GroupService, format: &str) -> Result<()> {
    let settlements = service.settlements().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&settlements)?),
        "table" => {
            if settlements.is_empty() {
                println!("Everyone is settled up.");
            } else {
                println!("{:<20} {:<20} {:>12}", "FROM", "TO", "AMOUNT");
                println!("{}", "-".repeat(54));
                for s in settlements {
                    println!(
                        "{:<20} {:<20} {:>12}",
                        truncate(&s.from_name, 20),
                        truncate(&s.to_name, 20),
                        format_cents(s.amount_cents)
                    );
                }
            }
        }
        _ => anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format),
    }
    Ok(())
}

async fn run_summary_command(service: &GroupService, format: &str) -> Result<()> {
    let summary = service.group_summary().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "table" => {
            println!("Total expenses: {}", format_cents(summary.total_cents));
            println!();

            println!("Balances:");
            if summary.friends.is_empty() {
                println!("  No friends or expenses added yet.");
            }
            for friend in &summary.friends {
                println!(
                    "  {:<20} {:>12} {}",
                    truncate(&friend.name, 20),
                    format_cents(friend.balance.saturating_abs()),
                    friend.status.label()
                );
            }
            println!();

            println!("Settlements:");
            if summary.settlements.is_empty() {
                println!("  No settlements needed.");
            }
            for s in &summary.settlements {
                println!(
                    "  {} pays {} {}",
                    s.from_name,
                    s.to_name,
                    format_cents(s.amount_cents)
                );
            }
        }
        _ => anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format),
    }
    Ok(())
}

async fn run_export_command(
    service: &GroupService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "expenses" => {
            let count = exporter.export_expenses_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "settlements" => {
            let count = exporter.export_settlements_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} settlements", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} friends, {} expenses",
                    snapshot.friends.len(),
                    snapshot.expenses.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: expenses, balances, settlements, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &GroupService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{Read, stdin};

    if import_type != "full" {
        anyhow::bail!("Invalid import type '{}'. Valid types: full", import_type);
    }

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };
    let result = Importer::new(service)
        .import_full_json(reader, options)
        .await?;

    if dry_run {
        println!("Dry run complete (nothing written)");
    } else {
        println!("Import complete");
    }
    println!("  Friends:  {}", result.friends_imported);
    println!("  Expenses: {}", result.expenses_imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!("  {} #{}: {}", error.record, error.index, error.error);
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

fn parse_expense_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid expense ID format (expected UUID)")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")
}
