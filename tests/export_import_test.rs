mod common;

use anyhow::Result;
use common::{StandardGroup, test_service};
use divvy::application::ExpenseFilter;
use divvy::io::{DatabaseSnapshot, Exporter, ImportOptions, Importer};

#[tokio::test]
async fn test_export_expenses_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_with_expenses(&service).await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_expenses_csv(&mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "id,date,description,amount,amount_cents,payer,participants"
    );
    assert!(lines[1].contains(",2024-03-01,Dinner,30.00,3000,Alice,Alice;Bob;Carol"));
    assert!(lines[2].contains(",Taxi,12.00,1200,Bob,Bob;Carol"));

    Ok(())
}

#[tokio::test]
async fn test_export_balances_and_settlements_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_with_expenses(&service).await?;
    let exporter = Exporter::new(&service);

    let mut buffer = Vec::new();
    assert_eq!(exporter.export_balances_csv(&mut buffer).await?, 3);
    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "name,balance,balance_cents,status");
    assert_eq!(lines[1], "Alice,20.00,2000,to-receive");
    assert_eq!(lines[2], "Bob,-4.00,-400,to-pay");
    assert_eq!(lines[3], "Carol,-16.00,-1600,to-pay");

    let mut buffer = Vec::new();
    assert_eq!(exporter.export_settlements_csv(&mut buffer).await?, 2);
    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "from,to,amount,amount_cents");
    assert_eq!(lines[1], "Carol,Alice,16.00,1600");
    assert_eq!(lines[2], "Bob,Alice,4.00,400");

    Ok(())
}

#[tokio::test]
async fn test_full_export_then_import_into_new_database() -> Result<()> {
    let (source, _source_temp) = test_service().await?;
    StandardGroup::create_with_expenses(&source).await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&source)
        .export_full_json(&mut buffer)
        .await?;
    assert_eq!(snapshot.friends.len(), 3);
    assert_eq!(snapshot.expenses.len(), 2);

    let parsed: DatabaseSnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed.version, env!("CARGO_PKG_VERSION"));

    let (target, _target_temp) = test_service().await?;
    let result = Importer::new(&target)
        .import_full_json(buffer.as_slice(), ImportOptions::default())
        .await?;

    assert_eq!(result.friends_imported, 3);
    assert_eq!(result.expenses_imported, 2);
    assert_eq!(result.skipped, 0);
    assert!(result.errors.is_empty());

    // Ids survive, so balances and plans are identical
    assert_eq!(target.list_friends().await?, source.list_friends().await?);
    assert_eq!(target.balances().await?, source.balances().await?);
    assert_eq!(target.settlements().await?, source.settlements().await?);

    Ok(())
}

#[tokio::test]
async fn test_import_dry_run_writes_nothing() -> Result<()> {
    let (source, _source_temp) = test_service().await?;
    StandardGroup::create_with_expenses(&source).await?;
    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer).await?;

    let (target, _target_temp) = test_service().await?;
    let result = Importer::new(&target)
        .import_full_json(
            buffer.as_slice(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: false,
            },
        )
        .await?;

    assert_eq!(result.friends_imported, 3);
    assert_eq!(result.expenses_imported, 2);
    assert!(result.errors.is_empty());
    assert!(target.list_friends().await?.is_empty());
    assert!(
        target
            .list_expenses(ExpenseFilter::default())
            .await?
            .is_empty()
    );

    Ok(())
}

#[tokio::test]
async fn test_import_duplicates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_with_expenses(&service).await?;
    let mut buffer = Vec::new();
    Exporter::new(&service)
        .export_full_json(&mut buffer)
        .await?;

    // Importing into the same database reports every record as a duplicate
    let result = Importer::new(&service)
        .import_full_json(buffer.as_slice(), ImportOptions::default())
        .await?;
    assert_eq!(result.friends_imported, 0);
    assert_eq!(result.expenses_imported, 0);
    assert_eq!(result.errors.len(), 5);
    assert_eq!(result.errors[0].record, "friend");
    assert_eq!(result.errors[3].record, "expense");

    // Unless they are skipped
    let result = Importer::new(&service)
        .import_full_json(
            buffer.as_slice(),
            ImportOptions {
                dry_run: false,
                skip_duplicates: true,
            },
        )
        .await?;
    assert_eq!(result.skipped, 5);
    assert!(result.errors.is_empty());

    assert_eq!(service.list_friends().await?.len(), 3);
    assert_eq!(
        service
            .list_expenses(ExpenseFilter::default())
            .await?
            .len(),
        2
    );

    Ok(())
}

#[tokio::test]
async fn test_import_rejects_expenses_with_missing_friends() -> Result<()> {
    let (source, _source_temp) = test_service().await?;
    StandardGroup::create_with_expenses(&source).await?;
    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer).await?;

    // Drop Carol from the snapshot; both expenses mention her
    let mut snapshot: DatabaseSnapshot = serde_json::from_slice(&buffer)?;
    snapshot.friends.retain(|f| f.name != "Carol");
    let json = serde_json::to_vec(&snapshot)?;

    let (target, _target_temp) = test_service().await?;
    let result = Importer::new(&target)
        .import_full_json(json.as_slice(), ImportOptions::default())
        .await?;

    assert_eq!(result.friends_imported, 2);
    assert_eq!(result.expenses_imported, 0);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.record == "expense"));

    Ok(())
}

#[tokio::test]
async fn test_import_rejects_malformed_json() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = Importer::new(&service)
        .import_full_json("not json".as_bytes(), ImportOptions::default())
        .await;
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_import_dry_run_reports_existing_records() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_with_expenses(&service).await?;
    let mut buffer = Vec::new();
    Exporter::new(&service)
        .export_full_json(&mut buffer)
        .await?;

    let result = Importer::new(&service)
        .import_full_json(
            buffer.as_slice(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: true,
            },
        )
        .await?;

    assert_eq!(result.friends_imported, 0);
    assert_eq!(result.expenses_imported, 0);
    assert_eq!(result.skipped, 5);
    assert!(result.errors.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_import_matches_names_ignoring_non_ascii_case() -> Result<()> {
    let (source, _source_temp) = test_service().await?;
    source.add_friend("Élodie").await?;
    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer).await?;

    // Same name, different id and case
    let (target, _target_temp) = test_service().await?;
    target.add_friend("élodie").await?;

    let result = Importer::new(&target)
        .import_full_json(buffer.as_slice(), ImportOptions::default())
        .await?;
    assert_eq!(result.friends_imported, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(target.list_friends().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_import_dry_run_surfaces_database_errors() -> Result<()> {
    let (service, temp) = test_service().await?;
    let expenses = StandardGroup::create_with_expenses(&service).await?;
    let mut buffer = Vec::new();
    Exporter::new(&service)
        .export_full_json(&mut buffer)
        .await?;

    // Leave a stored row that can no longer be read back
    let db_url = format!("sqlite:{}", temp.path().join("test.db").display());
    let pool = sqlx::SqlitePool::connect(&db_url).await?;
    sqlx::query("UPDATE expenses SET date = 'not-a-date' WHERE id = ?")
        .bind(expenses[0].id.to_string())
        .execute(&pool)
        .await?;

    let result = Importer::new(&service)
        .import_full_json(
            buffer.as_slice(),
            ImportOptions {
                dry_run: true,
                skip_duplicates: true,
            },
        )
        .await;
    assert!(result.is_err());

    Ok(())
}
