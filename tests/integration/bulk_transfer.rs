use anyhow::Result;
use dbpatcher::bulk::BulkTransfer;
use dbpatcher::db::{LoadMode, SqlValue};
use tempfile::TempDir;

use crate::helpers::FakeGateway;

const COLUMNS: &[&str] = &["gene_symbol", "comments_gene"];

fn gene(symbol: &str, comment: Option<&str>) -> Vec<SqlValue> {
    vec![SqlValue::from(symbol), SqlValue::from(comment)]
}

fn staging_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

async fn preload(db: &FakeGateway, dir: &TempDir) -> Result<()> {
    let mut transfer = BulkTransfer::new(dir.path());
    transfer.stage_row("genes", COLUMNS, &gene("BRCA1", Some("first")))?;
    transfer.flush(db, "genes", LoadMode::Strict).await?;
    Ok(())
}

#[tokio::test]
async fn test_flush_loads_and_removes_staging_file() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17").unique_on("genes", 1);
    let mut transfer = BulkTransfer::new(dir.path());

    transfer.stage_row("genes", COLUMNS, &gene("BRCA1", None))?;
    transfer.stage_row("genes", COLUMNS, &gene("TP53", Some("tab\there")))?;
    assert_eq!(staging_files(&dir), 1);

    let loaded = transfer.flush(&db, "genes", LoadMode::Strict).await?;

    assert_eq!(loaded, 2);
    assert_eq!(staging_files(&dir), 0);
    assert_eq!(
        db.table_rows("genes"),
        vec![
            vec![Some("BRCA1".to_string()), None],
            vec![Some("TP53".to_string()), Some("tab\there".to_string())],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_strict_load_fails_on_duplicate() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17").unique_on("genes", 1);
    preload(&db, &dir).await?;

    let mut transfer = BulkTransfer::new(dir.path());
    transfer.stage_row("genes", COLUMNS, &gene("BRCA1", Some("second")))?;
    let err = transfer
        .flush(&db, "genes", LoadMode::Strict)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Duplicate entry"));
    // the staging file is removed even though the load failed
    assert_eq!(staging_files(&dir), 0);
    Ok(())
}

#[tokio::test]
async fn test_ignore_keeps_existing_rows() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17").unique_on("genes", 1);
    preload(&db, &dir).await?;

    let mut transfer = BulkTransfer::new(dir.path());
    transfer.stage_row("genes", COLUMNS, &gene("BRCA1", Some("second")))?;
    transfer.stage_row("genes", COLUMNS, &gene("CFTR", None))?;
    let loaded = transfer
        .flush(&db, "genes", LoadMode::IgnoreDuplicates)
        .await?;

    assert_eq!(loaded, 1);
    assert_eq!(db.table_rows("genes")[0][1].as_deref(), Some("first"));
    Ok(())
}

#[tokio::test]
async fn test_replace_overwrites_existing_rows() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17").unique_on("genes", 1);
    preload(&db, &dir).await?;

    let mut transfer = BulkTransfer::new(dir.path());
    transfer.stage_row("genes", COLUMNS, &gene("BRCA1", Some("second")))?;
    transfer
        .flush(&db, "genes", LoadMode::ReplaceDuplicates)
        .await?;

    assert_eq!(db.table_rows("genes").len(), 1);
    assert_eq!(db.table_rows("genes")[0][1].as_deref(), Some("second"));
    Ok(())
}

#[tokio::test]
async fn test_stage_unique_deduplicates_before_loading() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17");
    let mut transfer = BulkTransfer::new(dir.path());

    assert!(transfer.stage_unique("genes", COLUMNS, "CFTR", &gene("CFTR", Some("a")))?);
    assert!(!transfer.stage_unique("genes", COLUMNS, "CFTR", &gene("CFTR", Some("b")))?);
    assert_eq!(transfer.staged_rows("genes"), 1);

    transfer.flush(&db, "genes", LoadMode::Strict).await?;
    assert_eq!(
        db.table_rows("genes"),
        vec![vec![Some("CFTR".to_string()), Some("a".to_string())]]
    );
    Ok(())
}

#[tokio::test]
async fn test_stage_unique_remembers_keys_across_flushes() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17");
    let mut transfer = BulkTransfer::new(dir.path());

    assert!(transfer.stage_unique("genes", COLUMNS, "TP53", &gene("TP53", Some("a")))?);
    transfer.flush(&db, "genes", LoadMode::Strict).await?;
    assert_eq!(staging_files(&dir), 0);

    assert!(!transfer.stage_unique("genes", COLUMNS, "TP53", &gene("TP53", Some("b")))?);
    assert!(transfer.stage_unique("genes", COLUMNS, "BRCA1", &gene("BRCA1", None))?);
    assert_eq!(transfer.staged_rows("genes"), 1);

    transfer.flush(&db, "genes", LoadMode::Strict).await?;
    assert_eq!(
        db.table_rows("genes"),
        vec![
            vec![Some("TP53".to_string()), Some("a".to_string())],
            vec![Some("BRCA1".to_string()), None],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_flushing_nothing_touches_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let db = FakeGateway::at_version("17");
    let mut transfer = BulkTransfer::new(dir.path());

    assert_eq!(transfer.flush(&db, "genes", LoadMode::Strict).await?, 0);
    assert!(db.table_rows("genes").is_empty());
    Ok(())
}
