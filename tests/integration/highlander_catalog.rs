use dbpatcher::catalog::VersionCatalog;
use dbpatcher::console::RecordingSink;
use dbpatcher::db::SqlValue;
use dbpatcher::runner::MigrationRunner;
use std::sync::Arc;
use tempfile::TempDir;

use crate::helpers::{FakeGateway, settings};

const PAGE_QUERY: &str = "FROM `exomes` WHERE `id` > ?";

/// A 1.9 database with one analysis, three variants and a few projects
fn legacy_database() -> FakeGateway {
    FakeGateway::at_version("1.9")
        .with_tenants(&["exomes"])
        .script(
            "`outsourcing` FROM `projects`",
            &["id", "outsourcing"],
            vec![
                vec![Some("1"), Some("Genomics Inc")],
                vec![Some("2"), Some("SeqCo")],
                vec![Some("3"), Some("Genomics Inc")],
            ],
        )
        .script(
            "INSTR(`comments`, 'normal_sample')",
            &["project_id", "comments"],
            vec![
                vec![Some("10"), Some("tumor, normal_sample[/runs/N1]")],
                vec![Some("11"), Some("normal_sample[/runs/missing]")],
            ],
        )
        .script_with_params(
            "`run_path` = ?",
            vec![SqlValue::from("/runs/N1")],
            &["project_id"],
            vec![vec![Some("4")], vec![Some("7")]],
        )
        .script("COUNT(*) FROM `exomes`", &["COUNT(*)"], vec![vec![Some("3")]])
        .script(
            PAGE_QUERY,
            &[
                "id",
                "project_id",
                "chr",
                "pos",
                "reference",
                "alternative",
                "gene_symbol",
                "outsourcing",
            ],
            vec![
                vec![Some("1"), Some("1"), Some("7"), Some("100"), Some("A"), Some("G"), Some(" CFTR"), Some("Genomics Inc")],
                vec![Some("2"), Some("2"), Some("7"), Some("100"), Some("A"), Some("G"), Some("CFTR"), None],
                vec![Some("3"), Some("1"), Some("1"), Some("5"), Some("C"), Some("T"), None, Some("Genomics Inc")],
            ],
        )
        .unique_on("exomes_static_annotations", 4)
        .unique_on("exomes_gene_annotations", 1)
        .unique_on("exomes_custom_annotations", 6)
}

struct Run {
    db: Arc<FakeGateway>,
    console: Arc<RecordingSink>,
    staging: TempDir,
}

async fn run_to(db: FakeGateway, target: &str) -> Run {
    let staging = TempDir::new().unwrap();
    let db = Arc::new(db);
    let console = Arc::new(RecordingSink::new());
    let mut runner = MigrationRunner::new(
        VersionCatalog::highlander().unwrap(),
        db.clone(),
        console.clone(),
        settings(staging.path()),
    );
    runner.migrate(target).await.unwrap();
    Run {
        db,
        console,
        staging,
    }
}

#[tokio::test]
async fn test_full_upgrade_reaches_latest() {
    let run = run_to(legacy_database(), "17.13").await;

    assert_eq!(run.db.marker().as_deref(), Some("17.13"));
    assert_eq!(
        run.db.marker_writes(),
        vec!["1.10", "1.12", "14", "14.8", "14.10", "17", "17.12", "17.13"]
    );
    assert!(run.console.contains("Database updated to version 17.13 (8 step(s)"));
}

#[tokio::test]
async fn test_outsourcing_backfill_groups_projects_by_company() {
    let run = run_to(legacy_database(), "1.12").await;

    let updates: Vec<(String, Vec<SqlValue>)> = run
        .db
        .executed_with_params()
        .into_iter()
        .filter(|(sql, _)| sql.starts_with("UPDATE `exomes` SET `outsourcing`"))
        .collect();

    assert_eq!(updates.len(), 3);
    assert_eq!(updates[0].0, "UPDATE `exomes` SET `outsourcing` = NULL");
    assert_eq!(
        updates[1],
        (
            "UPDATE `exomes` SET `outsourcing` = ? WHERE `project_id` IN (?, ?)".to_string(),
            vec![SqlValue::from("Genomics Inc"), SqlValue::Int(1), SqlValue::Int(3)]
        )
    );
    assert_eq!(
        updates[2],
        (
            "UPDATE `exomes` SET `outsourcing` = ? WHERE `project_id` IN (?)".to_string(),
            vec![SqlValue::from("SeqCo"), SqlValue::Int(2)]
        )
    );
    assert_eq!(run.db.marker().as_deref(), Some("1.12"));
}

#[tokio::test]
async fn test_release_17_resolves_normal_samples() {
    let run = run_to(legacy_database().at_marker("14.10"), "17").await;

    let updates: Vec<Vec<SqlValue>> = run
        .db
        .executed_with_params()
        .into_iter()
        .filter(|(sql, _)| sql.contains("SET `normal_id` = ?"))
        .map(|(_, params)| params)
        .collect();
    assert_eq!(updates, vec![vec![SqlValue::Int(7), SqlValue::Int(10)]]);
    assert!(run.console.contains(
        "project id 11 with comment normal_sample[/runs/missing] : normal id not found !"
    ));
}

#[tokio::test]
async fn test_release_17_creates_levenshtein_once() {
    let run = run_to(legacy_database().at_marker("14.10"), "17").await;
    assert_eq!(
        run.db.executed_containing("CREATE FUNCTION `levenshtein`").len(),
        1
    );

    let existing = legacy_database().at_marker("14.10").script(
        "SHOW FUNCTION STATUS",
        &["Db", "Name"],
        vec![vec![Some("highlander"), Some("levenshtein")]],
    );
    let run = run_to(existing, "17").await;
    assert!(run.db.executed_containing("CREATE FUNCTION").is_empty());
}

#[tokio::test]
async fn test_release_17_splits_annotations() {
    let run = run_to(legacy_database().at_marker("14.10"), "17").await;

    assert_eq!(run.db.table_rows("exomes_sample_annotations").len(), 3);
    assert_eq!(run.db.table_rows("exomes_static_annotations").len(), 2);
    // padded and bare spellings of a symbol are one gene, stored trimmed
    assert_eq!(
        run.db.table_rows("exomes_gene_annotations"),
        vec![vec![Some("CFTR".to_string())]]
    );
    assert_eq!(run.db.table_rows("exomes_custom_annotations").len(), 3);

    // paging stops on the first empty page
    let pages: Vec<String> = run
        .db
        .queries()
        .into_iter()
        .filter(|q| q.contains(PAGE_QUERY))
        .collect();
    assert_eq!(pages.len(), 2);

    let creates = run.db.executed_containing("CREATE TABLE `exomes_");
    assert_eq!(creates.len(), 4);
    let position = |needle: &str| {
        run.db
            .statements()
            .iter()
            .position(|s| s == needle)
            .unwrap_or_else(|| panic!("missing statement: {needle}"))
    };
    assert!(
        position("DROP TABLE IF EXISTS `exomes_sample_annotations`")
            < position("DROP TABLE IF EXISTS `exomes`")
    );
    assert!(run.console.contains("Importing 3 staged rows into `exomes_sample_annotations`"));

    // staging files are gone once loaded
    assert_eq!(std::fs::read_dir(run.staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_latest_releases_run_for_every_analysis() {
    let db = FakeGateway::at_version("17").with_tenants(&["exomes", "genomes"]);
    let run = run_to(db, "17.13").await;

    assert_eq!(
        run.db.executed_containing("INSERT INTO `fields_analyses`"),
        vec![
            "INSERT INTO `fields_analyses` VALUES ('symmetric_odds_ratio','exomes')",
            "INSERT INTO `fields_analyses` VALUES ('symmetric_odds_ratio','genomes')",
            "INSERT INTO `fields_analyses` VALUES ('snpeff_all_effects','exomes')",
            "INSERT INTO `fields_analyses` VALUES ('snpeff_all_effects','genomes')",
        ]
    );
    assert_eq!(
        run.db.executed_containing("`per_tile_sequence_quality`").len(),
        1
    );
}
