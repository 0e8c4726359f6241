use dbpatcher::catalog::{VersionCatalog, VersionStep};
use dbpatcher::console::RecordingSink;
use dbpatcher::runner::{CancelFlag, MigrationError, MigrationRunner, RunnerSettings};
use dbpatcher::version::Version;
use std::sync::Arc;
use tempfile::TempDir;

use crate::helpers::{FakeGateway, HIGHLANDER_VERSIONS, marker_catalog, settings};

struct Harness {
    db: Arc<FakeGateway>,
    console: Arc<RecordingSink>,
    runner: MigrationRunner,
    _staging: TempDir,
}

fn harness_with(db: FakeGateway, catalog: VersionCatalog, tweak: impl FnOnce(&mut RunnerSettings)) -> Harness {
    let staging = TempDir::new().unwrap();
    let mut settings = settings(staging.path());
    tweak(&mut settings);

    let db = Arc::new(db);
    let console = Arc::new(RecordingSink::new());
    let runner = MigrationRunner::new(catalog, db.clone(), console.clone(), settings);
    Harness {
        db,
        console,
        runner,
        _staging: staging,
    }
}

fn harness(db: FakeGateway) -> Harness {
    harness_with(db, marker_catalog(HIGHLANDER_VERSIONS), |_| {})
}

fn names(versions: &[Version]) -> Vec<&str> {
    versions.iter().map(|v| v.as_str()).collect()
}

#[tokio::test]
async fn test_applies_pending_steps_in_release_order() {
    let mut h = harness(FakeGateway::at_version("1.9"));

    let applied = h.runner.migrate("14.10").await.unwrap();

    assert_eq!(names(&applied), vec!["1.10", "1.12", "14", "14.8", "14.10"]);
    assert_eq!(h.db.marker_writes(), vec!["1.10", "1.12", "14", "14.8", "14.10"]);
    assert_eq!(h.db.marker().as_deref(), Some("14.10"));
    assert_eq!(
        h.runner.current_version().map(|v| v.as_str()),
        Some("14.10")
    );
}

#[tokio::test]
async fn test_each_step_is_followed_by_its_marker_write() {
    let mut h = harness(FakeGateway::at_version("14"));

    h.runner.migrate("14.10").await.unwrap();

    let relevant: Vec<String> = h
        .db
        .statements()
        .into_iter()
        .filter(|s| s.contains("`payload`") || s.contains("SET `version`"))
        .collect();
    assert_eq!(
        relevant,
        vec![
            "UPDATE `payload` SET `applied` = '14.8'",
            "UPDATE `main` SET `version` = ?",
            "UPDATE `payload` SET `applied` = '14.10'",
            "UPDATE `main` SET `version` = ?",
        ]
    );
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let mut h = harness(FakeGateway::at_version("1.9"));
    h.runner.migrate("14.10").await.unwrap();
    let statements_after_first = h.db.statements().len();

    let applied = h.runner.migrate("14.10").await.unwrap();

    assert!(applied.is_empty());
    assert_eq!(h.db.statements().len(), statements_after_first);
    assert!(h.console.contains("Database is up to date (version 14.10)"));
}

#[tokio::test]
async fn test_marker_never_goes_backwards() {
    let mut h = harness(FakeGateway::at_version("17"));

    let applied = h.runner.migrate("14.10").await.unwrap();

    assert!(applied.is_empty());
    assert!(h.db.marker_writes().is_empty());
    assert_eq!(h.db.marker().as_deref(), Some("17"));
}

#[tokio::test]
async fn test_failure_keeps_last_successful_version() {
    let mut h = harness(FakeGateway::at_version("1.9").fail_on("'14.8'"));

    let err = h.runner.migrate("14.10").await.unwrap_err();

    match &err {
        MigrationError::StepExecution {
            failed,
            last_applied,
            statements_completed,
            ..
        } => {
            assert_eq!(failed.as_str(), "14.8");
            assert_eq!(last_applied.as_str(), "14");
            assert_eq!(*statements_completed, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.db.marker().as_deref(), Some("14"));
    assert!(h.db.executed_containing("'14.10'").is_empty());
    assert_eq!(err.last_applied().map(|v| v.as_str()), Some("14"));

    let message = err.to_string();
    assert!(message.contains("from version 14 to version 14.8"));
    assert!(message.contains("inspect it manually"));
}

#[tokio::test]
async fn test_failure_reports_completed_statements() {
    let step = VersionStep::new(Version::parse("17.12").unwrap(), "two statements")
        .sql("ALTER TABLE `a` ADD COLUMN `x` INT")
        .sql("ALTER TABLE `b` ADD COLUMN `y` INT")
        .sql("ALTER TABLE `broken` ADD COLUMN `z` INT");
    let catalog = VersionCatalog::new(vec![step]).unwrap();
    let mut h = harness_with(FakeGateway::at_version("17").fail_on("`broken`"), catalog, |_| {});

    match h.runner.migrate("17.12").await.unwrap_err() {
        MigrationError::StepExecution {
            statements_completed,
            ..
        } => assert_eq!(statements_completed, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.db.marker().as_deref(), Some("17"));
}

#[tokio::test]
async fn test_latest_releases_from_17() {
    let mut h = harness(FakeGateway::at_version("17"));

    let applied = h.runner.migrate("17.13").await.unwrap();

    assert_eq!(names(&applied), vec!["17.12", "17.13"]);
    assert_eq!(h.db.marker().as_deref(), Some("17.13"));
}

#[tokio::test]
async fn test_already_at_target() {
    let mut h = harness(FakeGateway::at_version("17.13"));

    let applied = h.runner.migrate("17.13").await.unwrap();

    assert!(applied.is_empty());
    assert!(h.db.executed_containing("`payload`").is_empty());
    assert!(!h.console.contains("DO NOT INTERRUPT"));
}

#[tokio::test]
async fn test_unknown_target_touches_nothing() {
    let mut h = harness(FakeGateway::at_version("1.9"));

    let err = h.runner.migrate("15").await.unwrap_err();

    assert!(matches!(err, MigrationError::UnknownTargetVersion(ref v) if v == "15"));
    assert!(h.db.statements().is_empty());
    assert!(h.db.queries().is_empty());
}

#[tokio::test]
async fn test_target_must_match_catalog_text() {
    let mut h = harness(FakeGateway::at_version("1.9"));

    let err = h.runner.migrate("14.0").await.unwrap_err();

    assert!(matches!(err, MigrationError::UnknownTargetVersion(_)));
}

#[tokio::test]
async fn test_lock_refused() {
    let mut h = harness(FakeGateway::at_version("1.9").refuse_lock());

    let err = h.runner.migrate("17.13").await.unwrap_err();

    assert!(matches!(err, MigrationError::LockUnavailable { ref name } if name == "highlander_dbpatcher"));
    assert!(h.db.queries().is_empty());
    assert_eq!(h.db.marker().as_deref(), Some("1.9"));
}

#[tokio::test]
async fn test_lock_released_after_failure() {
    let mut h = harness(FakeGateway::at_version("1.9").fail_on("'14'"));

    assert!(h.runner.migrate("14.10").await.is_err());
    assert!(h.db.held_locks().is_empty());
}

#[tokio::test]
async fn test_cancel_before_first_step() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let h = harness(FakeGateway::at_version("1.9"));
    let mut runner = h.runner.with_cancel_flag(cancel);

    let err = runner.migrate("17.13").await.unwrap_err();

    match err {
        MigrationError::Cancelled { last_applied } => assert_eq!(last_applied.as_str(), "1.9"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.db.marker_writes().is_empty());
    assert!(h.db.held_locks().is_empty());
}

#[tokio::test]
async fn test_missing_marker() {
    let mut h = harness(FakeGateway::without_marker());

    let err = h.runner.migrate("17.13").await.unwrap_err();

    assert!(matches!(err, MigrationError::MissingVersionMarker { ref table } if table == "`main`"));
    assert!(h.db.held_locks().is_empty());
}

#[tokio::test]
async fn test_unparseable_marker() {
    let mut h = harness(FakeGateway::at_version("seventeen"));

    let err = h.runner.migrate("17.13").await.unwrap_err();

    assert!(matches!(err, MigrationError::InvalidVersionMarker { ref value, .. } if value == "seventeen"));
}

#[tokio::test]
async fn test_marker_write_failure_is_distinct() {
    let mut h = harness(FakeGateway::at_version("17.12").fail_on("SET `version`"));

    let err = h.runner.migrate("17.13").await.unwrap_err();

    match err {
        MigrationError::MarkerUpdate {
            applied,
            last_applied,
            ..
        } => {
            assert_eq!(applied.as_str(), "17.13");
            assert_eq!(last_applied.as_str(), "17.12");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_transactional_rollback_on_failure() {
    let mut h = harness_with(
        FakeGateway::at_version("14").fail_on("'14.10'"),
        marker_catalog(HIGHLANDER_VERSIONS),
        |s| s.transactional = true,
    );

    assert!(h.runner.migrate("14.10").await.is_err());

    let control: Vec<String> = h
        .db
        .statements()
        .into_iter()
        .filter(|s| matches!(s.as_str(), "START TRANSACTION" | "COMMIT" | "ROLLBACK"))
        .collect();
    assert_eq!(control, vec!["START TRANSACTION", "COMMIT", "START TRANSACTION", "ROLLBACK"]);
    assert_eq!(h.db.marker().as_deref(), Some("14.8"));
}

#[tokio::test]
async fn test_console_audit_trail() {
    let mut h = harness(FakeGateway::at_version("17"));

    h.runner.migrate("17.13").await.unwrap();

    let lines = h.console.lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("missing console line: {needle}"))
    };
    assert!(position("DO NOT INTERRUPT") < position("Updating to 17.12 ..."));
    assert!(position("Updating to 17.12 ...") < position("UPDATE `payload` SET `applied` = '17.12'"));
    assert!(
        position("UPDATE `payload` SET `applied` = '17.12'")
            < position("UPDATE `main` SET `version` = '17.12'")
    );
    assert!(position("UPDATE `main` SET `version` = '17.13'") < position("Database updated to version 17.13"));
}

#[tokio::test]
async fn test_history_rows_follow_applied_steps() {
    let mut h = harness(FakeGateway::at_version("14.8"));

    h.runner.migrate("17.12").await.unwrap();

    assert_eq!(h.db.executed_containing("CREATE TABLE IF NOT EXISTS `dbpatcher_history`").len(), 1);
    let inserts: Vec<String> = h
        .db
        .executed_with_params()
        .into_iter()
        .filter(|(sql, _)| sql.starts_with("INSERT INTO `dbpatcher_history`"))
        .filter_map(|(_, params)| params.first().and_then(|p| p.to_text()))
        .collect();
    assert_eq!(inserts, vec!["14.10", "17", "17.12"]);
}

#[tokio::test]
async fn test_history_failure_does_not_fail_step() {
    let mut h = harness(FakeGateway::at_version("17").fail_on("INSERT INTO `dbpatcher_history`"));

    let applied = h.runner.migrate("17.13").await.unwrap();

    assert_eq!(names(&applied), vec!["17.12", "17.13"]);
    assert_eq!(h.db.marker().as_deref(), Some("17.13"));
}

#[tokio::test]
async fn test_history_table_creation_failure_does_not_block_upgrade() {
    let mut h = harness(FakeGateway::at_version("17").fail_on("CREATE TABLE IF NOT EXISTS `dbpatcher_history`"));

    let applied = h.runner.migrate("17.13").await.unwrap();

    assert_eq!(names(&applied), vec!["17.12", "17.13"]);
    assert_eq!(h.db.marker().as_deref(), Some("17.13"));
    assert!(h.db.executed_containing("dbpatcher_history").is_empty());
}

#[tokio::test]
async fn test_history_disabled() {
    let mut h = harness_with(
        FakeGateway::at_version("17"),
        marker_catalog(HIGHLANDER_VERSIONS),
        |s| s.history = None,
    );

    h.runner.migrate("17.13").await.unwrap();

    assert!(h.db.executed_containing("dbpatcher_history").is_empty());
}

#[tokio::test]
async fn test_per_tenant_statements_run_for_every_analysis() {
    let step = VersionStep::new(Version::parse("17.12").unwrap(), "per analysis")
        .per_tenant("ALTER TABLE `{tenant}_sample_annotations` ADD COLUMN `x` INT");
    let catalog = VersionCatalog::new(vec![step]).unwrap();
    let mut h = harness_with(
        FakeGateway::at_version("17").with_tenants(&["exomes", "genomes", "panels"]),
        catalog,
        |_| {},
    );

    h.runner.migrate("17.12").await.unwrap();

    assert_eq!(
        h.db.executed_containing("ADD COLUMN `x`"),
        vec![
            "ALTER TABLE `exomes_sample_annotations` ADD COLUMN `x` INT",
            "ALTER TABLE `genomes_sample_annotations` ADD COLUMN `x` INT",
            "ALTER TABLE `panels_sample_annotations` ADD COLUMN `x` INT",
        ]
    );
}

#[tokio::test]
async fn test_unsafe_tenant_name_fails_the_step() {
    let step = VersionStep::new(Version::parse("17.12").unwrap(), "per analysis")
        .per_tenant("DROP TABLE `{tenant}_tmp`");
    let catalog = VersionCatalog::new(vec![step]).unwrap();
    let mut h = harness_with(
        FakeGateway::at_version("17").with_tenants(&["exomes`; DROP TABLE `users"]),
        catalog,
        |_| {},
    );

    let err = h.runner.migrate("17.12").await.unwrap_err();

    assert!(matches!(err, MigrationError::StepExecution { .. }));
    assert!(h.db.executed_containing("DROP TABLE").is_empty());
}

#[tokio::test]
async fn test_plan_has_no_side_effects() {
    let mut h = harness(FakeGateway::at_version("14.8"));

    let plan = h.runner.plan("17.13").await.unwrap();

    assert_eq!(plan.current.as_str(), "14.8");
    assert_eq!(plan.target.as_str(), "17.13");
    assert_eq!(names(&plan.pending), vec!["14.10", "17", "17.12", "17.13"]);
    assert!(h.db.statements().is_empty());
    assert!(h.db.held_locks().is_empty());
}
