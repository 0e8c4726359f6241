use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary run from an empty directory with no database configured
fn dbpatcher(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dbpatcher").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .env_remove("DBPATCHER_USERNAME")
        .env_remove("DBPATCHER_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_shows_every_release() -> Result<()> {
    let dir = TempDir::new()?;
    dbpatcher(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available versions:"))
        .stdout(predicate::str::contains("1.9"))
        .stdout(predicate::str::contains("14.10"))
        .stdout(predicate::str::contains("17.13"));
    Ok(())
}

#[test]
fn test_migrate_rejects_unknown_version_before_connecting() -> Result<()> {
    let dir = TempDir::new()?;
    dbpatcher(&dir)
        .args(["migrate", "--to", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown target version '99'"));
    Ok(())
}

#[test]
fn test_migrate_requires_target() -> Result<()> {
    let dir = TempDir::new()?;
    dbpatcher(&dir)
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--to"));
    Ok(())
}

#[test]
fn test_status_without_database_url() -> Result<()> {
    let dir = TempDir::new()?;
    dbpatcher(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database URL configured"));
    Ok(())
}

#[test]
fn test_invalid_config_file_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("dbpatcher.yaml"), "patcher:\n  unknown_key: 1\n")?;
    dbpatcher(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
    Ok(())
}
