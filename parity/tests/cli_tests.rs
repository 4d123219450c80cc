use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const ORDERS: i64 = 25;

/// A throwaway copy of the `shop` fixture project, seeded with an `orders` table.
struct ParityTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl ParityTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shop");

        let dest = tmp.path().join("shop");
        Self::copy_dir(&fixture, &dest)?;

        let env = Self {
            _tmp: tmp,
            root: dest,
        };
        env.seed()?;
        Ok(env)
    }

    fn copy_dir(src: &PathBuf, dst: &PathBuf) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        std::fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    // The connection is closed before any CLI process opens the file.
    fn seed(&self) -> Result<()> {
        let conn = duckdb::Connection::open(self.db_path())?;
        conn.execute_batch(&format!(
            "CREATE TABLE orders AS
             SELECT i::BIGINT AS id,
                    'c' || (i % 3)::VARCHAR AS customer,
                    (10 + i % 5)::DOUBLE AS amount
             FROM range({ORDERS}) t(i);"
        ))?;
        Ok(())
    }

    fn db_path(&self) -> PathBuf {
        self.root.join("shop.duckdb")
    }

    fn count(&self, table: &str) -> Result<i64> {
        let conn = duckdb::Connection::open(self.db_path())?;
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(n)
    }

    fn parity(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("parity"));
        cmd.current_dir(&self.root);
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn test_run_copies_every_row() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["run", "--rule", "R001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS"))
        .stdout(predicate::str::contains("transform: identity"));

    assert_eq!(env.count("orders_copy")?, ORDERS);
    let logs: Vec<_> = std::fs::read_dir(env.root.join("target"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("run_orders_copy_"))
        .collect();
    assert_eq!(logs.len(), 1);
    Ok(())
}

#[test]
fn test_sql_rule_runs_partitioned() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["run", "-r", "orders_with_tax", "--partitioned"])
        .assert()
        .success()
        .stdout(predicate::str::contains("partitioned"))
        .stdout(predicate::str::contains("transform: sql"));

    assert_eq!(env.count("orders_with_tax")?, ORDERS);
    let conn = duckdb::Connection::open(env.db_path())?;
    let max: f64 = conn.query_row("SELECT MAX(amount_with_tax) FROM orders_with_tax", [], |r| {
        r.get(0)
    })?;
    assert!((max - 16.8).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_invalid_sql_is_rejected_before_running() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["run", "-r", "R001", "--sql", "DELETE FROM batch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only SELECT queries"));
    Ok(())
}

#[test]
fn test_validate_after_run_passes_and_writes_report() -> Result<()> {
    let env = ParityTestEnv::new()?;
    env.parity().args(["run", "-r", "R001"]).assert().success();

    env.parity()
        .args(["validate", "-r", "R001", "--scenarios", "scenarios/happy.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TEST_R001_1"))
        .stdout(predicate::str::contains("1 passed"));

    let report = std::fs::read_dir(env.root.join("target"))?
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("validation_orders_copy_")
        })
        .context("validation report not written")?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(report.path())?)?;
    assert_eq!(json["results"][0]["status"], "PASS");
    assert_eq!(json["results"][0]["records_tested"], ORDERS);
    Ok(())
}

#[test]
fn test_validate_without_target_reports_errors() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args([
            "validate",
            "-r",
            "R001",
            "--scenarios",
            "scenarios/happy.md",
            "--no-report",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ERROR"))
        .stderr(predicate::str::contains("1 errored"));

    assert!(!env.root.join("target").exists());
    Ok(())
}

#[test]
fn test_snapshot_then_rollback_restores_rows() -> Result<()> {
    let env = ParityTestEnv::new()?;
    env.parity().args(["run", "-r", "R001"]).assert().success();

    let output = env
        .parity()
        .args(["snapshot", "-t", "orders_copy"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let snapshot = stdout
        .lines()
        .find_map(|l| l.split("Snapshot created: ").nth(1))
        .and_then(|rest| rest.split_whitespace().next())
        .context("snapshot name not printed")?
        .to_string();
    assert!(snapshot.starts_with("orders_copy_snapshot_"));

    // a second run appends, and takes its own snapshot first
    env.parity()
        .args(["run", "-r", "R001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders_copy_snapshot_"));
    assert_eq!(env.count("orders_copy")?, ORDERS * 2);

    env.parity()
        .args(["rollback", "-t", "orders_copy", "-s", &snapshot, "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("now has {ORDERS} rows")));
    assert_eq!(env.count("orders_copy")?, ORDERS);

    env.parity()
        .args(["rollback", "-t", "orders_copy", "-s", &snapshot])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn test_workflow_moves_and_validates() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["workflow", "-r", "R001", "--scenarios", "scenarios/happy.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all scenarios passed"));

    assert_eq!(env.count("orders_copy")?, ORDERS);
    let exported = std::fs::read_dir(env.root.join("target"))?
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("jobs_"));
    assert!(exported);
    Ok(())
}

#[test]
fn test_scenarios_default_catalog() -> Result<()> {
    let env = ParityTestEnv::new()?;

    let output = env
        .parity()
        .args(["scenarios", "-r", "orders_copy", "--json"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let json_start = stdout.find('[').context("no JSON array printed")?;
    let scenarios: serde_json::Value = serde_json::from_str(&stdout[json_start..])?;
    let ids: Vec<&str> = scenarios
        .as_array()
        .context("expected an array")?
        .iter()
        .filter_map(|s| s["scenario_id"].as_str())
        .collect();
    assert_eq!(ids.len(), 6);
    assert_eq!(ids[0], "R001_HAPPY_001");
    Ok(())
}

#[test]
fn test_query_and_inspect() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["query", "SELECT COUNT(*) AS n FROM orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains(ORDERS.to_string()))
        .stdout(predicate::str::contains("(1 rows)"));

    env.parity()
        .args(["inspect", "-t", "orders", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("customer"))
        .stdout(predicate::str::contains("25 rows"));
    Ok(())
}

#[test]
fn test_unknown_rule_fails() -> Result<()> {
    let env = ParityTestEnv::new()?;

    env.parity()
        .args(["run", "-r", "R999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rule 'R999' not found"));
    Ok(())
}
