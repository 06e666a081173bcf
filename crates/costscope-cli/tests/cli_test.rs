use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EXPORT: &str = "\
Conta,Serviço,Subserviço,Custo: Janeiro/2024,Custo: Fevereiro/2024,Custo: Março/2024,Custo: Abril/2024,Custo: Maio/2024,Custo: Junho/2024
acct,Compute,,100,100,100,100,100,300
acct,Compute,VM Standard,60,60,60,60,60,60
acct,Storage,,50,50,50,50,50,50
";

fn write_export(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("costs.csv");
    fs::write(&path, EXPORT)?;
    Ok(path)
}

/// Command that never reads the user's own config file
fn costscope(config: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("costscope")?;
    cmd.env_remove("COSTSCOPE_CONFIG").arg("--config").arg(config);
    Ok(cmd)
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    Command::cargo_bin("costscope")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("anomalies"))
        .stdout(predicate::str::contains("project"));

    Ok(())
}

#[test]
fn test_parse_summary() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    costscope(&dir.path().join("none.toml"))?
        .arg("parse")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Janeiro/2024, Fevereiro/2024"))
        .stdout(predicate::str::contains("Services: 2"))
        .stdout(predicate::str::contains("VM Standard"));

    Ok(())
}

#[test]
fn test_parse_json() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    let output = costscope(&dir.path().join("none.toml"))?
        .arg("parse")
        .arg(&export)
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let data: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(data["months"].as_array().unwrap().len(), 6);
    assert_eq!(data["totalsByMonth"]["Junho/2024"], 350.0);

    Ok(())
}

#[test]
fn test_analyze_text() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    costscope(&dir.path().join("none.toml"))?
        .arg("analyze")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total cost: 1100.00"))
        .stdout(predicate::str::contains("Anomalies (1):"))
        .stdout(predicate::str::contains("Recomendamos revisar regularmente"));

    Ok(())
}

#[test]
fn test_analyze_json() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    let output = costscope(&dir.path().join("none.toml"))?
        .arg("analyze")
        .arg(&export)
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let analysis: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(analysis["totalCost"], 1100.0);
    assert_eq!(analysis["anomalies"][0]["service"], "Compute");
    assert!(analysis["periodComparison"].is_object());
    assert_eq!(
        analysis["serviceHeatmap"],
        serde_json::json!([
            [100.0, 100.0, 100.0, 100.0, 100.0, 300.0],
            [50.0, 50.0, 50.0, 50.0, 50.0, 50.0]
        ])
    );

    Ok(())
}

#[test]
fn test_anomalies_report() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    costscope(&dir.path().join("none.toml"))?
        .arg("anomalies")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("high"))
        .stdout(predicate::str::contains("Junho/2024"))
        .stdout(predicate::str::contains("Outlier months:"))
        .stdout(predicate::str::contains("Rapid growth:"));

    Ok(())
}

#[test]
fn test_anomalies_respect_config_file() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;
    let config = dir.path().join("config.toml");
    fs::write(&config, "sensitivity_threshold = 500.0\n")?;

    costscope(&config)?
        .arg("anomalies")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("No anomalies detected"));

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;
    let config = dir.path().join("config.toml");
    fs::write(&config, "current_period_months = 0\n")?;

    costscope(&config)?
        .arg("compare")
        .arg(&export)
        .assert()
        .failure()
        .stderr(predicate::str::contains("current_period_months"));

    Ok(())
}

#[test]
fn test_compare_with_custom_windows() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    let output = costscope(&dir.path().join("none.toml"))?
        .arg("compare")
        .arg(&export)
        .arg("--current")
        .arg("2")
        .arg("--previous")
        .arg("2")
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        result["currentPeriod"]["months"],
        serde_json::json!(["Maio/2024", "Junho/2024"])
    );
    assert_eq!(
        result["previousPeriod"]["months"],
        serde_json::json!(["Março/2024", "Abril/2024"])
    );

    Ok(())
}

#[test]
fn test_project_months() -> Result<()> {
    let dir = TempDir::new()?;
    let export = write_export(&dir)?;

    costscope(&dir.path().join("none.toml"))?
        .arg("project")
        .arg(&export)
        .arg("--months")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Julho/2024"))
        .stdout(predicate::str::contains("Agosto/2024"))
        .stdout(predicate::str::contains("Setembro/2024").not());

    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let dir = TempDir::new()?;

    costscope(&dir.path().join("none.toml"))?
        .arg("analyze")
        .arg(dir.path().join("missing.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));

    Ok(())
}

#[test]
fn test_malformed_export_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let export = dir.path().join("bad.csv");
    fs::write(&export, "Conta,Serviço,Subserviço,Total\nacct,Compute,,10\n")?;

    costscope(&dir.path().join("none.toml"))?
        .arg("parse")
        .arg(&export)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));

    Ok(())
}
