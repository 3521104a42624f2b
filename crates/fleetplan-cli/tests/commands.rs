//! CLI integration tests
//!
//! Each test writes a snapshot (and optionally a config) into a temporary
//! directory and runs the built `fleetplan` binary against it.
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success, conflicts allowed unless `--strict` |
//! | 1 | Input error, or `--strict` with a critical conflict |

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "vessels": [
    { "id": "V1", "name": "Cape Aurora" },
    { "id": "V2", "name": "Cape Borealis" }
  ],
  "voyages": [
    {
      "id": "A",
      "vessel_id": "V1",
      "start_date": "2025-01-01",
      "legs": [
        { "type": "loading", "duration_days": 2, "origin": "Santos" },
        { "type": "transit", "duration_days": 5 },
        { "type": "discharge", "duration_days": 1, "origin": "Rotterdam" }
      ]
    },
    {
      "id": "B",
      "vessel_id": "V1",
      "start_date": "2025-01-05",
      "legs": [
        { "type": "transit", "duration_days": 14 }
      ]
    },
    {
      "id": "C",
      "start_date": "2025-02-01",
      "legs": [
        { "type": "ballast", "duration_days": 10 }
      ]
    }
  ]
}"#;

fn fleetplan() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fleetplan"))
}

fn write_snapshot(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("snapshot.json");
    fs::write(&path, SNAPSHOT).unwrap();
    path
}

fn run(args: &[&str], snapshot: &Path) -> Output {
    fleetplan()
        .args(args)
        .arg(snapshot)
        .output()
        .expect("failed to execute fleetplan")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

// =============================================================================
// timeline
// =============================================================================

#[test]
fn timeline_prints_one_row_per_vessel() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    let output = run(&["timeline", "--horizon", "10"], &snapshot);
    assert_eq!(output.status.code(), Some(0));

    let text = stdout(&output);
    // A renders first on disputed days
    assert!(text.contains("V1     | LLTTTTTDTT"), "{text}");
    assert!(text.contains("overlap: V1 carries A and B"), "{text}");
    assert!(!text.contains("V2"), "{text}");
}

#[test]
fn timeline_filter_masks_other_operations() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    let output = run(
        &["timeline", "--horizon", "10", "--ops", "loading,discharge"],
        &snapshot,
    );
    let text = stdout(&output);
    assert!(text.contains("V1     | LL.....D.."), "{text}");
    // Statistics come from the unfiltered grid
    assert!(text.contains("(10 of 10 vessel-days)"), "{text}");
}

#[test]
fn timeline_json_contains_grid_and_diagnostics() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    let output = run(&["timeline", "--horizon", "10", "--format", "json"], &snapshot);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    assert_eq!(report["result"]["grid"]["horizon_days"], 10);
    assert_eq!(report["result"]["grid"]["rows"][0]["vessel_id"], "V1");
    let kinds: Vec<&str> = report["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"unassigned-vessel-timeline"), "{kinds:?}");
}

#[test]
fn text_diagnostics_use_serialized_kind_names() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    let text = run(&["timeline", "--horizon", "10"], &snapshot);
    let stderr = String::from_utf8_lossy(&text.stderr);
    assert!(stderr.contains("info[unassigned-vessel-timeline]: C:"), "{stderr}");
}

// =============================================================================
// check
// =============================================================================

#[test]
fn check_reports_overlap_and_strict_decides_exit_code() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    // A runs days 0-7, B days 4-17: four shared days, medium
    let output = run(&["check", "--horizon", "30"], &snapshot);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("medium[vessel-overlap-001]"));

    let strict = run(&["check", "--strict", "--horizon", "30"], &snapshot);
    assert_eq!(strict.status.code(), Some(0), "medium conflicts pass strict mode");

    let config = dir.path().join("fleetplan.toml");
    fs::write(
        &config,
        "[detection.overlap]\nmedium_from = 1\nhigh_from = 2\ncritical_from = 3\n",
    )
    .unwrap();
    let strict_critical = fleetplan()
        .args(["check", "--strict", "--horizon", "30", "--config"])
        .arg(&config)
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(strict_critical.status.code(), Some(1));
    assert!(stdout(&strict_critical).contains("critical[vessel-overlap-001]"));
}

#[test]
fn invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[detection]\ndefault_port_capacity = 0\n").unwrap();

    let output = fleetplan()
        .args(["check", "--config"])
        .arg(&config)
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));
}

#[test]
fn missing_snapshot_is_an_error() {
    let dir = TempDir::new().unwrap();
    let output = run(&["check"], &dir.path().join("nope.json"));
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read snapshot"));
}

// =============================================================================
// annual
// =============================================================================

#[test]
fn annual_json_places_every_voyage() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir);

    let output = run(&["annual", "--year", "2025", "--format", "json"], &snapshot);
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let schedule = &report["result"];
    assert_eq!(schedule["year"], 2025);
    assert_eq!(schedule["goal"], "balance-utilization");
    assert_eq!(schedule["months"].as_array().unwrap().len(), 12);
    assert_eq!(schedule["placements"].as_array().unwrap().len(), 3);
    assert_eq!(schedule["statistics"]["placed_voyages"], 3);
}

#[test]
fn annual_text_reports_shortage_for_narrow_scope() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("full.json");
    fs::write(
        &path,
        r#"{
          "vessels": [{ "id": "V1" }],
          "voyages": [
            {
              "id": "long",
              "start_date": "2025-03-01",
              "legs": [{ "type": "transit", "duration_days": 31 }]
            },
            {
              "id": "late",
              "start_date": "2025-03-10",
              "legs": [{ "type": "transit", "duration_days": 3 }]
            }
          ]
        }"#,
    )
    .unwrap();

    let output = run(&["annual", "--year", "2025", "--strict"], &path);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("late unplaced"), "{text}");
    assert!(text.contains("critical[resource-shortage-001]"), "{text}");
}
