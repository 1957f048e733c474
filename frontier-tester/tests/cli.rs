use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "frontier-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_frontier-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("determinism"));
}

#[test]
fn cli_runs_smoke_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_frontier-tester");
    let output_path = temp_path("run");
    let status = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke,unknown",
            "--iterations",
            "1",
            "--seeds",
            "1,0x2",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let value: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let runs = value.as_array().expect("array");
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run["passed"] == true));
}

#[test]
fn cli_rejects_bad_seeds() {
    let exe = env!("CARGO_BIN_EXE_frontier-tester");
    let output = Command::new(exe)
        .args(["--seeds", "not-a-seed"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}

#[test]
fn cli_offline_replay_is_deterministic() {
    let exe = env!("CARGO_BIN_EXE_frontier-tester");
    let mut fingerprints = Vec::new();
    for label in ["offline-a", "offline-b"] {
        let dir = temp_path(label);
        let output = Command::new(exe)
            .args(["--report", "json", "--seeds", "77", "--offline-seconds", "120", "--save"])
            .arg(&dir)
            .output()
            .expect("run cli");
        assert!(output.status.success());
        let value: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("json replay");
        assert_eq!(value["created_save"], true);
        assert!(value["resource_deltas"]["wood"].as_f64().unwrap_or_default() > 0.0);
        assert!(dir.join("frontier-idle.save.v1.json").exists());
        fingerprints.push(value["fingerprint"].as_u64().expect("fingerprint"));
        let _ = std::fs::remove_dir_all(dir);
    }
    assert_eq!(fingerprints[0], fingerprints[1]);
}
