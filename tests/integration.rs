use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fbp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("fbp");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("seed.jsonl"),
        concat!(
            r#"{"source":"github","author":"@ana","content":"Search results are 100% wrong","created_at":"2026-01-05T10:00:00Z"}"#,
            "\n",
            r#"{"source":"Discord","content":"Love the new onboarding flow"}"#,
            "\n",
            "\n",
            r#"{"source":"email","author":"ops@example.com","content":"Invoice totals do not match","created_at":"2020-03-01"}"#,
            "\n",
        ),
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/fbp.sqlite"

[server]
bind = "127.0.0.1:8787"

[analysis]
batch_size = 3
"#,
        root.display()
    );

    let config_path = config_dir.join("fbp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_fbp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fbp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fbp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn init_and_import(config: &Path, tmp: &TempDir) {
    let (_, stderr, success) = run_fbp(config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let seed = tmp.path().join("seed.jsonl");
    let (stdout, stderr, success) = run_fbp(config, &["import", seed.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 3 records (ids 1..=3)"), "got: {}", stdout);
}

fn list_json(config: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["list", "--json"];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_fbp(config, &args);
    assert!(success, "list failed: {}", stderr);
    serde_json::from_str(&stdout).unwrap()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_fbp(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/fbp.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, s1) = run_fbp(&config, &["init"]);
    let (_, _, s2) = run_fbp(&config, &["init"]);
    assert!(s1 && s2);
}

#[test]
fn test_import_and_list() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let body = list_json(&config, &[]);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["pages"], 1);
    let data = body["data"].as_array().unwrap();
    // Newest first; the backdated email comes last.
    assert_eq!(data[2]["source"], "email");
    assert_eq!(data[2]["created_at"], "2020-03-01 00:00:00");
    // Sources are normalized to lowercase on import.
    assert!(data.iter().any(|r| r["source"] == "discord"));
}

#[test]
fn test_list_filters() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let body = list_json(&config, &["--source", "GITHUB"]);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["author"], "@ana");

    let body = list_json(&config, &["--search", "%"]);
    assert_eq!(body["meta"]["total"], 1);

    let body = list_json(&config, &["--limit", "2", "--offset", "2"]);
    assert_eq!(body["meta"]["currentPage"], 2);
    assert_eq!(body["meta"]["pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[test]
fn test_list_rejects_unknown_sentiment() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (_, stderr, success) = run_fbp(&config, &["list", "--sentiment", "happy"]);
    assert!(!success);
    assert!(stderr.contains("happy"), "got: {}", stderr);
}

#[test]
fn test_list_text_output() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (stdout, _, success) = run_fbp(&config, &["list"]);
    assert!(success);
    assert!(stdout.contains("(not analyzed)"));
    assert!(stdout.contains("page 1 of 1 (3 total)"));
}

#[test]
fn test_stats_json() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (stdout, stderr, success) = run_fbp(&config, &["stats", "--json"]);
    assert!(success, "stats failed: {}", stderr);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["bySentiment"][0]["sentiment"], serde_json::Value::Null);
    assert_eq!(stats["bySentiment"][0]["count"], 3);
    assert_eq!(stats["topThemes"], serde_json::json!([]));
}

#[test]
fn test_stats_text() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (stdout, _, success) = run_fbp(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Total:"));
    assert!(stdout.contains("By source:"));
    assert!(stdout.contains("(unanalyzed)"));
}

#[test]
fn test_analyze_errors_when_disabled() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (_, stderr, success) = run_fbp(&config, &["analyze", "1"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "got: {}", stderr);

    // Nothing was written.
    let body = list_json(&config, &[]);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["analyzed_at"].is_null()));
}

#[test]
fn test_analyze_bulk_reports_every_failure() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (stdout, _, success) = run_fbp(
        &config,
        &["analyze", "--unanalyzed", "--progress", "off"],
    );
    assert!(!success);
    assert!(stdout.contains("Analyzed 0 of 3 records in 1 batches (3 failed)"), "got: {}", stdout);
}

#[test]
fn test_analyze_requires_selection() {
    let (tmp, config) = setup_test_env();
    init_and_import(&config, &tmp);

    let (_, stderr, success) = run_fbp(&config, &["analyze"]);
    assert!(!success);
    assert!(stderr.contains("--unanalyzed"));

    let (_, stderr, success) = run_fbp(&config, &["analyze", "abc"]);
    assert!(!success);
    assert!(stderr.contains("Invalid feedback ID"));
}

#[test]
fn test_import_rejects_bad_record() {
    let (tmp, config) = setup_test_env();
    let (_, _, success) = run_fbp(&config, &["init"]);
    assert!(success);

    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"[{"source":"github","content":"ok"},{"source":"","content":"x"}]"#).unwrap();
    let (_, stderr, success) = run_fbp(&config, &["import", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("source must not be empty"), "got: {}", stderr);

    let body = list_json(&config, &[]);
    assert_eq!(body["meta"]["total"], 0);
}

#[test]
fn test_missing_config_errors() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_fbp(&missing, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
