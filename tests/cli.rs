use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const LOG: &str = r#"203.0.113.7 - - [01/Mar/2024:09:00:00 +0000] "GET /index.html HTTP/1.1" 200 1000 "-" "Mozilla/5.0"
203.0.113.7 - - [01/Mar/2024:09:00:30 +0000] "GET /logo.png HTTP/1.1" 200 500 "http://example.com/index.html" "Mozilla/5.0"
198.51.100.4 - - [01/Mar/2024:10:00:00 +0000] "POST /login.php HTTP/1.1" 302 0 "-" "curl/8.0"
this line is not an access log entry
203.0.113.7 - - [02/Mar/2024:09:00:00 +0000] "GET /missing.html HTTP/1.1" 404 - "-" "Mozilla/5.0"
"#;

fn run_weblog_stats(args: &[&str], cwd: &Path) -> (bool, Vec<u8>, Vec<u8>) {
    let bin = std::env::var("CARGO_BIN_EXE_weblog-stats").unwrap_or_else(|_| {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("target");
        path.push("debug");
        if cfg!(windows) {
            path.push("weblog-stats.exe");
        } else {
            path.push("weblog-stats");
        }
        path.to_string_lossy().into_owned()
    });
    let output = Command::new(bin)
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("run weblog-stats");
    (output.status.success(), output.stdout, output.stderr)
}

fn write_log(dir: &Path) -> PathBuf {
    let path = dir.join("access.log");
    fs::write(&path, LOG).expect("write log");
    path
}

#[test]
fn report_without_geoip() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let (ok, stdout, stderr) =
        run_weblog_stats(&[log.to_str().unwrap(), "--no-geoip"], dir.path());
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let json: Value = serde_json::from_slice(&stdout).expect("json");
    assert_eq!(json["lines"], 5);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["distinct_addresses"], 2);

    let march = &json["months"]["2024-03"];
    assert_eq!(march["label"], "Mar");
    assert_eq!(march["hits"], 4);
    assert_eq!(march["files"], 2);
    assert_eq!(march["pages"], 3);
    assert_eq!(march["bytes"], 1500);
    assert_eq!(march["visits"], 3);

    assert_eq!(json["days"]["2024-03-01"]["visits"], 2);
    assert_eq!(json["days"]["2024-03-02"]["sites"], 1);
    assert_eq!(json["methods"][0]["method"], "GET");
    assert_eq!(json["methods"][0]["hits"], 3);
    assert!(json["countries"].as_array().unwrap().is_empty());
}

#[test]
fn top_flag_limits_rows() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let (ok, stdout, stderr) =
        run_weblog_stats(&[log.to_str().unwrap(), "--no-geoip", "--top", "1"], dir.path());
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let json: Value = serde_json::from_slice(&stdout).expect("json");
    let top = json["top_addresses"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["name"], "203.0.113.7");
    assert_eq!(top[0]["hits"], 3);
}

#[test]
fn config_file_sets_session_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());
    // With a two day timeout the Mar 2 hit continues the Mar 1 visit
    fs::write(
        dir.path().join("weblog.toml"),
        "[geoip]\nenabled = false\n\n[session]\ntimeout_secs = 172800\n",
    )
    .unwrap();

    let (ok, stdout, stderr) = run_weblog_stats(&[log.to_str().unwrap()], dir.path());
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let json: Value = serde_json::from_slice(&stdout).expect("json");
    assert_eq!(json["months"]["2024-03"]["visits"], 2);
    assert_eq!(json["days"]["2024-03-02"]["visits"], 0);
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.log");

    let (ok, stdout, stderr) =
        run_weblog_stats(&[missing.to_str().unwrap(), "--no-geoip"], dir.path());
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(String::from_utf8_lossy(&stderr).contains("Failed to open log file"));
}

#[test]
fn missing_geoip_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());
    let db = dir.path().join("absent.mmdb");

    let (ok, stdout, _stderr) = run_weblog_stats(
        &[log.to_str().unwrap(), "--geoip-db", db.to_str().unwrap()],
        dir.path(),
    );
    assert!(!ok);
    assert!(stdout.is_empty());
}
