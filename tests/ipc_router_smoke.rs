use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_boletimd");
    let mut child = Command::new(exe)
        .env_remove("BOLETIMD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn boletimd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected error: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

const STORE_METHODS: &[&str] = &[
    "students.list",
    "students.add",
    "students.beginEdit",
    "students.edit",
    "students.cancelEdit",
    "students.delete",
    "form.get",
    "form.update",
    "backup.exportWorkspaceBundle",
];

#[test]
fn store_methods_require_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(
        health.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    for (i, method) in STORE_METHODS.iter().enumerate() {
        let params = if *method == "backup.exportWorkspaceBundle" {
            json!({ "outPath": "/tmp/never-written.zip" })
        } else {
            json!({})
        };
        let res = request(&mut stdin, &mut reader, &format!("m{i}"), method, params);
        assert_eq!(error_code(&res), "no_workspace", "{method}");
    }

    let res = request(&mut stdin, &mut reader, "sel", "workspace.select", json!({}));
    assert_eq!(error_code(&res), "bad_params");
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("boletimd-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let calls = [
        ("form.get", json!({})),
        ("form.update", json!({ "patch": { "name": "Smoke", "score1": "7" } })),
        ("students.add", json!({})),
        ("students.list", json!({})),
        ("students.beginEdit", json!({ "id": 1 })),
        ("students.edit", json!({ "id": 1 })),
        ("students.cancelEdit", json!({})),
        ("students.delete", json!({ "id": 1, "confirmed": false })),
        (
            "backup.exportWorkspaceBundle",
            json!({ "outPath": bundle_out.to_string_lossy() }),
        ),
        (
            "backup.importWorkspaceBundle",
            json!({ "inPath": bundle_out.to_string_lossy() }),
        ),
    ];
    for (i, (method, params)) in calls.iter().enumerate() {
        let res = request(&mut stdin, &mut reader, &format!("c{i}"), method, params.clone());
        if res.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            assert_ne!(error_code(&res), "not_implemented", "{method}");
        }
    }

    let res = request(&mut stdin, &mut reader, "u", "students.frobnicate", json!({}));
    assert_eq!(error_code(&res), "not_implemented");

    let health = request_ok(&mut stdin, &mut reader, "h", "health", json!({}));
    let expected = workspace.to_string_lossy().to_string();
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(expected.as_str())
    );
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write");
    writeln!(stdin).expect("write blank");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value.get("error").and_then(|e| e.get("code")).and_then(|v| v.as_str()),
        Some("bad_json")
    );

    let _ = request_ok(&mut stdin, &mut reader, "after", "health", json!({}));
}

#[test]
fn workspace_flag_opens_at_startup() {
    let workspace = temp_dir("boletimd-flag");
    let exe = env!("CARGO_BIN_EXE_boletimd");
    let mut child = Command::new(exe)
        .arg("--workspace")
        .arg(&workspace)
        .arg("--log-filter")
        .arg("debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn boletimd");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    let list = request_ok(&mut stdin, &mut reader, "1", "students.list", json!({}));
    assert_eq!(list.get("count").and_then(|v| v.as_i64()), Some(0));
    assert!(workspace.join("boletim.sqlite3").is_file());

    drop(stdin);
    let _ = child.wait();
}
