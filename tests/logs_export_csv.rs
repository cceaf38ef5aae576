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
    let exe = env!("CARGO_BIN_EXE_frontdeskd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn frontdeskd");
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
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn register(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "students.register",
        json!({
            "fullName": name,
            "email": format!("{}@example.com", id),
            "phone": "555-0100",
            "sessions": "10"
        }),
    );
    result
        .pointer("/student/studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string()
}

#[test]
fn filtered_export_writes_header_plus_matching_rows() {
    let workspace = temp_dir("frontdesk-export");
    let out = workspace.join("filtered.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let dana = register(&mut stdin, &mut reader, "2", "Dana Export");
    let lee = register(&mut stdin, &mut reader, "3", "Lee Noise");

    for (i, id) in [&dana, &dana, &lee].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "checkin.confirm",
            json!({ "studentId": id }),
        );
    }

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "logs.export",
        json!({ "search": "dana", "outPath": out.to_string_lossy() }),
    );
    assert_eq!(exported.get("rowCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        exported.get("outPath").and_then(|v| v.as_str()),
        Some(out.to_string_lossy().as_ref())
    );

    let content = std::fs::read_to_string(&out).expect("read export");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3, "header plus two rows:\n{}", content);
    assert_eq!(
        lines[0],
        "Date,Time,Student Name,Student ID,Session Number,Receptionist"
    );

    // Newest first: Dana's second session before her first.
    for (line, expected_ordinal) in lines[1..].iter().zip(["2", "1"]) {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 6, "line {:?}", line);
        assert_eq!(fields[2], "Dana Export");
        assert_eq!(fields[3], dana);
        assert_eq!(fields[4], expected_ordinal);
        assert_eq!(fields[5], "Reception Staff");
        assert!(!fields[0].is_empty() && !fields[1].is_empty());
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn export_defaults_to_date_stamped_file_in_workspace() {
    let workspace = temp_dir("frontdesk-export-default");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let id = register(&mut stdin, &mut reader, "2", "Solo Export");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "checkin.confirm",
        json!({ "studentId": id }),
    );

    let exported = request_ok(&mut stdin, &mut reader, "4", "logs.export", json!({}));
    let out_path = exported
        .get("outPath")
        .and_then(|v| v.as_str())
        .expect("outPath")
        .to_string();
    let name = PathBuf::from(&out_path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    assert!(name.starts_with("attendance-logs-"), "name {}", name);
    assert!(name.ends_with(".csv"), "name {}", name);
    assert!(PathBuf::from(&out_path).is_file());

    let _ = std::fs::remove_dir_all(workspace);
}
