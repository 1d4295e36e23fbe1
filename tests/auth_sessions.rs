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
    let exe = env!("CARGO_BIN_EXE_feesd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn feesd");
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
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

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn sessions_gate_every_privileged_method() {
    let workspace = temp_dir("feesd-auth-sessions");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Nothing privileged works without a token.
    let no_token = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(error_code(&no_token), "auth_required");

    // No admin exists yet, so no credential can log in.
    let early_login = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "role": "admin", "username": "head", "password": "opensesame" }),
    );
    assert_eq!(error_code(&early_login), "invalid_credentials");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.bootstrapAdmin",
        json!({ "username": "head", "password": "opensesame" }),
    );
    let second_bootstrap = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.bootstrapAdmin",
        json!({ "username": "other", "password": "whatever" }),
    );
    assert_eq!(error_code(&second_bootstrap), "already_bootstrapped");

    let wrong_password = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.login",
        json!({ "role": "admin", "username": "head", "password": "guess" }),
    );
    assert_eq!(error_code(&wrong_password), "invalid_credentials");

    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "auth.login",
        json!({ "role": "admin", "username": "head", "password": "opensesame" }),
    );
    let admin_token = admin.get("token").and_then(|v| v.as_str()).expect("token");

    let bogus = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.list",
        json!({ "sessionToken": "not-a-real-token" }),
    );
    assert_eq!(error_code(&bogus), "invalid_session");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "sessionToken": admin_token }),
    );

    // A student created without a password gets a generated one, usable for
    // login exactly as returned.
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "students.create",
        json!({ "sessionToken": admin_token, "name": "Asha Rao" }),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId");
    let generated = student
        .get("generatedPassword")
        .and_then(|v| v.as_str())
        .expect("generatedPassword");

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "auth.login",
        json!({ "role": "student", "studentId": student_id, "password": generated }),
    );
    let student_token = login.get("token").and_then(|v| v.as_str()).expect("token");
    assert_eq!(login.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(
        login.get("studentId").and_then(|v| v.as_str()),
        Some(student_id)
    );

    // Student sessions never reach admin methods.
    for (id, method, params) in [
        ("12", "students.list", json!({ "sessionToken": student_token })),
        (
            "13",
            "subjects.create",
            json!({ "sessionToken": student_token, "name": "Art", "standardFee": 100.0 }),
        ),
        (
            "14",
            "fees.pay",
            json!({
                "sessionToken": student_token,
                "studentId": student_id,
                "subjectId": "irrelevant",
                "amount": 10.0
            }),
        ),
    ] {
        let denied = request(&mut stdin, &mut reader, id, method, params);
        assert_eq!(error_code(&denied), "forbidden", "method {}", method);
    }

    // A student created with an explicit password gets no generated one back.
    let explicit = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "students.create",
        json!({ "sessionToken": admin_token, "name": "Vikram Iyer", "password": "pw12345" }),
    );
    assert!(explicit.get("generatedPassword").is_none());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
