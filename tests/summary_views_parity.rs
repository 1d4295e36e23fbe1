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
fn admin_view_and_student_dashboard_return_identical_payloads() {
    let workspace = temp_dir("feesd-views-parity");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.bootstrapAdmin",
        json!({ "username": "head", "password": "opensesame" }),
    );
    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "role": "admin", "username": "head", "password": "opensesame" }),
    );
    let admin_token = admin.get("token").and_then(|v| v.as_str()).expect("token");

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({ "sessionToken": admin_token, "name": "History", "standardFee": 800.0 }),
    );
    let subject_id = subject
        .get("subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({
            "sessionToken": admin_token,
            "name": "Asha Rao",
            "category": "General",
            "password": "pw12345"
        }),
    );
    let student_id = student
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "enrollments.create",
        json!({ "sessionToken": admin_token, "studentId": student_id, "subjectId": subject_id }),
    );
    let concession = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "concessions.create",
        json!({ "sessionToken": admin_token, "reason": "Sibling", "discountPercent": 25.0 }),
    );
    let concession_type_id = concession
        .get("concessionTypeId")
        .and_then(|v| v.as_str())
        .expect("concessionTypeId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "concessions.assign",
        json!({
            "sessionToken": admin_token,
            "studentId": student_id,
            "concessionTypeId": concession_type_id
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "fees.pay",
        json!({
            "sessionToken": admin_token,
            "studentId": student_id,
            "subjectId": subject_id,
            "amount": 100.0,
            "paymentDate": "2024-06-01"
        }),
    );

    let admin_view = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "students.summary",
        json!({ "sessionToken": admin_token, "studentId": student_id }),
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "auth.login",
        json!({ "role": "student", "studentId": student_id, "password": "pw12345" }),
    );
    let student_token = login.get("token").and_then(|v| v.as_str()).expect("token");

    let dashboard = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "dashboard.open",
        json!({ "sessionToken": student_token, "studentId": student_id }),
    );

    // The two handlers share one fetch-and-compute path; the payloads must
    // match field for field.
    assert_eq!(admin_view, dashboard);

    let summary = dashboard.get("financialSummary").expect("financialSummary");
    assert_eq!(summary.get("rawTotal").and_then(|v| v.as_f64()), Some(800.0));
    assert_eq!(summary.get("totalDue").and_then(|v| v.as_f64()), Some(600.0));
    assert_eq!(summary.get("balance").and_then(|v| v.as_f64()), Some(500.0));

    // A second student exists only to prove cross-access is rejected.
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "students.create",
        json!({ "sessionToken": admin_token, "name": "Vikram Iyer", "password": "pw67890" }),
    );
    let other_id = other
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId");

    let denied = request(
        &mut stdin,
        &mut reader,
        "14",
        "dashboard.open",
        json!({ "sessionToken": student_token, "studentId": other_id }),
    );
    assert_eq!(denied.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&denied), "forbidden");

    // Admins can open any dashboard.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "dashboard.open",
        json!({ "sessionToken": admin_token, "studentId": other_id }),
    );

    // The admin-only summary stays admin-only.
    let summary_denied = request(
        &mut stdin,
        &mut reader,
        "16",
        "students.summary",
        json!({ "sessionToken": student_token, "studentId": student_id }),
    );
    assert_eq!(error_code(&summary_denied), "forbidden");

    // Unknown students short-circuit before the calculator.
    let missing = request(
        &mut stdin,
        &mut reader,
        "17",
        "students.summary",
        json!({ "sessionToken": admin_token, "studentId": "no-such-student" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
