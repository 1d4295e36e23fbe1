use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_admin;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn student_exists(conn: &Connection, student_id: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn subject_exists(conn: &Connection, subject_id: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [subject_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn is_enrolled(conn: &Connection, student_id: &str, subject_id: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND subject_id = ?",
            [student_id, subject_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn handle_enrollments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(conn, req) {
        return resp;
    }

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };

    match student_exists(conn, &student_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match subject_exists(conn, &subject_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "subject not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match is_enrolled(conn, &student_id, &subject_id) {
        Ok(false) => {}
        Ok(true) => return err(&req.id, "duplicate", "already enrolled", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(student_id, subject_id, enrolled_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&student_id, &subject_id),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    ok(&req.id, json!({ "studentId": student_id, "subjectId": subject_id }))
}

fn handle_marks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(conn, req) {
        return resp;
    }

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let marks = match req.params.get("marks").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "marks must be a number", None),
    };
    let grade = match req.params.get("grade").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing grade", None),
    };

    // Marks attach to an enrollment; a record for an un-enrolled pair would
    // never surface in any view.
    match is_enrolled(conn, &student_id, &subject_id) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "not_enrolled",
                "student is not enrolled in this subject",
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let existing: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM academic_records WHERE student_id = ? AND subject_id = ?",
            [&student_id, &subject_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let outcome = if existing.is_some() {
        conn.execute(
            "UPDATE academic_records
             SET marks = ?, grade = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE student_id = ? AND subject_id = ?",
            (marks, &grade, &student_id, &subject_id),
        )
        .map(|_| "updated")
    } else {
        conn.execute(
            "INSERT INTO academic_records(student_id, subject_id, marks, grade, updated_at)
             VALUES(?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (&student_id, &subject_id, marks, &grade),
        )
        .map(|_| "inserted")
    };

    match outcome {
        Ok(action) => ok(&req.id, json!({ "action": action })),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "academic_records" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_enrollments_create(state, req)),
        "marks.update" => Some(handle_marks_update(state, req)),
        _ => None,
    }
}
