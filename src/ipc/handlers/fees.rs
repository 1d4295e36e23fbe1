use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_admin;
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_fees_pay(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let amount = match req.params.get("amount").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "amount must be a number", None),
    };

    // Optional explicit date; defaults to today. Payments are accepted for
    // any existing student/subject pair, enrolled or not.
    let payment_date = match req.params.get("paymentDate").and_then(|v| v.as_str()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d.format("%Y-%m-%d").to_string(),
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "paymentDate must be YYYY-MM-DD",
                    None,
                )
            }
        },
        None => String::new(),
    };

    let student: Option<i64> = match conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if student.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }
    let subject: Option<i64> = match conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&subject_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if subject.is_none() {
        return err(&req.id, "not_found", "subject not found", None);
    }

    let payment_id = Uuid::new_v4().to_string();
    let inserted = if payment_date.is_empty() {
        conn.execute(
            "INSERT INTO fee_payments(id, student_id, subject_id, amount, payment_date)
             VALUES(?, ?, ?, ?, strftime('%Y-%m-%d','now'))",
            (&payment_id, &student_id, &subject_id, amount),
        )
    } else {
        conn.execute(
            "INSERT INTO fee_payments(id, student_id, subject_id, amount, payment_date)
             VALUES(?, ?, ?, ?, ?)",
            (&payment_id, &student_id, &subject_id, amount, &payment_date),
        )
    };
    if let Err(e) = inserted {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "fee_payments" })),
        );
    }

    ok(&req.id, json!({ "paymentId": payment_id }))
}

fn handle_concessions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(conn, req) {
        return resp;
    }

    let reason = match req.params.get("reason").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing reason", None),
    };
    if reason.is_empty() {
        return err(&req.id, "bad_params", "reason must not be empty", None);
    }
    let discount_percent = match req.params.get("discountPercent").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => {
            return err(
                &req.id,
                "bad_params",
                "discountPercent must be a number",
                None,
            )
        }
    };

    let concession_type_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO concession_types(id, reason, discount_percent) VALUES(?, ?, ?)",
        (&concession_type_id, &reason, discount_percent),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "concession_types" })),
        );
    }

    ok(&req.id, json!({ "concessionTypeId": concession_type_id }))
}

fn handle_concessions_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let concession_type_id = match req.params.get("concessionTypeId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing concessionTypeId", None),
    };

    let student: Option<i64> = match conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if student.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }
    let concession: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM concession_types WHERE id = ?",
            [&concession_type_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if concession.is_none() {
        return err(&req.id, "not_found", "concession type not found", None);
    }

    let already: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM student_concessions WHERE student_id = ? AND concession_type_id = ?",
            [&student_id, &concession_type_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if already.is_some() {
        return err(
            &req.id,
            "duplicate",
            "this student already has this concession",
            None,
        );
    }

    if let Err(e) = conn.execute(
        "INSERT INTO student_concessions(student_id, concession_type_id, granted_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&student_id, &concession_type_id),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "student_concessions" })),
        );
    }

    ok(
        &req.id,
        json!({ "studentId": student_id, "concessionTypeId": concession_type_id }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.pay" => Some(handle_fees_pay(state, req)),
        "concessions.create" => Some(handle_concessions_create(state, req)),
        "concessions.assign" => Some(handle_concessions_assign(state, req)),
        _ => None,
    }
}
