use crate::auth::Role;
use crate::finance::{
    compute_fee_position, ConcessionRecord, EnrollmentFeeRecord, PaymentRecord,
};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_admin, require_session};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

enum ViewError {
    NotFound,
    Db(String),
}

impl From<rusqlite::Error> for ViewError {
    fn from(e: rusqlite::Error) -> Self {
        ViewError::Db(e.to_string())
    }
}

struct Profile {
    name: String,
    category: Option<String>,
}

/// The one fetch-and-compute path behind both the admin view and the student
/// dashboard. Resolves the student first: an unknown id is NotFound and the
/// calculator is never consulted, so "no records" and "no student" stay
/// distinct outcomes.
fn student_view(conn: &Connection, student_id: &str) -> Result<serde_json::Value, ViewError> {
    let profile: Option<Profile> = conn
        .query_row(
            "SELECT name, category FROM students WHERE id = ?",
            [student_id],
            |r| {
                Ok(Profile {
                    name: r.get(0)?,
                    category: r.get(1)?,
                })
            },
        )
        .optional()?;
    let Some(profile) = profile else {
        return Err(ViewError::NotFound);
    };

    let mut enrollments_stmt = conn.prepare(
        "SELECT sub.name, sub.standard_fee, ar.marks, ar.grade
         FROM enrollments e
         JOIN subjects sub ON sub.id = e.subject_id
         LEFT JOIN academic_records ar
           ON ar.student_id = e.student_id AND ar.subject_id = e.subject_id
         WHERE e.student_id = ?
         ORDER BY e.rowid",
    )?;
    let enrollments: Vec<EnrollmentFeeRecord> = enrollments_stmt
        .query_map([student_id], |r| {
            Ok(EnrollmentFeeRecord {
                subject_name: r.get(0)?,
                standard_fee: r.get(1)?,
                marks: r.get(2)?,
                grade: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut concessions_stmt = conn.prepare(
        "SELECT ct.reason, ct.discount_percent
         FROM student_concessions sc
         JOIN concession_types ct ON ct.id = sc.concession_type_id
         WHERE sc.student_id = ?
         ORDER BY sc.rowid",
    )?;
    let concessions: Vec<ConcessionRecord> = concessions_stmt
        .query_map([student_id], |r| {
            Ok(ConcessionRecord {
                reason: r.get(0)?,
                discount_percent: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut payments_stmt = conn.prepare(
        "SELECT sub.name, fp.amount, fp.payment_date
         FROM fee_payments fp
         JOIN subjects sub ON sub.id = fp.subject_id
         WHERE fp.student_id = ?
         ORDER BY fp.rowid",
    )?;
    let payments: Vec<PaymentRecord> = payments_stmt
        .query_map([student_id], |r| {
            Ok(PaymentRecord {
                subject_name: r.get(0)?,
                amount: r.get(1)?,
                payment_date: r.get(2)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let position = compute_fee_position(&enrollments, &concessions, &payments);

    Ok(json!({
        "profile": {
            "id": student_id,
            "name": profile.name,
            "category": profile.category,
            "activeConcessions": position.active_concessions
        },
        "academics": enrollments,
        "payments": payments,
        "financialSummary": position.summary
    }))
}

fn respond_with_view(conn: &Connection, req: &Request, student_id: &str) -> serde_json::Value {
    match student_view(conn, student_id) {
        Ok(view) => ok(&req.id, view),
        Err(ViewError::NotFound) => err(&req.id, "not_found", "student not found", None),
        Err(ViewError::Db(msg)) => err(&req.id, "db_query_failed", msg, None),
    }
}

fn handle_students_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    respond_with_view(conn, req, &student_id)
}

fn handle_dashboard_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(conn, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    // Students may only open their own dashboard; admins may open any.
    if session.role == Role::Student && session.subject_ref != student_id {
        return err(
            &req.id,
            "forbidden",
            "students may only view their own dashboard",
            None,
        );
    }

    respond_with_view(conn, req, &student_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.summary" => Some(handle_students_summary(state, req)),
        "dashboard.open" => Some(handle_dashboard_open(state, req)),
        _ => None,
    }
}
