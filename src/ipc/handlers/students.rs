use crate::auth;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_admin;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(conn, req) {
        return resp;
    }

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let category = req
        .params
        .get("category")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) });

    // No password supplied: issue a random one and return it once, so the
    // admin can hand it to the student out of band.
    let supplied = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) });
    let (password, generated) = match supplied {
        Some(p) => (p, None),
        None => {
            let g = Uuid::new_v4().simple().to_string();
            (g.clone(), Some(g))
        }
    };

    let student_id = Uuid::new_v4().to_string();
    let (salt, digest) = auth::hash_password(&password);
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, name, category, password_digest, password_salt, created_at)
         VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&student_id, &name, category.as_deref(), &digest, &salt),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    let mut result = json!({ "studentId": student_id });
    if let Some(generated) = generated {
        result["generatedPassword"] = json!(generated);
    }
    ok(&req.id, result)
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(conn, req) {
        return resp;
    }

    // Correlated subquery keeps the count accurate without join fan-out.
    let mut stmt = match conn.prepare(
        "SELECT
           s.id,
           s.name,
           s.category,
           (SELECT COUNT(*) FROM enrollments e WHERE e.student_id = s.id) AS enrollment_count
         FROM students s
         ORDER BY s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let category: Option<String> = row.get(2)?;
            let enrollment_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "category": category,
                "enrollmentCount": enrollment_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        _ => None,
    }
}
