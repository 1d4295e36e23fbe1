use crate::auth::{self, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_bootstrap_admin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let username = match req.params.get("username").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing username", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };
    if username.is_empty() || password.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "username/password must not be empty",
            None,
        );
    }

    let existing: i64 = match conn.query_row("SELECT COUNT(*) FROM admins", [], |r| r.get(0)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing > 0 {
        return err(
            &req.id,
            "already_bootstrapped",
            "an admin account already exists",
            None,
        );
    }

    let admin_id = Uuid::new_v4().to_string();
    let (salt, digest) = auth::hash_password(&password);
    if let Err(e) = conn.execute(
        "INSERT INTO admins(id, username, password_digest, password_salt)
         VALUES(?, ?, ?, ?)",
        (&admin_id, &username, &digest, &salt),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "admins" })),
        );
    }

    ok(&req.id, json!({ "adminId": admin_id }))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let role = match req.params.get("role").and_then(|v| v.as_str()) {
        Some("admin") => Role::Admin,
        Some("student") => Role::Student,
        Some(_) => return err(&req.id, "bad_params", "role must be admin or student", None),
        None => return err(&req.id, "bad_params", "missing role", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    // Resolve the stored credential for either role; a missing account and a
    // wrong password answer with the same code.
    let row: Option<(String, String, String)> = match role {
        Role::Admin => {
            let username = match req.params.get("username").and_then(|v| v.as_str()) {
                Some(v) => v.trim().to_string(),
                None => return err(&req.id, "bad_params", "missing username", None),
            };
            match conn
                .query_row(
                    "SELECT id, password_salt, password_digest FROM admins WHERE username = ?",
                    [&username],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()
            {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
        Role::Student => {
            let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
                Some(v) => v.to_string(),
                None => return err(&req.id, "bad_params", "missing studentId", None),
            };
            match conn
                .query_row(
                    "SELECT id, password_salt, password_digest FROM students WHERE id = ?",
                    [&student_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()
            {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
    };

    let Some((subject_ref, salt, digest)) = row else {
        return err(&req.id, "invalid_credentials", "unknown account or wrong password", None);
    };
    if !auth::verify_password(&salt, &digest, &password) {
        return err(&req.id, "invalid_credentials", "unknown account or wrong password", None);
    }

    let token = match auth::issue_session(conn, role, &subject_ref) {
        Ok(t) => t,
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "sessions" })),
            )
        }
    };

    let mut result = json!({ "token": token, "role": role.as_str() });
    if role == Role::Student {
        result["studentId"] = json!(subject_ref);
    }
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.bootstrapAdmin" => Some(handle_bootstrap_admin(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
