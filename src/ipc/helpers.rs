use crate::auth::{self, Role, Session};
use crate::ipc::error::err;
use crate::ipc::types::Request;
use rusqlite::Connection;

/// Resolve `params.sessionToken` to a session or produce the error response
/// the handler should return as-is.
pub fn require_session(conn: &Connection, req: &Request) -> Result<Session, serde_json::Value> {
    let Some(token) = req.params.get("sessionToken").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "auth_required", "missing sessionToken", None));
    };
    match auth::lookup_session(conn, token) {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(err(&req.id, "invalid_session", "unknown session token", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

pub fn require_admin(conn: &Connection, req: &Request) -> Result<Session, serde_json::Value> {
    let session = require_session(conn, req)?;
    if session.role != Role::Admin {
        return Err(err(&req.id, "forbidden", "admins only", None));
    }
    Ok(session)
}
