use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }

    fn from_str(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

/// A resolved session: who is calling and as what.
/// `subject_ref` is the admin or student row id the token was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    pub subject_ref: String,
}

/// Salted SHA-256 digest, hex-encoded. The salt is stored beside the digest;
/// a fresh uuid salt is drawn for every credential.
pub fn hash_password(password: &str) -> (String, String) {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    (salt, digest)
}

pub fn verify_password(salt: &str, digest: &str, candidate: &str) -> bool {
    salted_digest(salt, candidate) == digest
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn issue_session(conn: &Connection, role: Role, subject_ref: &str) -> rusqlite::Result<String> {
    let token = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessions(token, role, subject_ref, issued_at)
         VALUES(?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&token, role.as_str(), subject_ref),
    )?;
    Ok(token)
}

pub fn lookup_session(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT role, subject_ref FROM sessions WHERE token = ?",
            [token],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(role, subject_ref)| {
        Role::from_str(&role).map(|role| Session { role, subject_ref })
    }))
}
