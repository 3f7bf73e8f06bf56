//! Access tokens admins hand out to unlock downloads.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::core::error::AppResult;
use crate::storage::db::{DbConnection, SQLITE_DATETIME_FORMAT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub created_by: i64,
    pub created_at: String,
    pub expires_at: String,
    pub usage_limit: i64,
    pub usage_count: i64,
    pub is_active: bool,
}

/// Outcome of redeeming a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TokenVerdict {
    #[strum(to_string = "Token verified successfully")]
    Valid,
    #[strum(to_string = "Invalid token")]
    Invalid,
    #[strum(to_string = "This token has been deactivated")]
    Deactivated,
    #[strum(to_string = "This token has expired")]
    Expired,
    #[strum(to_string = "This token has reached its usage limit")]
    LimitReached,
}

impl AccessToken {
    /// Checks everything except existence, in the order users see the errors.
    pub fn verdict(&self, now: DateTime<Utc>) -> TokenVerdict {
        if !self.is_active {
            return TokenVerdict::Deactivated;
        }
        let expired = NaiveDateTime::parse_from_str(&self.expires_at, SQLITE_DATETIME_FORMAT)
            .map(|expiry| expiry <= now.naive_utc())
            .unwrap_or(true);
        if expired {
            return TokenVerdict::Expired;
        }
        if self.usage_count >= self.usage_limit {
            return TokenVerdict::LimitReached;
        }
        TokenVerdict::Valid
    }
}

fn token_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessToken> {
    Ok(AccessToken {
        token: row.get(0)?,
        created_by: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        usage_limit: row.get(4)?,
        usage_count: row.get(5)?,
        is_active: row.get(6)?,
    })
}

const TOKEN_COLUMNS: &str = "token, created_by, created_at, expires_at, usage_limit, usage_count, is_active";

/// Creates a token valid for `days_valid` days and `usage_limit` redemptions.
pub fn create_token(conn: &DbConnection, admin_id: i64, days_valid: i64, usage_limit: i64) -> AppResult<AccessToken> {
    let token = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let created_at = now.format(SQLITE_DATETIME_FORMAT).to_string();
    let expires_at = (now + Duration::days(days_valid))
        .format(SQLITE_DATETIME_FORMAT)
        .to_string();

    conn.execute(
        "INSERT INTO tokens (token, created_by, created_at, expires_at, usage_limit) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![token, admin_id, created_at, expires_at, usage_limit],
    )?;

    Ok(AccessToken {
        token,
        created_by: admin_id,
        created_at,
        expires_at,
        usage_limit,
        usage_count: 0,
        is_active: true,
    })
}

pub fn get_token(conn: &DbConnection, token: &str) -> AppResult<Option<AccessToken>> {
    let sql = format!("SELECT {} FROM tokens WHERE token = ?1", TOKEN_COLUMNS);
    Ok(conn.query_row(&sql, params![token], token_from_row).optional()?)
}

/// Redeems a token, counting one use when it is valid.
pub fn verify_token(conn: &DbConnection, token: &str) -> AppResult<TokenVerdict> {
    let Some(record) = get_token(conn, token.trim())? else {
        return Ok(TokenVerdict::Invalid);
    };

    let verdict = record.verdict(Utc::now());
    if verdict == TokenVerdict::Valid {
        conn.execute(
            "UPDATE tokens SET usage_count = usage_count + 1 WHERE token = ?1",
            params![record.token],
        )?;
    }
    Ok(verdict)
}

/// Tokens created by one admin, newest first.
pub fn list_tokens_by(conn: &DbConnection, admin_id: i64) -> AppResult<Vec<AccessToken>> {
    let sql = format!(
        "SELECT {} FROM tokens WHERE created_by = ?1 ORDER BY created_at DESC, rowid DESC",
        TOKEN_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tokens = stmt
        .query_map(params![admin_id], token_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tokens)
}

/// Returns `false` when the token does not exist.
pub fn deactivate_token(conn: &DbConnection, token: &str) -> AppResult<bool> {
    let updated = conn.execute("UPDATE tokens SET is_active = 0 WHERE token = ?1", params![token.trim()])?;
    Ok(updated > 0)
}
