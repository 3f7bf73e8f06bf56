use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::AppResult;
use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Format SQLite's `datetime('now')` produces; all stored dates use it.
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers a `REGEXP` operator backed by the `regex` crate.
///
/// `X REGEXP Y` is rewritten by SQLite to `regexp(Y, X)`, so argument 0 is the
/// pattern. The compiled pattern is cached per statement through the aux slot.
pub fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let regexp: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = {
                let text = ctx
                    .get_raw(1)
                    .as_str()
                    .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                regexp.is_match(text)
            };
            Ok(is_match)
        },
    )
}

/// Create a new database connection pool
///
/// Every pooled connection gets the `REGEXP` function; the schema is migrated
/// through the first connection before the pool is handed out.
///
/// # Example
///
/// ```no_run
/// use coursebot::storage::db;
///
/// let pool = db::create_pool("courses.sqlite")?;
/// # Ok::<(), coursebot::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        register_regexp(conn)
    });
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// A bot user as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub first_name: String,
    pub join_date: String,
    pub is_banned: bool,
    pub ban_reason: String,
    pub is_premium: bool,
    pub premium_since: Option<String>,
    /// `None` with `is_premium` set means premium without an end date
    pub premium_expiry: Option<String>,
    pub is_verified: bool,
    pub verified_at: Option<String>,
}

impl User {
    /// Premium flag set and the expiry (if any) still ahead of `now`.
    pub fn has_active_premium(&self, now: DateTime<Utc>) -> bool {
        if !self.is_premium {
            return false;
        }
        match self.premium_expiry.as_deref() {
            None => true,
            Some(raw) => NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FORMAT)
                .map(|expiry| expiry > now.naive_utc())
                .unwrap_or(false),
        }
    }
}

const USER_COLUMNS: &str = "user_id, first_name, join_date, is_banned, ban_reason, is_premium, premium_since, premium_expiry, is_verified, verified_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        first_name: row.get(1)?,
        join_date: row.get(2)?,
        is_banned: row.get(3)?,
        ban_reason: row.get(4)?,
        is_premium: row.get(5)?,
        premium_since: row.get(6)?,
        premium_expiry: row.get(7)?,
        is_verified: row.get(8)?,
        verified_at: row.get(9)?,
    })
}

/// Inserts a user unless one with the same id already exists.
///
/// Returns `true` when a new row was created.
pub fn add_user(conn: &DbConnection, user_id: i64, first_name: &str) -> AppResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (user_id, first_name) VALUES (?1, ?2)",
        params![user_id, first_name],
    )?;
    Ok(inserted > 0)
}

pub fn get_user(conn: &DbConnection, user_id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS);
    let user = conn.query_row(&sql, params![user_id], user_from_row).optional()?;
    Ok(user)
}

pub fn is_user_exist(conn: &DbConnection, user_id: i64) -> AppResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn is_banned(conn: &DbConnection, user_id: i64) -> AppResult<bool> {
    let banned: Option<bool> = conn
        .query_row(
            "SELECT is_banned FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(banned.unwrap_or(false))
}

/// Ids of every user that has not been banned, in join order.
pub fn get_all_users(conn: &DbConnection) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT user_id FROM users WHERE is_banned = 0 ORDER BY join_date, user_id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub fn user_count(conn: &DbConnection) -> AppResult<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

/// Bans a user, creating the row if the user never talked to the bot.
pub fn ban_user(conn: &DbConnection, user_id: i64, reason: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO users (user_id, is_banned, ban_reason) VALUES (?1, 1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET is_banned = 1, ban_reason = excluded.ban_reason",
        params![user_id, reason],
    )?;
    Ok(())
}

/// Returns `false` when there was no such user.
pub fn unban_user(conn: &DbConnection, user_id: i64) -> AppResult<bool> {
    let updated = conn.execute(
        "UPDATE users SET is_banned = 0, ban_reason = '' WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(updated > 0)
}

/// Banned user ids with their ban reasons.
pub fn get_banned(conn: &DbConnection) -> AppResult<Vec<(i64, String)>> {
    let mut stmt = conn.prepare("SELECT user_id, ban_reason FROM users WHERE is_banned = 1 ORDER BY user_id")?;
    let banned = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(i64, String)>>>()?;
    Ok(banned)
}

/// Grants or revokes premium.
///
/// Granting stamps `premium_since` with the current time; revoking clears both
/// dates. The user row is created when missing.
pub fn set_premium_status(
    conn: &DbConnection,
    user_id: i64,
    status: bool,
    expiry: Option<DateTime<Utc>>,
) -> AppResult<()> {
    if status {
        let expiry = expiry.map(|e| e.format(SQLITE_DATETIME_FORMAT).to_string());
        conn.execute(
            "INSERT INTO users (user_id, is_premium, premium_since, premium_expiry)
             VALUES (?1, 1, datetime('now'), ?2)
             ON CONFLICT(user_id) DO UPDATE SET
                is_premium = 1,
                premium_since = datetime('now'),
                premium_expiry = excluded.premium_expiry",
            params![user_id, expiry],
        )?;
    } else {
        conn.execute(
            "UPDATE users SET is_premium = 0, premium_since = NULL, premium_expiry = NULL WHERE user_id = ?1",
            params![user_id],
        )?;
    }
    Ok(())
}

/// Demotes every premium user whose expiry has passed.
///
/// Returns the number of demoted users.
pub fn expire_premium_users(conn: &DbConnection) -> AppResult<usize> {
    let count = conn.execute(
        "UPDATE users SET is_premium = 0, premium_since = NULL, premium_expiry = NULL
         WHERE is_premium = 1
         AND premium_expiry IS NOT NULL
         AND premium_expiry < datetime('now')",
        [],
    )?;

    if count > 0 {
        log::info!("Expired premium for {} user(s)", count);
    }

    Ok(count)
}

pub fn update_user_verification(conn: &DbConnection, user_id: i64, verified: bool) -> AppResult<()> {
    conn.execute(
        "INSERT INTO users (user_id, is_verified, verified_at)
         VALUES (?1, ?2, CASE WHEN ?2 THEN datetime('now') END)
         ON CONFLICT(user_id) DO UPDATE SET
            is_verified = excluded.is_verified,
            verified_at = excluded.verified_at",
        params![user_id, verified],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_add_user_is_idempotent() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert!(add_user(&conn, 42, "Ann").unwrap());
        assert!(!add_user(&conn, 42, "Ann again").unwrap());
        assert!(is_user_exist(&conn, 42).unwrap());
        assert_eq!(user_count(&conn).unwrap(), 1);
        assert_eq!(get_user(&conn, 42).unwrap().unwrap().first_name, "Ann");
    }

    #[test]
    fn test_ban_excludes_from_all_users() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        add_user(&conn, 1, "a").unwrap();
        add_user(&conn, 2, "b").unwrap();

        ban_user(&conn, 2, "User blocked the bot").unwrap();
        assert_eq!(get_all_users(&conn).unwrap(), vec![1]);
        assert!(is_banned(&conn, 2).unwrap());
        assert_eq!(get_banned(&conn).unwrap(), vec![(2, "User blocked the bot".to_string())]);

        assert!(unban_user(&conn, 2).unwrap());
        assert!(!is_banned(&conn, 2).unwrap());
        assert!(!unban_user(&conn, 99).unwrap());
    }

    #[test]
    fn test_premium_expiry() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        add_user(&conn, 7, "p").unwrap();
        add_user(&conn, 8, "q").unwrap();

        set_premium_status(&conn, 7, true, Some(Utc::now() - Duration::days(1))).unwrap();
        set_premium_status(&conn, 8, true, Some(Utc::now() + Duration::days(10))).unwrap();

        let stale = get_user(&conn, 7).unwrap().unwrap();
        assert!(stale.is_premium);
        assert!(!stale.has_active_premium(Utc::now()));
        assert!(get_user(&conn, 8).unwrap().unwrap().has_active_premium(Utc::now()));

        assert_eq!(expire_premium_users(&conn).unwrap(), 1);
        assert!(!get_user(&conn, 7).unwrap().unwrap().is_premium);
        assert!(get_user(&conn, 8).unwrap().unwrap().is_premium);
    }

    #[test]
    fn test_premium_without_expiry_never_lapses() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        set_premium_status(&conn, 5, true, None).unwrap();

        assert_eq!(expire_premium_users(&conn).unwrap(), 0);
        assert!(get_user(&conn, 5).unwrap().unwrap().has_active_premium(Utc::now()));

        set_premium_status(&conn, 5, false, None).unwrap();
        assert!(!get_user(&conn, 5).unwrap().unwrap().has_active_premium(Utc::now()));
    }

    #[test]
    fn test_verification_flag() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        add_user(&conn, 3, "v").unwrap();

        update_user_verification(&conn, 3, true).unwrap();
        let user = get_user(&conn, 3).unwrap().unwrap();
        assert!(user.is_verified);
        assert!(user.verified_at.is_some());

        update_user_verification(&conn, 3, false).unwrap();
        let user = get_user(&conn, 3).unwrap().unwrap();
        assert!(!user.is_verified);
        assert!(user.verified_at.is_none());
    }

    #[test]
    fn test_regexp_function() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        let matched: bool = conn
            .query_row("SELECT 'Sicilian Defense' REGEXP '(?i)\\bdefense'", [], |row| row.get(0))
            .unwrap();
        assert!(matched);
    }
}
