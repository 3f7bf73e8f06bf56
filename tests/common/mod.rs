//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::sync::Arc;

use coursebot::course::publish::sqlite_store;
use coursebot::course::{Announcer, IngestionMachine, MessageFetcher};
use coursebot::storage::{create_pool, DbPool};
use tempfile::TempDir;

pub const ADMIN: i64 = 1001;
pub const BOT_USERNAME: &str = "coursebot";
pub const CAPTION_TEMPLATE: &str = "📚 {file_name}\n\nCourse: {course_name}";

/// Fresh migrated database in a temp directory. Keep the `TempDir` alive.
pub fn temp_pool() -> (TempDir, Arc<DbPool>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sqlite");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    (dir, Arc::new(pool))
}

/// Machine writing to a real SQLite catalogue.
pub fn sqlite_machine(
    pool: Arc<DbPool>,
    fetcher: Arc<dyn MessageFetcher>,
    announcer: Arc<dyn Announcer>,
) -> IngestionMachine {
    IngestionMachine::new(sqlite_store(pool), fetcher, announcer, BOT_USERNAME, CAPTION_TEMPLATE)
}
