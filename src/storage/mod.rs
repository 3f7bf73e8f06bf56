//! SQLite persistence: users, course catalogue, access tokens

pub mod courses;
pub mod db;
pub mod migrations;
pub mod tokens;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
