//! Collaborators of the ingestion machine.
//!
//! The course module has no teloxide dependency; the Telegram layer and the
//! SQLite storage provide the implementations, tests provide doubles.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::error::AppResult;
use crate::course::draft::{FileDescriptor, LinkRef};
use crate::storage::courses::{Course, CourseFile};

/// Durable course catalogue used by publishing.
pub trait CourseStore: Send + Sync {
    fn create_course(&self, course: &Course) -> AppResult<()>;
    fn create_file(&self, file: &CourseFile) -> AppResult<()>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("message not found")]
    NotFound,
    #[error("message has no media")]
    NoMedia,
    /// Source asked to wait before the next request
    #[error("rate limited for {0:?}")]
    RateLimited(Duration),
    #[error("{0}")]
    Other(String),
}

/// Fetches a historical channel message and extracts its media.
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    /// `admin_id` is the chat the fetch happens on behalf of.
    async fn fetch(&self, admin_id: i64, link: &LinkRef) -> Result<FileDescriptor, FetchError>;
}

/// A freshly published course, as posted to the public channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub course_id: String,
    pub course_name: String,
    pub deep_link: String,
    pub banner_id: Option<String>,
    pub file_count: usize,
    pub total_size: i64,
}

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, announcement: &Announcement) -> AppResult<()>;
}
