//! Test doubles for the ingestion machine's collaborators
//!
//! Each double records what it was asked to do so tests can assert on the
//! calls without a Telegram connection.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use coursebot::core::error::{AppError, AppResult};
use coursebot::course::{Announcement, Announcer, CourseStore, FetchError, FileDescriptor, LinkRef, MediaKind, MessageFetcher};
use coursebot::storage::courses::{Course, CourseFile};

pub fn media(file_id: &str, name: &str, size: i64, order: i64) -> FileDescriptor {
    FileDescriptor {
        file_id: file_id.to_string(),
        file_name: name.to_string(),
        file_size: size,
        caption: None,
        source_order: order,
        media_kind: MediaKind::Document,
    }
}

pub fn photo(file_id: &str) -> FileDescriptor {
    FileDescriptor {
        media_kind: MediaKind::Photo,
        ..media(file_id, "banner.jpg", 100, 0)
    }
}

/// Answers fetches by message id; unknown ids are `NotFound`.
#[derive(Default)]
pub struct ScriptedFetcher {
    answers: Mutex<HashMap<i32, Result<FileDescriptor, FetchError>>>,
    calls: Mutex<Vec<LinkRef>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, message_id: i32, result: Result<FileDescriptor, FetchError>) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(message_id, result);
        self
    }

    pub fn calls(&self) -> Vec<LinkRef> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageFetcher for ScriptedFetcher {
    async fn fetch(&self, _admin_id: i64, link: &LinkRef) -> Result<FileDescriptor, FetchError> {
        self.calls.lock().unwrap().push(link.clone());
        self.answers
            .lock()
            .unwrap()
            .get(&link.message_id)
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

/// Records announcements; optionally fails every one.
#[derive(Default)]
pub struct RecordingAnnouncer {
    pub announcements: Mutex<Vec<Announcement>>,
    pub fail: bool,
}

impl RecordingAnnouncer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn recorded(&self) -> Vec<Announcement> {
        self.announcements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> AppResult<()> {
        self.announcements.lock().unwrap().push(announcement.clone());
        if self.fail {
            return Err(AppError::Validation("channel unavailable".to_string()));
        }
        Ok(())
    }
}

/// Course store whose course writes fail until `heal` is called.
#[derive(Default)]
pub struct FlakyStore {
    pub healed: Mutex<bool>,
    pub courses: Mutex<Vec<Course>>,
    pub files: Mutex<Vec<CourseFile>>,
}

impl FlakyStore {
    pub fn heal(&self) {
        *self.healed.lock().unwrap() = true;
    }
}

impl CourseStore for FlakyStore {
    fn create_course(&self, course: &Course) -> AppResult<()> {
        if !*self.healed.lock().unwrap() {
            return Err(AppError::Validation("disk full".to_string()));
        }
        self.courses.lock().unwrap().push(course.clone());
        Ok(())
    }

    fn create_file(&self, file: &CourseFile) -> AppResult<()> {
        self.files.lock().unwrap().push(file.clone());
        Ok(())
    }
}
