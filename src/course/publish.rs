//! Turning a finished draft into a published course.

use std::sync::Arc;

use chrono::Utc;

use crate::core::error::{AppError, AppResult};
use crate::core::utils::render_caption;
use crate::course::draft::CourseDraft;
use crate::course::traits::{Announcement, Announcer, CourseStore};
use crate::storage::courses::{self, Course, CourseFile, DbBackedStore};
use crate::storage::db::{get_connection, DbPool, SQLITE_DATETIME_FORMAT};

/// Start parameter prefix of a course deep link.
pub const DEEP_LINK_PREFIX: &str = "course_";

pub fn deep_link(bot_username: &str, course_id: &str) -> String {
    format!("https://t.me/{}?start={}{}", bot_username, DEEP_LINK_PREFIX, course_id)
}

/// Result of a publish the admin gets told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub course_id: String,
    pub course_name: String,
    pub deep_link: String,
    pub file_count: usize,
    pub total_size: i64,
    /// Set when the course was stored but the announcement failed
    pub announce_error: Option<String>,
}

/// Writes the course, then its files, then announces it.
///
/// A failed course write returns the error and writes nothing else. File
/// write failures are logged and skipped. A failed announcement is recorded in
/// the report and never undoes the publish.
pub async fn publish(
    store: &dyn CourseStore,
    announcer: &dyn Announcer,
    draft: &CourseDraft,
    admin_id: i64,
    bot_username: &str,
    caption_template: &str,
) -> AppResult<PublishReport> {
    let course_name = draft
        .course_name
        .clone()
        .ok_or_else(|| AppError::Validation("course has no name".to_string()))?;
    if draft.files.is_empty() {
        return Err(AppError::Validation("course has no files".to_string()));
    }

    let course = Course {
        course_id: uuid::Uuid::new_v4().to_string(),
        course_name: course_name.clone(),
        added_by: admin_id,
        added_on: Utc::now().format(SQLITE_DATETIME_FORMAT).to_string(),
        file_count: draft.files.len() as i64,
        banner_id: draft.banner.clone(),
        total_size: draft.total_size(),
    };

    store.create_course(&course)?;

    for (index, file) in draft.files.iter().enumerate() {
        let caption = file
            .caption
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| render_caption(caption_template, &file.file_name, &course_name));

        let record = CourseFile {
            course_id: course.course_id.clone(),
            file_id: file.file_id.clone(),
            file_name: file.file_name.clone(),
            file_size: file.file_size,
            caption: Some(caption),
            file_order: index as i64 + 1,
            media_kind: file.media_kind,
        };
        if let Err(e) = store.create_file(&record) {
            log::warn!(
                "Failed to store file {} of course {}: {}",
                record.file_order,
                course.course_id,
                e
            );
        }
    }

    log::info!(
        "Admin {} published course '{}' ({}) with {} files",
        admin_id,
        course.course_name,
        course.course_id,
        course.file_count
    );

    let link = deep_link(bot_username, &course.course_id);
    let announcement = Announcement {
        course_id: course.course_id.clone(),
        course_name: course_name.clone(),
        deep_link: link.clone(),
        banner_id: course.banner_id.clone(),
        file_count: draft.files.len(),
        total_size: course.total_size,
    };

    let announce_error = match announcer.announce(&announcement).await {
        Ok(()) => None,
        Err(e) => {
            log::error!("Failed to announce course {}: {}", course.course_id, e);
            Some(e.to_string())
        }
    };

    Ok(PublishReport {
        course_id: course.course_id,
        course_name,
        deep_link: link,
        file_count: draft.files.len(),
        total_size: course.total_size,
        announce_error,
    })
}

impl CourseStore for DbBackedStore {
    fn create_course(&self, course: &Course) -> AppResult<()> {
        let conn = get_connection(self.pool())?;
        courses::create_course(&conn, course)
    }

    fn create_file(&self, file: &CourseFile) -> AppResult<()> {
        let conn = get_connection(self.pool())?;
        courses::create_file(&conn, file)
    }
}

/// Convenience constructor for the SQLite-backed store.
pub fn sqlite_store(pool: Arc<DbPool>) -> Arc<dyn CourseStore> {
    Arc::new(DbBackedStore::new(pool))
}
