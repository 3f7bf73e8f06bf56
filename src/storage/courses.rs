//! Course catalogue: published courses and their files.

use std::str::FromStr;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::core::error::{AppError, AppResult};
use crate::course::MediaKind;
use crate::storage::db::{DbConnection, DbPool};

/// Pool handle the ingestion machine writes courses through.
#[derive(Clone)]
pub struct DbBackedStore {
    pool: Arc<DbPool>,
}

impl DbBackedStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// A published course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub added_by: i64,
    pub added_on: String,
    pub file_count: i64,
    pub banner_id: Option<String>,
    pub total_size: i64,
}

/// One file of a published course. `file_order` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFile {
    pub course_id: String,
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub caption: Option<String>,
    pub file_order: i64,
    pub media_kind: MediaKind,
}

/// A page of courses plus paging information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePage {
    pub courses: Vec<Course>,
    /// Offset of the next page, `None` on the last page
    pub next_offset: Option<usize>,
    pub total: usize,
}

const COURSE_COLUMNS: &str = "course_id, course_name, added_by, added_on, file_count, banner_id, total_size";

fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        course_id: row.get(0)?,
        course_name: row.get(1)?,
        added_by: row.get(2)?,
        added_on: row.get(3)?,
        file_count: row.get(4)?,
        banner_id: row.get(5)?,
        total_size: row.get(6)?,
    })
}

/// Builds the case-insensitive name pattern for a search query.
///
/// An empty query yields `None` (match everything). A single word must sit on
/// a word boundary or next to one of `. + - _`. Several words must appear in
/// order, each later word preceded by whitespace or one of those separators.
pub fn search_pattern(query: &str) -> Option<String> {
    let words: Vec<String> = query.split_whitespace().map(regex::escape).collect();
    match words.as_slice() {
        [] => None,
        [word] => Some(format!(r"(?i)(\b|[.+\-_]){}(\b|[.+\-_])", word)),
        _ => Some(format!("(?i){}", words.join(r".*[\s.+\-_]"))),
    }
}

pub fn create_course(conn: &DbConnection, course: &Course) -> AppResult<()> {
    conn.execute(
        "INSERT INTO courses (course_id, course_name, added_by, added_on, file_count, banner_id, total_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            course.course_id,
            course.course_name,
            course.added_by,
            course.added_on,
            course.file_count,
            course.banner_id,
            course.total_size,
        ],
    )?;
    Ok(())
}

pub fn create_file(conn: &DbConnection, file: &CourseFile) -> AppResult<()> {
    conn.execute(
        "INSERT INTO course_files (course_id, file_id, file_name, file_size, caption, file_order, media_kind)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file.course_id,
            file.file_id,
            file.file_name,
            file.file_size,
            file.caption,
            file.file_order,
            file.media_kind.as_ref(),
        ],
    )?;
    Ok(())
}

pub fn get_course_by_id(conn: &DbConnection, course_id: &str) -> AppResult<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE course_id = ?1", COURSE_COLUMNS);
    let course = conn.query_row(&sql, params![course_id], course_from_row).optional()?;
    Ok(course)
}

/// Files of a course in delivery order.
pub fn get_files_for_course(conn: &DbConnection, course_id: &str) -> AppResult<Vec<CourseFile>> {
    let mut stmt = conn.prepare(
        "SELECT course_id, file_id, file_name, file_size, caption, file_order, media_kind
         FROM course_files WHERE course_id = ?1 ORDER BY file_order, id",
    )?;
    let files = stmt
        .query_map(params![course_id], |row| {
            let kind: String = row.get(6)?;
            Ok(CourseFile {
                course_id: row.get(0)?,
                file_id: row.get(1)?,
                file_name: row.get(2)?,
                file_size: row.get(3)?,
                caption: row.get(4)?,
                file_order: row.get(5)?,
                media_kind: MediaKind::from_str(&kind).unwrap_or(MediaKind::Document),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(files)
}

/// Searches course names, newest first.
pub fn search_courses(conn: &DbConnection, query: &str, limit: usize, offset: usize) -> AppResult<CoursePage> {
    let pattern = search_pattern(query);
    // SQLite binds i64; larger offsets simply land past the end.
    let limit = limit.min(i64::MAX as usize);
    let offset = offset.min(i64::MAX as usize);

    let (courses, total) = match pattern {
        Some(pattern) => {
            let sql = format!(
                "SELECT {} FROM courses WHERE course_name REGEXP ?1
                 ORDER BY added_on DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                COURSE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let courses = stmt
                .query_map(params![pattern, limit as i64, offset as i64], course_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM courses WHERE course_name REGEXP ?1",
                params![pattern],
                |row| row.get(0),
            )?;
            (courses, total)
        }
        None => {
            let sql = format!(
                "SELECT {} FROM courses ORDER BY added_on DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                COURSE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let courses = stmt
                .query_map(params![limit as i64, offset as i64], course_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (courses, course_count(conn)?)
        }
    };

    let total = total.max(0) as usize;
    let next = offset.saturating_add(limit);
    let next_offset = (next < total).then_some(next);

    Ok(CoursePage {
        courses,
        next_offset,
        total,
    })
}

/// Every course, newest first.
pub fn get_all_courses(conn: &DbConnection, limit: usize, offset: usize) -> AppResult<CoursePage> {
    search_courses(conn, "", limit, offset)
}

/// Removes a course together with its files. Returns `false` for an unknown id.
/// Removes a course and its files. Unknown ids are [`AppError::NotFound`].
pub fn delete_course(conn: &DbConnection, course_id: &str) -> AppResult<()> {
    let deleted = conn.execute("DELETE FROM courses WHERE course_id = ?1", params![course_id])?;
    conn.execute("DELETE FROM course_files WHERE course_id = ?1", params![course_id])?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("course {}", course_id)));
    }
    Ok(())
}

pub fn update_course_name(conn: &DbConnection, course_id: &str, course_name: &str) -> AppResult<bool> {
    let updated = conn.execute(
        "UPDATE courses SET course_name = ?1 WHERE course_id = ?2",
        params![course_name, course_id],
    )?;
    Ok(updated > 0)
}

pub fn course_count(conn: &DbConnection) -> AppResult<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
    Ok(count)
}

/// Total size in bytes of every stored course file.
pub fn used_storage(conn: &DbConnection) -> AppResult<i64> {
    let total = conn.query_row("SELECT COALESCE(SUM(file_size), 0) FROM course_files", [], |row| row.get(0))?;
    Ok(total)
}
