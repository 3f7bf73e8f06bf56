//! Catalogue, user and token storage against a migrated SQLite file
//!
//! Run with: cargo test --test storage_test

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use common::temp_pool;
use coursebot::core::error::AppError;
use coursebot::course::MediaKind;
use coursebot::storage::courses::{self, Course, CourseFile};
use coursebot::storage::tokens::{self, TokenVerdict};
use coursebot::storage::{db, get_connection, DbConnection};

fn insert_course(conn: &DbConnection, id: &str, name: &str, added_on: &str, sizes: &[i64]) {
    courses::create_course(
        conn,
        &Course {
            course_id: id.to_string(),
            course_name: name.to_string(),
            added_by: 1,
            added_on: added_on.to_string(),
            file_count: sizes.len() as i64,
            banner_id: None,
            total_size: sizes.iter().sum(),
        },
    )
    .unwrap();

    for (index, size) in sizes.iter().enumerate() {
        courses::create_file(
            conn,
            &CourseFile {
                course_id: id.to_string(),
                file_id: format!("{}-{}", id, index),
                file_name: format!("part{}.mp4", index + 1),
                file_size: *size,
                caption: None,
                file_order: index as i64 + 1,
                media_kind: MediaKind::Video,
            },
        )
        .unwrap();
    }
}

fn names(page: &courses::CoursePage) -> Vec<&str> {
    page.courses.iter().map(|c| c.course_name.as_str()).collect()
}

#[test]
fn search_matches_words_not_substrings() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    insert_course(&conn, "a", "Rust Basics", "2024-01-01 10:00:00", &[1]);
    insert_course(&conn, "b", "Advanced Rust-Async", "2024-01-02 10:00:00", &[1]);
    insert_course(&conn, "c", "Trustworthy AI", "2024-01-03 10:00:00", &[1]);
    insert_course(&conn, "d", "Python for Data", "2024-01-04 10:00:00", &[1]);

    let page = courses::search_courses(&conn, "RUST", 10, 0).unwrap();
    assert_eq!(names(&page), vec!["Advanced Rust-Async", "Rust Basics"]);
    assert_eq!(page.total, 2);
    assert_eq!(page.next_offset, None);

    let page = courses::search_courses(&conn, "rust async", 10, 0).unwrap();
    assert_eq!(names(&page), vec!["Advanced Rust-Async"]);

    let page = courses::search_courses(&conn, "cobol", 10, 0).unwrap();
    assert!(page.courses.is_empty());
    assert_eq!(page.total, 0);
}

#[test]
fn listing_pages_newest_first() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    for day in 1..=5 {
        insert_course(
            &conn,
            &format!("id{}", day),
            &format!("Course {}", day),
            &format!("2024-02-0{} 08:00:00", day),
            &[10],
        );
    }

    let first = courses::get_all_courses(&conn, 2, 0).unwrap();
    assert_eq!(names(&first), vec!["Course 5", "Course 4"]);
    assert_eq!(first.next_offset, Some(2));
    assert_eq!(first.total, 5);

    let last = courses::get_all_courses(&conn, 2, 4).unwrap();
    assert_eq!(names(&last), vec!["Course 1"]);
    assert_eq!(last.next_offset, None);

    let beyond = courses::search_courses(&conn, "course", 20, usize::MAX).unwrap();
    assert!(beyond.courses.is_empty());
    assert_eq!(beyond.next_offset, None);
    assert_eq!(beyond.total, 5);
}

#[test]
fn delete_removes_course_and_files() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    insert_course(&conn, "keep", "Keep", "2024-03-01 00:00:00", &[100, 200]);
    insert_course(&conn, "drop", "Drop", "2024-03-02 00:00:00", &[1000, 2000, 3000]);
    assert_eq!(courses::used_storage(&conn).unwrap(), 6300);

    courses::delete_course(&conn, "drop").unwrap();
    assert!(matches!(
        courses::delete_course(&conn, "drop"),
        Err(AppError::NotFound(_))
    ));

    assert_eq!(courses::get_course_by_id(&conn, "drop").unwrap(), None);
    assert!(courses::get_files_for_course(&conn, "drop").unwrap().is_empty());
    assert_eq!(courses::get_files_for_course(&conn, "keep").unwrap().len(), 2);
    assert_eq!(courses::used_storage(&conn).unwrap(), 300);
    assert_eq!(courses::course_count(&conn).unwrap(), 1);
}

#[test]
fn rename_course() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    insert_course(&conn, "x", "Old Name", "2024-03-01 00:00:00", &[1]);

    assert!(courses::update_course_name(&conn, "x", "New Name").unwrap());
    assert!(!courses::update_course_name(&conn, "missing", "Whatever").unwrap());
    assert_eq!(
        courses::get_course_by_id(&conn, "x").unwrap().unwrap().course_name,
        "New Name"
    );
}

#[test]
fn token_lifecycle() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();

    let token = tokens::create_token(&conn, 42, 7, 2).unwrap();
    assert_eq!(tokens::verify_token(&conn, "no-such-token").unwrap(), TokenVerdict::Invalid);

    assert_eq!(tokens::verify_token(&conn, &token.token).unwrap(), TokenVerdict::Valid);
    assert_eq!(
        tokens::verify_token(&conn, &format!("  {}  ", token.token)).unwrap(),
        TokenVerdict::Valid
    );
    assert_eq!(tokens::verify_token(&conn, &token.token).unwrap(), TokenVerdict::LimitReached);
    assert_eq!(tokens::get_token(&conn, &token.token).unwrap().unwrap().usage_count, 2);

    let second = tokens::create_token(&conn, 42, 7, 10).unwrap();
    tokens::create_token(&conn, 7, 7, 10).unwrap();
    let mine = tokens::list_tokens_by(&conn, 42).unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].token, second.token);

    assert!(tokens::deactivate_token(&conn, &second.token).unwrap());
    assert!(!tokens::deactivate_token(&conn, "no-such-token").unwrap());
    assert_eq!(tokens::verify_token(&conn, &second.token).unwrap(), TokenVerdict::Deactivated);
}

#[test]
fn expired_token_is_rejected() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();

    let token = tokens::create_token(&conn, 1, 0, 5).unwrap();
    assert_eq!(tokens::verify_token(&conn, &token.token).unwrap(), TokenVerdict::Expired);
    assert_eq!(tokens::get_token(&conn, &token.token).unwrap().unwrap().usage_count, 0);
}

#[test]
fn users_ban_and_unban() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();

    assert!(db::add_user(&conn, 1, "Ann").unwrap());
    assert!(!db::add_user(&conn, 1, "Ann again").unwrap());
    assert!(db::add_user(&conn, 2, "Bob").unwrap());
    assert_eq!(db::get_user(&conn, 1).unwrap().unwrap().first_name, "Ann");

    db::ban_user(&conn, 2, "spam").unwrap();
    // Banning someone who never talked to the bot creates the row
    db::ban_user(&conn, 3, "known abuser").unwrap();

    assert!(db::is_banned(&conn, 2).unwrap());
    assert!(!db::is_banned(&conn, 99).unwrap());
    assert_eq!(db::get_all_users(&conn).unwrap(), vec![1]);
    assert_eq!(
        db::get_banned(&conn).unwrap(),
        vec![(2, "spam".to_string()), (3, "known abuser".to_string())]
    );
    assert_eq!(db::user_count(&conn).unwrap(), 3);

    assert!(db::unban_user(&conn, 2).unwrap());
    assert!(!db::unban_user(&conn, 404).unwrap());
    assert_eq!(db::get_all_users(&conn).unwrap(), vec![1, 2]);
}

#[test]
fn premium_expiry_demotes_only_lapsed_users() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    let now = Utc::now();

    db::set_premium_status(&conn, 1, true, Some(now - Duration::days(1))).unwrap();
    db::set_premium_status(&conn, 2, true, Some(now + Duration::days(30))).unwrap();
    db::set_premium_status(&conn, 3, true, None).unwrap();

    assert!(!db::get_user(&conn, 1).unwrap().unwrap().has_active_premium(now));
    assert!(db::get_user(&conn, 3).unwrap().unwrap().has_active_premium(now));

    assert_eq!(db::expire_premium_users(&conn).unwrap(), 1);
    assert_eq!(db::expire_premium_users(&conn).unwrap(), 0);

    let lapsed = db::get_user(&conn, 1).unwrap().unwrap();
    assert!(!lapsed.is_premium);
    assert_eq!(lapsed.premium_expiry, None);
    assert!(db::get_user(&conn, 2).unwrap().unwrap().is_premium);
    assert!(db::get_user(&conn, 3).unwrap().unwrap().is_premium);

    db::set_premium_status(&conn, 2, false, None).unwrap();
    assert!(!db::get_user(&conn, 2).unwrap().unwrap().is_premium);
}

#[test]
fn verification_is_recorded() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::add_user(&conn, 5, "Eve").unwrap();

    db::update_user_verification(&conn, 5, true).unwrap();
    let user = db::get_user(&conn, 5).unwrap().unwrap();
    assert!(user.is_verified);
    assert!(user.verified_at.is_some());

    db::update_user_verification(&conn, 5, false).unwrap();
    let user = db::get_user(&conn, 5).unwrap().unwrap();
    assert!(!user.is_verified);
    assert_eq!(user.verified_at, None);
}
