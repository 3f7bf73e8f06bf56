//! End-to-end tests of the course ingestion machine
//!
//! The machine runs against a real SQLite catalogue (or a failing store) with
//! scripted link resolution and a recording announcer.
//!
//! Run with: cargo test --test ingestion_test

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;
mod mocks;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{sqlite_machine, temp_pool, ADMIN, BOT_USERNAME, CAPTION_TEMPLATE};
use coursebot::course::{
    AdminInput, ChannelRef, ConfirmSelection, ConversationState, FetchError, IngestMode, IngestionMachine, LinkRef,
    Outcome,
};
use coursebot::storage::courses;
use coursebot::storage::get_connection;
use mocks::{media, photo, FlakyStore, RecordingAnnouncer, ScriptedFetcher};

fn text(s: &str) -> AdminInput {
    AdminInput::Text(s.to_string())
}

fn start(mode: IngestMode) -> AdminInput {
    AdminInput::Start { mode }
}

#[tokio::test]
async fn sicilian_defense_scenario_publishes_one_course() {
    let (_dir, pool) = temp_pool();
    let announcer = Arc::new(RecordingAnnouncer::default());
    let machine = sqlite_machine(pool.clone(), Arc::new(ScriptedFetcher::new()), announcer.clone());

    machine.handle(ADMIN, start(IngestMode::Forward)).await;
    let named = machine.handle(ADMIN, text("Sicilian Defense Crash Course")).await;
    assert!(matches!(named, Outcome::NameAccepted { .. }));

    for (i, name) in ["01 Intro.mp4", "02 Najdorf.mp4", "03 Dragon.pdf"].iter().enumerate() {
        let outcome = machine
            .handle(ADMIN, AdminInput::Media(media(&format!("file-{}", i), name, 1000, i as i64)))
            .await;
        assert_eq!(outcome, Outcome::FileAdded { count: i + 1 });
    }

    assert_eq!(
        machine.handle(ADMIN, AdminInput::Done).await,
        Outcome::FilesCollected { files: 3, failed: 0 }
    );
    assert!(matches!(
        machine.handle(ADMIN, AdminInput::Skip).await,
        Outcome::Confirmation { repeated: false, .. }
    ));

    let report = match machine
        .handle(ADMIN, AdminInput::Selection(ConfirmSelection::Confirm))
        .await
    {
        Outcome::Published(report) => report,
        other => panic!("expected Published, got {:?}", other),
    };
    assert!(machine.state_of(ADMIN).is_none());

    let conn = get_connection(&pool).unwrap();
    let page = courses::get_all_courses(&conn, 10, 0).unwrap();
    assert_eq!(page.total, 1);
    let course = &page.courses[0];
    assert_eq!(course.course_name, "Sicilian Defense Crash Course");
    assert_eq!(course.file_count, 3);
    assert_eq!(course.banner_id, None);
    assert_eq!(course.course_id, report.course_id);

    let files = courses::get_files_for_course(&conn, &course.course_id).unwrap();
    assert_eq!(files.iter().map(|f| f.file_order).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(files[1].file_name, "02 Najdorf.mp4");
    assert_eq!(
        files[0].caption.as_deref(),
        Some("📚 01 Intro.mp4\n\nCourse: Sicilian Defense Crash Course")
    );

    let announcements = announcer.recorded();
    assert_eq!(announcements.len(), 1);
    assert!(announcements[0].deep_link.contains(&course.course_id));
    assert!(announcements[0]
        .deep_link
        .starts_with(&format!("https://t.me/{}?start=course_", BOT_USERNAME)));
}

#[tokio::test]
async fn publish_writes_n_files_in_draft_order() {
    let (_dir, pool) = temp_pool();
    let machine = sqlite_machine(
        pool.clone(),
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::default()),
    );

    machine.handle(ADMIN, start(IngestMode::Forward)).await;
    machine.handle(ADMIN, text("Endgames")).await;
    // Source order deliberately scrambled: draft order wins
    for (id, order) in [("z", 9), ("a", 1), ("m", 5), ("b", 2), ("y", 8)] {
        machine
            .handle(ADMIN, AdminInput::Media(media(id, &format!("{}.pdf", id), 10, order)))
            .await;
    }
    machine.handle(ADMIN, AdminInput::Done).await;
    machine.handle(ADMIN, AdminInput::Media(photo("banner-1"))).await;
    let outcome = machine.handle(ADMIN, text("3")).await;
    assert!(matches!(outcome, Outcome::Published(_)));

    let conn = get_connection(&pool).unwrap();
    let course = &courses::get_all_courses(&conn, 10, 0).unwrap().courses[0];
    assert_eq!(course.banner_id.as_deref(), Some("banner-1"));
    assert_eq!(course.total_size, 50);

    let files = courses::get_files_for_course(&conn, &course.course_id).unwrap();
    assert_eq!(
        files.iter().map(|f| (f.file_id.as_str(), f.file_order)).collect::<Vec<_>>(),
        vec![("z", 1), ("a", 2), ("m", 3), ("b", 4), ("y", 5)]
    );
}

#[tokio::test]
async fn punctuation_only_name_keeps_awaiting_name() {
    let (_dir, pool) = temp_pool();
    let machine = sqlite_machine(
        pool,
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::default()),
    );

    machine.handle(ADMIN, start(IngestMode::Forward)).await;
    for name in ["   ", "...!!!", " -- ? "] {
        assert_eq!(machine.handle(ADMIN, text(name)).await, Outcome::NameRejected);
        assert_eq!(machine.state_of(ADMIN), Some(ConversationState::AwaitingName));
    }
}

#[tokio::test]
async fn done_with_nothing_collected_stays_in_awaiting_files() {
    for mode in [IngestMode::Forward, IngestMode::Links] {
        let (_dir, pool) = temp_pool();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let machine = sqlite_machine(pool, fetcher.clone(), Arc::new(RecordingAnnouncer::default()));

        machine.handle(ADMIN, start(mode)).await;
        machine.handle(ADMIN, text("Openings")).await;
        assert_eq!(
            machine.handle(ADMIN, AdminInput::Done).await,
            Outcome::NothingCollected { mode }
        );
        assert_eq!(machine.state_of(ADMIN), Some(ConversationState::AwaitingFiles));
        assert!(fetcher.calls().is_empty());
    }
}

#[tokio::test]
async fn two_valid_links_and_one_malformed_are_queued_silently() {
    let (_dir, pool) = temp_pool();
    let machine = sqlite_machine(
        pool,
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::default()),
    );

    machine.handle(ADMIN, start(IngestMode::Links)).await;
    machine.handle(ADMIN, text("Middlegames")).await;

    let message = "https://t.me/c/1234567/10\nhttps://t.me/c/1234567\nhttps://t.me/chesscourses/11";
    assert_eq!(
        machine.handle(ADMIN, text(message)).await,
        Outcome::LinksQueued { added: 2, queued: 2 }
    );

    let junk = "https://t.me/not-a-link https://t.me/chesscourses/12abc";
    assert_eq!(
        machine.handle(ADMIN, text(junk)).await,
        Outcome::NoLinksFound
    );

    let draft = machine.conversations().get(ADMIN).unwrap().draft;
    assert_eq!(
        draft.links,
        vec![
            LinkRef {
                channel: ChannelRef::Private(-1001234567),
                message_id: 10
            },
            LinkRef {
                channel: ChannelRef::Public("chesscourses".to_string()),
                message_id: 11
            },
        ]
    );
}

#[tokio::test]
async fn partial_resolution_advances_to_banner() {
    let (_dir, pool) = temp_pool();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .answer(1, Ok(media("f1", "one.pdf", 10, 1)))
            .answer(2, Err(FetchError::NoMedia))
            .answer(3, Ok(media("f3", "three.pdf", 10, 3))),
    );
    let machine = sqlite_machine(pool, fetcher.clone(), Arc::new(RecordingAnnouncer::default()));

    machine.handle(ADMIN, start(IngestMode::Links)).await;
    machine.handle(ADMIN, text("Tactics")).await;
    machine
        .handle(ADMIN, text("https://t.me/c/555/1 https://t.me/c/555/2 https://t.me/c/555/3"))
        .await;

    assert_eq!(
        machine.handle(ADMIN, AdminInput::Done).await,
        Outcome::FilesCollected { files: 2, failed: 1 }
    );
    assert_eq!(machine.state_of(ADMIN), Some(ConversationState::AwaitingBanner));
    assert_eq!(fetcher.calls().len(), 3);

    let draft = machine.conversations().get(ADMIN).unwrap().draft;
    assert_eq!(
        draft.files.iter().map(|f| f.file_id.as_str()).collect::<Vec<_>>(),
        vec!["f1", "f3"]
    );
    assert!(draft.links.is_empty());
}

#[tokio::test]
async fn total_resolution_failure_keeps_queue_and_publishes_nothing() {
    let (_dir, pool) = temp_pool();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let announcer = Arc::new(RecordingAnnouncer::default());
    let machine = sqlite_machine(pool.clone(), fetcher.clone(), announcer.clone());

    machine.handle(ADMIN, start(IngestMode::Links)).await;
    machine.handle(ADMIN, text("Strategy")).await;
    machine.handle(ADMIN, text("https://t.me/c/9/1 https://t.me/c/9/2")).await;

    assert_eq!(
        machine.handle(ADMIN, AdminInput::Done).await,
        Outcome::ResolutionFailed { attempted: 2 }
    );
    assert_eq!(machine.state_of(ADMIN), Some(ConversationState::AwaitingFiles));
    assert_eq!(machine.conversations().get(ADMIN).unwrap().draft.links.len(), 2);

    // A second done re-attempts the same links
    machine.handle(ADMIN, AdminInput::Done).await;
    assert_eq!(fetcher.calls().len(), 4);

    let conn = get_connection(&pool).unwrap();
    assert_eq!(courses::course_count(&conn).unwrap(), 0);
    assert!(announcer.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_the_requested_delay_and_counts_as_failed() {
    let (_dir, pool) = temp_pool();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .answer(1, Err(FetchError::RateLimited(Duration::from_secs(42))))
            .answer(2, Ok(media("f2", "two.pdf", 10, 2))),
    );
    let machine = sqlite_machine(pool, fetcher.clone(), Arc::new(RecordingAnnouncer::default()));

    machine.handle(ADMIN, start(IngestMode::Links)).await;
    machine.handle(ADMIN, text("Puzzles")).await;
    machine.handle(ADMIN, text("https://t.me/c/77/1 https://t.me/c/77/2")).await;

    let before = tokio::time::Instant::now();
    let outcome = machine.handle(ADMIN, AdminInput::Done).await;
    assert!(before.elapsed() >= Duration::from_secs(42));
    assert_eq!(outcome, Outcome::FilesCollected { files: 1, failed: 1 });
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn restart_replaces_existing_draft() {
    let (_dir, pool) = temp_pool();
    let machine = sqlite_machine(
        pool,
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::default()),
    );

    machine.handle(ADMIN, start(IngestMode::Links)).await;
    machine.handle(ADMIN, text("Old course")).await;
    machine.handle(ADMIN, text("https://t.me/c/1/1 https://t.me/c/1/2")).await;

    assert_eq!(
        machine.handle(ADMIN, start(IngestMode::Forward)).await,
        Outcome::Started {
            mode: IngestMode::Forward
        }
    );
    let conversation = machine.conversations().get(ADMIN).unwrap();
    assert_eq!(conversation.state, ConversationState::AwaitingName);
    assert_eq!(conversation.draft.course_name, None);
    assert!(conversation.draft.links.is_empty());
    assert!(conversation.draft.files.is_empty());
    assert_eq!(conversation.draft.mode, IngestMode::Forward);
}

#[tokio::test]
async fn failed_course_write_keeps_draft_for_retry() {
    let store = Arc::new(FlakyStore::default());
    let announcer = Arc::new(RecordingAnnouncer::default());
    let machine = IngestionMachine::new(
        store.clone(),
        Arc::new(ScriptedFetcher::new()),
        announcer.clone(),
        BOT_USERNAME,
        CAPTION_TEMPLATE,
    );

    machine.handle(ADMIN, start(IngestMode::Forward)).await;
    machine.handle(ADMIN, text("Gambits")).await;
    machine.handle(ADMIN, AdminInput::Media(media("f1", "one.pdf", 10, 1))).await;
    machine.handle(ADMIN, AdminInput::Done).await;
    machine.handle(ADMIN, AdminInput::Skip).await;

    let failed = machine.handle(ADMIN, text("yes")).await;
    assert!(matches!(failed, Outcome::PublishFailed { .. }));
    assert_eq!(machine.state_of(ADMIN), Some(ConversationState::AwaitingConfirmation));
    assert!(store.files.lock().unwrap().is_empty());
    assert!(announcer.recorded().is_empty());

    store.heal();
    let retried = machine.handle(ADMIN, text("yes")).await;
    assert!(matches!(retried, Outcome::Published(_)));
    assert_eq!(store.courses.lock().unwrap().len(), 1);
    assert_eq!(store.files.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn announcement_failure_is_reported_not_rolled_back() {
    let (_dir, pool) = temp_pool();
    let machine = sqlite_machine(
        pool.clone(),
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::failing()),
    );

    machine.handle(ADMIN, start(IngestMode::Forward)).await;
    machine.handle(ADMIN, text("Blitz")).await;
    machine.handle(ADMIN, AdminInput::Media(media("f1", "one.pdf", 10, 1))).await;
    machine.handle(ADMIN, AdminInput::Done).await;
    machine.handle(ADMIN, AdminInput::Skip).await;

    match machine.handle(ADMIN, text("confirm")).await {
        Outcome::Published(report) => assert!(report.announce_error.is_some()),
        other => panic!("expected Published, got {:?}", other),
    }
    let conn = get_connection(&pool).unwrap();
    assert_eq!(courses::course_count(&conn).unwrap(), 1);
}

#[tokio::test]
async fn admins_do_not_share_drafts() {
    let (_dir, pool) = temp_pool();
    let machine = Arc::new(sqlite_machine(
        pool,
        Arc::new(ScriptedFetcher::new()),
        Arc::new(RecordingAnnouncer::default()),
    ));

    let mut handles = Vec::new();
    for admin in 1..=8i64 {
        let machine = machine.clone();
        handles.push(tokio::spawn(async move {
            machine.handle(admin, start(IngestMode::Forward)).await;
            machine.handle(admin, text(&format!("Course {}", admin))).await;
            for n in 0..admin {
                machine
                    .handle(admin, AdminInput::Media(media(&format!("{}-{}", admin, n), "f.pdf", 1, n)))
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for admin in 1..=8i64 {
        let draft = machine.conversations().get(admin).unwrap().draft;
        assert_eq!(draft.course_name, Some(format!("Course {}", admin)));
        assert_eq!(draft.files.len(), admin as usize);
        assert!(draft.files.iter().all(|f| f.file_id.starts_with(&format!("{}-", admin))));
    }
}
