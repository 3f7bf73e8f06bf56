//! Guided course ingestion: name, files or links, banner, confirmation.

use std::sync::Arc;

use crate::core::utils::clean_text;
use crate::course::draft::{Conversation, ConversationState, CourseDraft, DraftSummary, IngestMode, MediaKind};
use crate::course::input::{AdminInput, ConfirmSelection};
use crate::course::links::parse_links;
use crate::course::publish::{publish, PublishReport};
use crate::course::store::ConversationStore;
use crate::course::traits::{Announcer, CourseStore, FetchError, MessageFetcher};

/// What the admin should be told after one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// New draft created, ask for the name
    Started { mode: IngestMode },
    /// Name was empty after stripping punctuation
    NameRejected,
    /// Name stored, ask for files or links
    NameAccepted { name: String, mode: IngestMode },
    FileAdded { count: usize },
    LinksQueued { added: usize, queued: usize },
    /// Link mode text without a single recognizable link
    NoLinksFound,
    /// Forward mode got text instead of media
    MediaExpected,
    /// Link mode got media instead of links
    LinksExpected,
    /// `/done` before anything was collected
    NothingCollected { mode: IngestMode },
    /// Every queued link failed; the queue is kept for another `/done`
    ResolutionFailed { attempted: usize },
    /// Files collected, ask for a banner
    FilesCollected { files: usize, failed: usize },
    /// Banner step got something other than a photo
    BannerExpected,
    /// Show the confirmation menu. `repeated` is set for unrecognized replies.
    Confirmation { summary: DraftSummary, repeated: bool },
    BannerRequested,
    NameRequested,
    Published(PublishReport),
    /// Course write failed; the draft is kept for a retry
    PublishFailed { reason: String },
    Cancelled,
    NotInConversation,
    /// `/done` outside the file collection step
    NotCollectingFiles,
    Ignored,
}

/// Drives every admin's ingestion conversation.
pub struct IngestionMachine {
    conversations: ConversationStore,
    store: Arc<dyn CourseStore>,
    fetcher: Arc<dyn MessageFetcher>,
    announcer: Arc<dyn Announcer>,
    bot_username: String,
    caption_template: String,
}

impl IngestionMachine {
    pub fn new(
        store: Arc<dyn CourseStore>,
        fetcher: Arc<dyn MessageFetcher>,
        announcer: Arc<dyn Announcer>,
        bot_username: impl Into<String>,
        caption_template: impl Into<String>,
    ) -> Self {
        Self {
            conversations: ConversationStore::new(),
            store,
            fetcher,
            announcer,
            bot_username: bot_username.into(),
            caption_template: caption_template.into(),
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Current step of an admin's conversation, if one is running.
    pub fn state_of(&self, admin_id: i64) -> Option<ConversationState> {
        self.conversations.get(admin_id).map(|c| c.state)
    }

    /// Applies one admin input and returns what to reply.
    pub async fn handle(&self, admin_id: i64, input: AdminInput) -> Outcome {
        if let AdminInput::Start { mode } = input {
            if self.conversations.contains(admin_id) {
                log::info!("Admin {} restarted ingestion, previous draft discarded", admin_id);
            }
            self.conversations.set(admin_id, Conversation::start(mode));
            return Outcome::Started { mode };
        }

        if input == AdminInput::Cancel {
            return match self.conversations.clear(admin_id) {
                Some(_) => Outcome::Cancelled,
                None => Outcome::NotInConversation,
            };
        }

        let Some(mut conversation) = self.conversations.get(admin_id) else {
            return match input {
                AdminInput::Done => Outcome::NotCollectingFiles,
                _ => Outcome::Ignored,
            };
        };

        let outcome = match conversation.state {
            ConversationState::AwaitingName => Self::on_name(&mut conversation, input),
            ConversationState::AwaitingFiles => self.on_files(admin_id, &mut conversation, input).await,
            ConversationState::AwaitingBanner => Self::on_banner(&mut conversation, input),
            ConversationState::AwaitingConfirmation => {
                return self.on_confirmation(admin_id, conversation, input).await;
            }
        };

        self.conversations.set(admin_id, conversation);
        outcome
    }

    fn on_name(conversation: &mut Conversation, input: AdminInput) -> Outcome {
        let text = match input {
            AdminInput::Text(text) => text,
            AdminInput::Done => return Outcome::NotCollectingFiles,
            AdminInput::Skip | AdminInput::Selection(_) => return Outcome::Ignored,
            _ => return Outcome::NameRejected,
        };

        if clean_text(&text).is_empty() {
            return Outcome::NameRejected;
        }

        let name = text.trim().to_string();
        conversation.draft.course_name = Some(name.clone());

        // A rename from the confirmation menu goes straight back to it
        if !conversation.draft.files.is_empty() {
            conversation.state = ConversationState::AwaitingConfirmation;
            return Outcome::Confirmation {
                summary: conversation.draft.summary(),
                repeated: false,
            };
        }

        conversation.state = ConversationState::AwaitingFiles;
        Outcome::NameAccepted {
            name,
            mode: conversation.draft.mode,
        }
    }

    async fn on_files(&self, admin_id: i64, conversation: &mut Conversation, input: AdminInput) -> Outcome {
        let draft = &mut conversation.draft;
        match (draft.mode, input) {
            (IngestMode::Forward, AdminInput::Media(file)) => {
                draft.files.push(file);
                Outcome::FileAdded {
                    count: draft.files.len(),
                }
            }
            (IngestMode::Forward, AdminInput::Text(_)) => Outcome::MediaExpected,
            (IngestMode::Links, AdminInput::Text(text)) => {
                let links = parse_links(&text);
                if links.is_empty() {
                    return Outcome::NoLinksFound;
                }
                let added = links.len();
                draft.links.extend(links);
                Outcome::LinksQueued {
                    added,
                    queued: draft.links.len(),
                }
            }
            (IngestMode::Links, AdminInput::Media(_)) => Outcome::LinksExpected,
            (IngestMode::Forward, AdminInput::Done) => {
                if draft.files.is_empty() {
                    return Outcome::NothingCollected { mode: draft.mode };
                }
                conversation.state = ConversationState::AwaitingBanner;
                Outcome::FilesCollected {
                    files: draft.files.len(),
                    failed: 0,
                }
            }
            (IngestMode::Links, AdminInput::Done) => {
                if draft.links.is_empty() {
                    return Outcome::NothingCollected { mode: draft.mode };
                }
                let (resolved, failed) = self.resolve_links(admin_id, draft).await;
                if resolved == 0 {
                    return Outcome::ResolutionFailed { attempted: failed };
                }
                draft.links.clear();
                conversation.state = ConversationState::AwaitingBanner;
                Outcome::FilesCollected {
                    files: resolved,
                    failed,
                }
            }
            _ => Outcome::Ignored,
        }
    }

    /// One fetch per queued link, in order. Returns `(resolved, failed)`.
    async fn resolve_links(&self, admin_id: i64, draft: &mut CourseDraft) -> (usize, usize) {
        let mut resolved = 0;
        let mut failed = 0;

        for link in &draft.links {
            match self.fetcher.fetch(admin_id, link).await {
                Ok(file) => {
                    draft.files.push(file);
                    resolved += 1;
                }
                Err(FetchError::RateLimited(wait)) => {
                    log::warn!("Rate limited while resolving {}, waiting {:?}", link, wait);
                    tokio::time::sleep(wait).await;
                    failed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to resolve {}: {}", link, e);
                    failed += 1;
                }
            }
        }

        log::info!(
            "Admin {} link resolution: {} resolved, {} failed",
            admin_id,
            resolved,
            failed
        );
        (resolved, failed)
    }

    fn on_banner(conversation: &mut Conversation, input: AdminInput) -> Outcome {
        match input {
            AdminInput::Media(file) if file.media_kind == MediaKind::Photo => {
                conversation.draft.banner = Some(file.file_id);
            }
            AdminInput::Skip => {
                conversation.draft.banner = None;
            }
            AdminInput::Done => return Outcome::NotCollectingFiles,
            AdminInput::Selection(_) => return Outcome::Ignored,
            _ => return Outcome::BannerExpected,
        }

        conversation.state = ConversationState::AwaitingConfirmation;
        Outcome::Confirmation {
            summary: conversation.draft.summary(),
            repeated: false,
        }
    }

    async fn on_confirmation(&self, admin_id: i64, mut conversation: Conversation, input: AdminInput) -> Outcome {
        let selection = match input {
            AdminInput::Selection(selection) => selection,
            AdminInput::Text(text) => ConfirmSelection::from_reply(&text),
            AdminInput::Done => return Outcome::NotCollectingFiles,
            _ => ConfirmSelection::Unrecognized,
        };

        match selection {
            ConfirmSelection::Banner => {
                conversation.state = ConversationState::AwaitingBanner;
                self.conversations.set(admin_id, conversation);
                Outcome::BannerRequested
            }
            ConfirmSelection::EditName => {
                conversation.draft.course_name = None;
                conversation.state = ConversationState::AwaitingName;
                self.conversations.set(admin_id, conversation);
                Outcome::NameRequested
            }
            ConfirmSelection::Cancel => {
                self.conversations.clear(admin_id);
                Outcome::Cancelled
            }
            ConfirmSelection::Unrecognized => Outcome::Confirmation {
                summary: conversation.draft.summary(),
                repeated: true,
            },
            ConfirmSelection::Confirm => {
                match publish(
                    self.store.as_ref(),
                    self.announcer.as_ref(),
                    &conversation.draft,
                    admin_id,
                    &self.bot_username,
                    &self.caption_template,
                )
                .await
                {
                    Ok(report) => {
                        self.conversations.clear(admin_id);
                        Outcome::Published(report)
                    }
                    Err(e) => {
                        log::error!("Failed to publish course for admin {}: {}", admin_id, e);
                        Outcome::PublishFailed { reason: e.to_string() }
                    }
                }
            }
        }
    }
}
