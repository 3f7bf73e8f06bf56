//! Glue between Telegram updates and the course ingestion machine.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};

use super::types::HandlerDeps;
use crate::course::{AdminInput, ConversationState, IngestMode, Outcome};
use crate::telegram::keyboards::confirmation_keyboard;
use crate::telegram::media::extract_file;
use crate::telegram::notifications::notify_admins_and;
use crate::telegram::texts;
use crate::telegram::Bot;

/// Text (HTML) plus optional keyboard answering one ingestion step.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Classifies an admin message for the machine. Content that is neither media
/// nor text is passed on as empty text.
pub fn input_from_message(msg: &Message) -> AdminInput {
    if let Some(file) = extract_file(msg) {
        return AdminInput::Media(file);
    }
    AdminInput::Text(msg.text().unwrap_or_default().to_string())
}

/// What to tell the admin for an outcome. `None` means stay silent.
pub fn render(outcome: &Outcome) -> Option<Reply> {
    let reply = match outcome {
        Outcome::Started { mode } => Reply::text(texts::name_prompt(*mode)),
        Outcome::NameRejected => Reply::text(texts::NAME_REJECTED),
        Outcome::NameAccepted { name, mode } => Reply::text(texts::files_prompt(name, *mode)),
        Outcome::FileAdded { count } => Reply::text(texts::file_added(*count)),
        Outcome::LinksQueued { added, queued } => Reply::text(texts::links_queued(*added, *queued)),
        Outcome::NoLinksFound => Reply::text(texts::NO_LINKS_FOUND),
        Outcome::MediaExpected => Reply::text(texts::MEDIA_EXPECTED),
        Outcome::LinksExpected => Reply::text(texts::LINKS_EXPECTED),
        Outcome::NothingCollected { mode } => Reply::text(texts::nothing_collected(*mode)),
        Outcome::ResolutionFailed { attempted } => Reply::text(texts::resolution_failed(*attempted)),
        Outcome::FilesCollected { files, failed } => Reply::text(texts::files_collected(*files, *failed)),
        Outcome::BannerExpected => Reply::text(texts::BANNER_EXPECTED),
        Outcome::Confirmation { summary, repeated } => Reply {
            text: texts::confirmation(summary, *repeated),
            keyboard: Some(confirmation_keyboard(summary.has_banner)),
        },
        Outcome::BannerRequested => Reply::text(texts::BANNER_REQUESTED),
        Outcome::NameRequested => Reply::text(texts::NAME_REQUESTED),
        Outcome::Published(report) => Reply::text(texts::published(
            &report.course_name,
            &report.course_id,
            &report.deep_link,
        )),
        Outcome::PublishFailed { reason } => Reply::text(texts::publish_failed(reason)),
        Outcome::Cancelled => Reply::text(texts::CANCELLED),
        Outcome::NotInConversation => Reply::text(texts::NOT_IN_CONVERSATION),
        Outcome::NotCollectingFiles => Reply::text(texts::NOT_COLLECTING_FILES),
        Outcome::Ignored => return None,
    };
    Some(reply)
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<(), teloxide::RequestError> {
    let mut request = bot
        .send_message(chat_id, reply.text)
        .parse_mode(ParseMode::Html);
    if let Some(keyboard) = reply.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

/// Runs one admin input through the machine and answers in `chat_id`.
pub async fn drive(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    admin_id: i64,
    input: AdminInput,
) -> Result<(), teloxide::RequestError> {
    if input == AdminInput::Done && is_link_resolution_pending(deps, admin_id) {
        send_reply(bot, chat_id, Reply::text(texts::RESOLVING_LINKS)).await?;
    }

    let outcome = deps.machine.handle(admin_id, input).await;
    log::debug!("Admin {} ingestion outcome: {:?}", admin_id, outcome);

    if let Outcome::Published(report) = &outcome {
        if let Some(error) = &report.announce_error {
            notify_admins_and(bot, admin_id, &texts::announcement_failed(&report.course_name, error)).await;
        }
    }

    if let Some(reply) = render(&outcome) {
        send_reply(bot, chat_id, reply).await?;
    }
    Ok(())
}

fn is_link_resolution_pending(deps: &HandlerDeps, admin_id: i64) -> bool {
    deps.machine
        .conversations()
        .get(admin_id)
        .map(|c| {
            c.state == ConversationState::AwaitingFiles && c.draft.mode == IngestMode::Links && !c.draft.links.is_empty()
        })
        .unwrap_or(false)
}
