//! Course ingestion: drafts, the per-admin conversation store and the state
//! machine that turns admin input into published courses.
//!
//! Nothing in here talks to Telegram directly; the transport plugs in through
//! [`MessageFetcher`] and [`Announcer`], storage through [`CourseStore`].

pub mod draft;
pub mod input;
pub mod links;
pub mod machine;
pub mod publish;
pub mod store;
pub mod traits;

pub use draft::{
    ChannelRef, Conversation, ConversationState, CourseDraft, DraftSummary, FileDescriptor, IngestMode, LinkRef,
    MediaKind,
};
pub use input::{AdminInput, ConfirmSelection};
pub use machine::{IngestionMachine, Outcome};
pub use publish::{deep_link, PublishReport};
pub use store::ConversationStore;
pub use traits::{Announcement, Announcer, CourseStore, FetchError, MessageFetcher};
