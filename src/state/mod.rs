//! State Management Module
//!
//! The track store with its history, scope resolution, change notification,
//! background jobs and the persisted project document.

pub mod history;
pub mod jobs;
pub mod observer;
pub mod project;
pub mod scope;
pub mod store;
pub mod track;

pub use history::{ActionType, History, HistoryEntry, HistoryItem};
pub use jobs::{JobOutcome, JobTicket, PendingJob};
pub use observer::{StoreEvent, SubscriptionId};
pub use project::{
    audio_ref, load_project_dir, read_project_document, save_project_dir, ProjectDocument,
    TrackDocument,
};
pub use scope::{resolve, Scope, Target};
pub use store::TrackStore;
pub use track::{ProjectState, RepeatRegion, Selection, Track, TrackId};
