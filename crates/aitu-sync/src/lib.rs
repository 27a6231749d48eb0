//! Client-side sync engine: keeps the conversation list, per-conversation
//! transcripts, the active conversation, and the live connection consistent
//! with each other.

pub mod cache;
pub mod handle;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod view;

pub use handle::{Command, SyncHandle, spawn};
pub use orchestrator::{Fetched, SendOutcome, SendRejection, SyncOrchestrator};
pub use view::ChatView;
