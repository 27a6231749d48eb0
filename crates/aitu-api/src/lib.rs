//! REST client for the aitu-connect platform API.
//!
//! Covers the chat endpoints the sync engine consumes plus sign-in/sign-out,
//! which is what puts the `sid` cookie into the shared [`Session`].

pub mod auth;
pub mod chat;
pub mod client;
pub mod error;
pub mod session;

pub use chat::ChatApi;
pub use client::ApiClient;
pub use error::ApiError;
pub use session::Session;
