//! # troupe-core
//!
//! Foundation types and utilities shared by every Troupe crate.
//!
//! - **Credentials**: [`CredentialToken`], an opaque provider key that never
//!   prints its secret
//! - **Cast**: [`CastEntry`] descriptors and the `"{speaker}：{text}"` line format
//! - **History**: [`HistoryWindow`], the bounded view an agent prompts from
//! - **IDs**: [`SessionId`] branded newtype
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod cast;
pub mod constants;
pub mod credential;
pub mod history;
pub mod ids;
pub mod logging;

pub use cast::{CastEntry, format_line, strip_speaker_prefix};
pub use credential::CredentialToken;
pub use history::HistoryWindow;
pub use ids::SessionId;
