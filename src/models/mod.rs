//! Data models for the mod loader.
//!
//! This module contains the plain data structures passed between the engine,
//! the import services and the presentation layer:
//! - [`LoaderConfig`]: Paths, extension, link scheme and timings loaded from `bmodloader.yaml`
//! - [`Notification`] / [`Envelope`]: Everything the engine pushes through the notification channel
//! - [`ModData`]: The engine's per-mod record
//! - [`ViewState`]: The UI-facing projection the router mutates
//!
//! # Architecture Note
//!
//! Models carry no behavior beyond small helpers. [`ViewState`] is owned by
//! [`ViewStore`](crate::state::ViewStore) and changed only from the single
//! consumer context.

pub mod config;
pub mod mod_data;
pub mod notification;
pub mod view_state;

pub use config::{LoaderConfig, is_mod_file};
pub use mod_data::ModData;
pub use notification::{Envelope, Notification};
pub use view_state::{ConflictPrompt, ErrorReport, ProgressView, Screen, ViewState};
