// BModLoader - mod loader coordination layer
//
// This is the library crate containing import queues, archive unpacking,
// the engine interface and notification routing. The binary crate (main.rs)
// provides a headless entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{Envelope, ErrorReport, LoaderConfig, ModData, Notification, ViewState};
pub use services::{DeferredQueue, Engine, ImportCoordinator};
pub use state::{ViewChange, ViewStore};
pub use ui::Controller;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
