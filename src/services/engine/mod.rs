//! Command interface to the mod engine and the thread that hosts it.
//!
//! The engine owns all mod state and runs on its own background thread. The
//! loader talks to it only through the [`Engine`] command trait and hears back
//! only through the notification channel.

pub mod catalog;

pub use catalog::CatalogBackend;

use crate::ui::bridge::NotificationSender;
use camino::Utf8PathBuf;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while starting or talking to the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine's runtime dependency is missing; nothing can be loaded
    #[error("engine runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("engine thread has stopped")]
    Disconnected,

    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Commands the loader can issue to the engine.
///
/// Every command is fire-and-forget: results arrive later as envelopes on
/// the notification channel, in the order the engine produces them.
#[cfg_attr(test, mockall::automock)]
pub trait Engine: Send + Sync {
    fn reload_mods(&self) -> Result<(), EngineError>;
    fn get_mods_data(&self) -> Result<(), EngineError>;
    fn install_base_mod(&self, label: &str) -> Result<(), EngineError>;
    fn get_mod_conflict(&self, mod_hash: &str) -> Result<(), EngineError>;
    fn install_mod(&self, mod_hash: &str) -> Result<(), EngineError>;
    fn uninstall_mod(&self, mod_hash: &str) -> Result<(), EngineError>;
    fn delete_mod(&self, mod_hash: &str) -> Result<(), EngineError>;
    fn set_mods_path(&self, path: &str) -> Result<(), EngineError>;
}

/// Wire form of an [`Engine`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    ReloadMods,
    GetModsData,
    InstallBaseMod { label: String },
    GetModConflict { mod_hash: String },
    InstallMod { mod_hash: String },
    UninstallMod { mod_hash: String },
    DeleteMod { mod_hash: String },
    SetModsPath { path: Utf8PathBuf },
}

/// Cloneable [`Engine`] handle that forwards commands to the engine thread
#[derive(Clone)]
pub struct EngineClient {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineClient {
    /// Create a client together with the receiving end of its command stream
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (Self { command_tx }, command_rx)
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        tracing::debug!("Engine <- {:?}", command);
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }
}

impl Engine for EngineClient {
    fn reload_mods(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::ReloadMods)
    }

    fn get_mods_data(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::GetModsData)
    }

    fn install_base_mod(&self, label: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::InstallBaseMod {
            label: label.to_string(),
        })
    }

    fn get_mod_conflict(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::GetModConflict {
            mod_hash: mod_hash.to_string(),
        })
    }

    fn install_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::InstallMod {
            mod_hash: mod_hash.to_string(),
        })
    }

    fn uninstall_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::UninstallMod {
            mod_hash: mod_hash.to_string(),
        })
    }

    fn delete_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::DeleteMod {
            mod_hash: mod_hash.to_string(),
        })
    }

    fn set_mods_path(&self, path: &str) -> Result<(), EngineError> {
        self.send(EngineCommand::SetModsPath {
            path: Utf8PathBuf::from(path),
        })
    }
}

/// The engine implementation hosted on the background thread
pub trait EngineBackend: Send + 'static {
    /// Verify the runtime dependency and prepare state. Runs on the caller's
    /// thread before the engine thread exists.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Execute one command, pushing any resulting envelopes
    fn handle(&mut self, command: EngineCommand, out: &NotificationSender);
}

/// Owns the engine thread for the lifetime of the application
pub struct EngineHost {
    thread: Option<JoinHandle<()>>,
}

impl EngineHost {
    /// Start `backend` and run it on a dedicated thread.
    ///
    /// A failing [`EngineBackend::start`] is returned before any thread is
    /// spawned; the caller treats it as process-fatal.
    pub fn spawn<B: EngineBackend>(
        mut backend: B,
        notifications: NotificationSender,
    ) -> Result<(Self, EngineClient), EngineError> {
        backend.start()?;

        let (client, mut command_rx) = EngineClient::channel();

        let thread = thread::Builder::new()
            .name("bmodloader-engine".to_string())
            .spawn(move || {
                tracing::debug!("Engine thread started");

                while let Some(command) = command_rx.blocking_recv() {
                    backend.handle(command, &notifications);
                }

                tracing::debug!("Engine thread terminated");
            })?;

        Ok((
            Self {
                thread: Some(thread),
            },
            client,
        ))
    }

    /// Wait for the engine thread to exit.
    ///
    /// The thread stops once every [`EngineClient`] has been dropped.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Engine thread panicked");
            }
        }
    }
}
