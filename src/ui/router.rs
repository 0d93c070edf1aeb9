// NotificationRouter - turns engine envelopes into view state changes
//
// Runs only on the consumer context. Holds the small state machine that
// tracks which long-running engine operation is in flight, and the buffer
// that batches soft errors into a single report.

use crate::metrics::Metrics;
use crate::models::{ConflictPrompt, Envelope, ErrorReport, Notification};
use crate::services::engine::{Engine, EngineError};
use crate::state::ViewStore;
use std::sync::Arc;

/// Which engine operation the router is currently following
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RouterState {
    #[default]
    Idle,
    LoadingMods,
    SearchingConflicts(String),
    Installing(String),
    Uninstalling(String),
}

/// Soft-error notifications collected until the next checkpoint
#[derive(Debug, Default)]
pub struct ErrorBuffer {
    pending: Vec<Notification>,
}

impl ErrorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Empty the buffer into one report, one line per buffered
    /// notification. Returns `None` when nothing was buffered.
    pub fn take_report(&mut self) -> Option<ErrorReport> {
        if self.pending.is_empty() {
            return None;
        }

        let content: String = std::mem::take(&mut self.pending)
            .iter()
            .map(|notification| format!("{}\n", render_line(notification)))
            .collect();

        Some(ErrorReport::new("Errors:", content))
    }
}

/// User-facing line for a soft-error notification
pub fn render_line(notification: &Notification) -> String {
    use Notification::*;
    match notification {
        LoadingModIsEmpty { name, .. } => format!("Mod '{name}' is empty"),
        InstallingModNotFoundFileElement { element, .. } => {
            format!("Not found element '{element}' in bmod")
        }
        InstallingModNotFoundGameSwf { swf, .. } => format!("Not found game file '{swf}'"),
        InstallingModSwfScriptError { script, .. } => format!("Script '{script}' not installed"),
        InstallingModSwfSoundSymbolclassNotExist { sound, swf, .. } => {
            format!("Not found sound '{sound}' in '{swf}'")
        }
        InstallingModSoundNotExist { sound, id, swf, .. } => {
            format!("Not found sound '{sound} ({id})' in '{swf}'")
        }
        InstallingModSwfSpriteSymbolclassNotExist { sprite, swf, .. } => {
            format!("Not found sprite '{sprite}' in '{swf}'")
        }
        InstallingModSpriteNotExist { sprite, id, .. } => {
            format!("Not found sprite '{sprite} ({id})' in mod file")
        }
        UninstallingModSwfOriginalElementNotFound { element, swf, .. } => {
            format!("Not found orig element '{element}' in '{swf}'")
        }
        UninstallingModSwfElementNotFound { element, swf, .. } => {
            format!("Not found mod element '{element}' in '{swf}'")
        }
        CompileModSourcesSpriteHasNoSymbolclass { detail, .. }
        | CompileModSourcesSpriteEmpty { detail, .. }
        | CompileModSourcesSpriteNotFoundInFolder { detail, .. }
        | CompileModSourcesUnsupportedCategory { detail, .. }
        | CompileModSourcesUnknownFile { detail, .. }
        | CompileModSourcesSaveError { detail, .. } => {
            format!("{}: {}", notification.kind_name(), detail)
        }
        other => format!("{:?}", other),
    }
}

pub struct NotificationRouter {
    engine: Arc<dyn Engine>,
    state: RouterState,
    errors: ErrorBuffer,
    metrics: Arc<Metrics>,
}

impl NotificationRouter {
    pub fn new(engine: Arc<dyn Engine>, metrics: Arc<Metrics>) -> Self {
        Self {
            engine,
            state: RouterState::Idle,
            errors: ErrorBuffer::new(),
            metrics,
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn error_buffer(&self) -> &ErrorBuffer {
        &self.errors
    }

    /// Apply one envelope to the view
    pub fn route(&mut self, envelope: Envelope, store: &mut ViewStore) {
        self.metrics.record_envelope();

        match envelope {
            Envelope::Notification(notification) => self.route_notification(notification, store),
            Envelope::ModsReloaded => {
                self.state = RouterState::LoadingMods;
                store.update(|state| {
                    state.mods.clear();
                    state.screen = crate::models::Screen::Loading;
                });
            }
            Envelope::ModsData(mods) => {
                tracing::info!("Loaded {} mods", mods.len());
                store.show_mods(mods);
                if self.state == RouterState::LoadingMods {
                    self.state = RouterState::Idle;
                }
                self.flush_errors(store);
            }
            Envelope::ConflictCheck { searching, mod_hash } => {
                if searching {
                    let title = format!("Searching conflicts '{}'...", store.state().mod_name(&mod_hash));
                    store.update(|state| state.progress.show(title, "Searching..."));
                    self.state = RouterState::SearchingConflicts(mod_hash);
                }
            }
            Envelope::InstallStarted { installing, mod_hash } => {
                if installing {
                    let title = format!("Installing mod '{}'...", store.state().mod_name(&mod_hash));
                    store.update(|state| state.progress.show(title, "Loading mod..."));
                    self.state = RouterState::Installing(mod_hash);
                }
            }
            Envelope::UninstallStarted {
                uninstalling,
                mod_hash,
            } => {
                if uninstalling {
                    let title = format!("Uninstalling mod '{}'...", store.state().mod_name(&mod_hash));
                    store.update(|state| state.progress.show(title, ""));
                    self.state = RouterState::Uninstalling(mod_hash);
                }
            }
            Envelope::BaseModInstalling { label } => {
                tracing::debug!("Installing base mod {}", label);
                store.update(|state| state.loading_text = "Installing base mod...".to_string());
            }
            Envelope::ModDeleted { mod_hash } => {
                tracing::debug!("Engine deleted mod {}", mod_hash);
            }
            Envelope::ModsPathSet { path } => {
                tracing::debug!("Engine mods path set to {}", path);
            }
        }
    }

    fn route_notification(&mut self, notification: Notification, store: &mut ViewStore) {
        use Notification::*;

        if notification.is_soft_error() {
            tracing::debug!("Buffering soft error {}", notification.kind_name());
            self.metrics.record_soft_error();
            self.errors.push(notification);
            return;
        }

        match notification {
            LoadingMod { path } => {
                let text = format!("Loading mod '{}'", path.as_deref().unwrap_or("from cache"));
                store.update(|state| state.loading_text = text);
            }
            ModElementsCount { count, .. } => {
                store.update(|state| state.progress.maximum = count);
            }

            ConflictSearchInSwf { swf, .. } => step(store, format!("Searching in: {swf}")),
            ConflictNotFound { mod_hash } => {
                store.update(|state| state.progress.value = 0);
                self.state = RouterState::Idle;
                self.send("install", |engine| engine.install_mod(&mod_hash));
            }
            Conflict { mod_hash, conflicts } => {
                let content = conflict_content(store, &conflicts);
                tracing::info!("Mod {} conflicts with {} installed mods", mod_hash, conflicts.len());
                store.update(|state| {
                    state.progress.hide();
                    state.conflict_prompt = Some(ConflictPrompt {
                        mod_hash,
                        title: "Conflict mods!".to_string(),
                        content,
                    });
                });
            }

            InstallingModSwf { swf, .. } => {
                store.update(|state| state.progress.content = format!("Open game file: {swf}"));
            }
            InstallingModSwfSprite { sprite, .. } => step(store, format!("Installing sprite: {sprite}")),
            InstallingModSwfSound { sound, .. } => step(store, format!("Installing sound: {sound}")),
            InstallingModFile { file, .. } => step(store, format!("Installing file: {file}")),
            InstallingModFileCache { file, .. } => step(store, file),
            InstallingModFinished { mod_hash } => self.finish(&mod_hash, true, store),

            UninstallingModSwf { swf, .. } => {
                store.update(|state| state.progress.content = swf);
            }
            UninstallingModSwfSprite { sprite, .. } => step(store, sprite),
            UninstallingModSwfSound { sound, .. } => step(store, sound),
            UninstallingModFile { file, .. } => step(store, file),
            UninstallingModFinished { mod_hash } => self.finish(&mod_hash, false, store),

            Unknown { kind, args } => {
                tracing::debug!("Ignoring unknown notification {} {:?}", kind, args);
            }
            other => {
                tracing::debug!("Unhandled notification {}", other.kind_name());
            }
        }
    }

    fn finish(&mut self, mod_hash: &str, installed: bool, store: &mut ViewStore) {
        if !store.set_installed(mod_hash, installed) {
            tracing::warn!("Finished notification for unlisted mod {}", mod_hash);
        }
        store.update(|state| state.progress.hide());
        self.state = RouterState::Idle;
        self.flush_errors(store);
    }

    fn flush_errors(&mut self, store: &mut ViewStore) {
        if let Some(report) = self.errors.take_report() {
            self.metrics.record_error_report();
            store.show_error(report);
        }
    }

    /// Resolve the pending conflict prompt by installing anyway
    pub fn accept_conflict(&mut self, store: &mut ViewStore) {
        let Some(prompt) = store.state().conflict_prompt.clone() else {
            return;
        };
        store.update(|state| state.conflict_prompt = None);
        self.state = RouterState::Idle;
        self.send("install", |engine| engine.install_mod(&prompt.mod_hash));
    }

    /// Abandon the pending conflicting install
    pub fn cancel_conflict(&mut self, store: &mut ViewStore) {
        if store.state().conflict_prompt.is_none() {
            return;
        }
        store.update(|state| state.conflict_prompt = None);
        self.state = RouterState::Idle;
    }

    fn send<F>(&self, what: &str, command: F)
    where
        F: FnOnce(&dyn Engine) -> Result<(), EngineError>,
    {
        if let Err(e) = command(self.engine.as_ref()) {
            tracing::error!("Failed to send {} command: {}", what, e);
        }
    }
}

/// Per-element progress: new status line plus one step
fn step(store: &mut ViewStore, content: String) {
    store.update(|state| {
        state.progress.content = content;
        state.progress.add_value();
    });
}

fn conflict_content(store: &ViewStore, conflicts: &[String]) -> String {
    let mut content = String::from("Mods:");
    for hash in conflicts {
        match store.state().mods.get(hash) {
            Some(data) => content.push_str(&format!("\n- {}", data.name)),
            None => {
                tracing::warn!("Conflicting mod {} is not listed", hash);
                content.push_str(&format!("\n- UNKNOWN MOD: {hash}"));
            }
        }
    }
    content
}
