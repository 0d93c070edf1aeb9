// View state module
//
// This module provides the ViewStore which owns the ViewState projection and
// emits change events so any number of renderers can follow it.

use crate::models::{ErrorReport, ModData, Screen, ViewState};
use tokio::sync::broadcast;

/// Change events emitted when the projection is modified
///
/// Renderers subscribe to these instead of polling the state.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewChange {
    ScreenChanged {
        screen: Screen,
    },

    LoadingTextChanged {
        text: String,
    },

    /// The mod list was replaced or cleared
    ModsChanged {
        count: usize,
    },

    /// A listed mod changed its installed or file flags
    ModUpdated {
        mod_hash: String,
        installed: bool,
    },

    ProgressUpdated {
        visible: bool,
        title: String,
        content: String,
        value: u32,
        maximum: u32,
    },

    ConflictPrompted {
        mod_hash: String,
        content: String,
    },

    ConflictResolved,

    ErrorReported {
        title: String,
        content: String,
        terminate: bool,
    },

    ErrorDismissed,
}

/// Owner of the [`ViewState`] projection with change broadcasting
///
/// Unlike a shared-state manager, the store is not behind a lock: it is owned
/// by the single consumer context and mutated through `&mut self`, so two
/// call paths can never interleave. Renderers get a read-only event stream
/// via [`subscribe()`](Self::subscribe).
pub struct ViewStore {
    state: ViewState,

    /// Broadcast channel for emitting change events
    change_tx: broadcast::Sender<ViewChange>,
}

impl ViewStore {
    /// Create a store with the loading screen and a 100 event buffer
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: ViewState::default(),
            change_tx,
        }
    }

    /// Borrow the current projection
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, diffs the two and
    /// broadcasts one event per detected change.
    pub fn update<F>(&mut self, update_fn: F) -> Vec<ViewChange>
    where
        F: FnOnce(&mut ViewState),
    {
        let old_state = self.state.clone();

        update_fn(&mut self.state);

        let changes = Self::detect_changes(&old_state, &self.state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.change_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.change_tx.subscribe()
    }

    fn detect_changes(old: &ViewState, new: &ViewState) -> Vec<ViewChange> {
        let mut changes = Vec::new();

        if old.screen != new.screen {
            changes.push(ViewChange::ScreenChanged { screen: new.screen });
        }

        if old.loading_text != new.loading_text {
            changes.push(ViewChange::LoadingTextChanged {
                text: new.loading_text.clone(),
            });
        }

        let same_keys = old.mods.len() == new.mods.len()
            && old.mods.keys().zip(new.mods.keys()).all(|(a, b)| a == b);
        if !same_keys {
            changes.push(ViewChange::ModsChanged {
                count: new.mods.len(),
            });
        } else {
            for (hash, new_mod) in &new.mods {
                let changed = old.mods.get(hash).is_some_and(|old_mod| {
                    old_mod.installed != new_mod.installed
                        || old_mod.mod_file_exist != new_mod.mod_file_exist
                });
                if changed {
                    changes.push(ViewChange::ModUpdated {
                        mod_hash: hash.clone(),
                        installed: new_mod.installed,
                    });
                }
            }
        }

        if old.progress != new.progress {
            changes.push(ViewChange::ProgressUpdated {
                visible: new.progress.visible,
                title: new.progress.title.clone(),
                content: new.progress.content.clone(),
                value: new.progress.value,
                maximum: new.progress.maximum,
            });
        }

        if old.conflict_prompt != new.conflict_prompt {
            match &new.conflict_prompt {
                Some(prompt) => changes.push(ViewChange::ConflictPrompted {
                    mod_hash: prompt.mod_hash.clone(),
                    content: prompt.content.clone(),
                }),
                None => changes.push(ViewChange::ConflictResolved),
            }
        }

        if old.error_report != new.error_report {
            match &new.error_report {
                Some(report) => changes.push(ViewChange::ErrorReported {
                    title: report.title.clone(),
                    content: report.content.clone(),
                    terminate: report.terminate,
                }),
                None => changes.push(ViewChange::ErrorDismissed),
            }
        }

        changes
    }

    // Convenience methods for common updates

    /// Switch to the loading screen with a status line
    pub fn show_loading(&mut self, text: impl Into<String>) -> Vec<ViewChange> {
        let text = text.into();
        self.update(|state| {
            state.screen = Screen::Loading;
            state.loading_text = text;
        })
    }

    /// Replace the mod list and switch to the mods screen
    pub fn show_mods(&mut self, mods: Vec<ModData>) -> Vec<ViewChange> {
        self.update(|state| {
            state.mods = mods.into_iter().map(|m| (m.hash.clone(), m)).collect();
            state.screen = Screen::Mods;
        })
    }

    /// Show an error dialog, hiding the progress dialog and any conflict prompt
    pub fn show_error(&mut self, report: ErrorReport) -> Vec<ViewChange> {
        tracing::warn!("{} {}", report.title, report.content.trim_end());
        self.update(|state| {
            state.progress.hide();
            state.conflict_prompt = None;
            state.error_report = Some(report);
        })
    }

    pub fn dismiss_error(&mut self) -> Vec<ViewChange> {
        self.update(|state| {
            state.error_report = None;
        })
    }

    /// Flip a mod's installed flag; returns false when the mod is not listed
    pub fn set_installed(&mut self, mod_hash: &str, installed: bool) -> bool {
        if !self.state.mods.contains_key(mod_hash) {
            return false;
        }
        self.update(|state| {
            if let Some(entry) = state.mods.get_mut(mod_hash) {
                entry.installed = installed;
            }
        });
        true
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictPrompt;

    #[test]
    fn test_new_store_starts_on_loading_screen() {
        let store = ViewStore::new();
        assert_eq!(store.state().screen, Screen::Loading);
        assert!(store.state().mods.is_empty());
        assert!(store.state().error_report.is_none());
    }

    #[test]
    fn test_update_with_change_detection() {
        let mut store = ViewStore::new();

        let changes = store.update(|state| {
            state.loading_text = "Loading mods sources...".into();
            state.progress.visible = true;
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], ViewChange::LoadingTextChanged { .. }));
        assert!(matches!(
            changes[1],
            ViewChange::ProgressUpdated { visible: true, .. }
        ));
    }

    #[test]
    fn test_no_change_no_event() {
        let mut store = ViewStore::new();
        let changes = store.update(|_| {});
        assert!(changes.is_empty());
    }

    #[test]
    fn test_show_mods_preserves_engine_order() {
        let mut store = ViewStore::new();
        let changes = store.show_mods(vec![
            ModData::new("b", "Second"),
            ModData::new("a", "First"),
        ]);

        assert!(changes.contains(&ViewChange::ScreenChanged {
            screen: Screen::Mods
        }));
        assert!(changes.contains(&ViewChange::ModsChanged { count: 2 }));

        let keys: Vec<_> = store.state().mods.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_set_installed_emits_mod_updated() {
        let mut store = ViewStore::new();
        store.show_mods(vec![ModData::new("h1", "Cat")]);
        let mut rx = store.subscribe();

        assert!(store.set_installed("h1", true));

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            ViewChange::ModUpdated {
                mod_hash: "h1".into(),
                installed: true
            }
        );
        assert!(store.state().is_installed("h1"));
    }

    #[test]
    fn test_set_installed_unknown_mod() {
        let mut store = ViewStore::new();
        assert!(!store.set_installed("missing", true));
    }

    #[test]
    fn test_show_error_hides_other_dialogs() {
        let mut store = ViewStore::new();
        store.update(|state| {
            state.progress.show("Installing mod 'Cat'...", "");
            state.conflict_prompt = Some(ConflictPrompt {
                mod_hash: "h1".into(),
                title: "Conflict mods!".into(),
                content: "Mods:".into(),
            });
        });

        let changes = store.show_error(ErrorReport::new("Errors:", "x\n"));

        assert!(changes.iter().any(|c| matches!(c, ViewChange::ConflictResolved)));
        assert!(changes.iter().any(|c| matches!(c, ViewChange::ErrorReported { .. })));
        assert!(!store.state().progress.visible);
        assert!(store.state().conflict_prompt.is_none());
    }

    #[test]
    fn test_multiple_subscribers() {
        let mut store = ViewStore::new();
        let mut rx1 = store.subscribe();
        let mut rx2 = store.subscribe();

        store.show_loading("Installing base mod...");

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
