// Catalog engine backend
//
// A minimal stand-in for the real mod engine so the headless binary can run
// end to end. It lists mod files in the mods directory and acknowledges
// install/uninstall requests without touching game files.

use super::{EngineBackend, EngineCommand, EngineError};
use crate::models::{Envelope, ModData, Notification, is_mod_file};
use crate::ui::bridge::NotificationSender;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// Directory-listing engine: one mod per file, keyed by file name
pub struct CatalogBackend {
    mods_path: Utf8PathBuf,
    extension: String,
    mods: IndexMap<String, ModData>,
}

impl CatalogBackend {
    pub fn new(mods_path: impl Into<Utf8PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            mods_path: mods_path.into(),
            extension: extension.into(),
            mods: IndexMap::new(),
        }
    }

    fn scan(&mut self, out: &NotificationSender) {
        let previous = std::mem::take(&mut self.mods);

        let entries = match fs::read_dir(&self.mods_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read mods directory {}: {}", self.mods_path, e);
                return;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_mod_file(name, &self.extension))
            .collect();
        names.sort();

        for name in names {
            let path = self.mods_path.join(&name);
            push(
                out,
                Notification::LoadingMod {
                    path: Some(path.to_string()),
                },
            );

            let stem = Utf8Path::new(&name).file_stem().unwrap_or(&name).to_string();
            let mut data = ModData::new(name.clone(), stem);
            data.installed = previous.get(&name).is_some_and(|m| m.installed);
            data.current_version = true;
            self.mods.insert(name, data);
        }
    }

    fn install(&mut self, mod_hash: String, out: &NotificationSender) {
        let known = self.mods.contains_key(&mod_hash);
        push(
            out,
            Envelope::InstallStarted {
                installing: known,
                mod_hash: mod_hash.clone(),
            },
        );
        if !known {
            return;
        }

        push(
            out,
            Notification::ModElementsCount {
                mod_hash: mod_hash.clone(),
                count: 1,
            },
        );
        push(
            out,
            Notification::InstallingModFile {
                mod_hash: mod_hash.clone(),
                file: mod_hash.clone(),
            },
        );
        if let Some(entry) = self.mods.get_mut(&mod_hash) {
            entry.installed = true;
        }
        push(out, Notification::InstallingModFinished { mod_hash });
    }

    fn uninstall(&mut self, mod_hash: String, out: &NotificationSender) {
        let known = self.mods.contains_key(&mod_hash);
        push(
            out,
            Envelope::UninstallStarted {
                uninstalling: known,
                mod_hash: mod_hash.clone(),
            },
        );
        if !known {
            return;
        }

        push(
            out,
            Notification::UninstallingModFile {
                mod_hash: mod_hash.clone(),
                file: mod_hash.clone(),
            },
        );
        if let Some(entry) = self.mods.get_mut(&mod_hash) {
            entry.installed = false;
        }
        push(out, Notification::UninstallingModFinished { mod_hash });
    }
}

fn push(out: &NotificationSender, envelope: impl Into<Envelope>) {
    if out.push(envelope.into()).is_err() {
        tracing::debug!("Notification consumer gone, dropping envelope");
    }
}

impl EngineBackend for CatalogBackend {
    fn start(&mut self) -> Result<(), EngineError> {
        fs::create_dir_all(&self.mods_path).map_err(|e| {
            EngineError::RuntimeUnavailable(format!(
                "mods directory {} is not usable: {}",
                self.mods_path, e
            ))
        })
    }

    fn handle(&mut self, command: EngineCommand, out: &NotificationSender) {
        match command {
            EngineCommand::SetModsPath { path } => {
                self.mods_path = path;
                push(
                    out,
                    Envelope::ModsPathSet {
                        path: self.mods_path.to_string(),
                    },
                );
            }
            EngineCommand::ReloadMods => {
                self.scan(out);
                push(out, Envelope::ModsReloaded);
            }
            EngineCommand::GetModsData => {
                push(out, Envelope::ModsData(self.mods.values().cloned().collect()));
            }
            EngineCommand::InstallBaseMod { label } => {
                push(out, Envelope::BaseModInstalling { label });
            }
            EngineCommand::GetModConflict { mod_hash } => {
                let searching = self.mods.contains_key(&mod_hash);
                push(
                    out,
                    Envelope::ConflictCheck {
                        searching,
                        mod_hash: mod_hash.clone(),
                    },
                );
                if searching {
                    push(out, Notification::ConflictNotFound { mod_hash });
                }
            }
            EngineCommand::InstallMod { mod_hash } => self.install(mod_hash, out),
            EngineCommand::UninstallMod { mod_hash } => self.uninstall(mod_hash, out),
            EngineCommand::DeleteMod { mod_hash } => {
                if let Some(data) = self.mods.shift_remove(&mod_hash) {
                    let path = self.mods_path.join(&data.hash);
                    if let Err(e) = fs::remove_file(&path) {
                        tracing::warn!("Failed to delete mod file {}: {}", path, e);
                    }
                }
                push(out, Envelope::ModDeleted { mod_hash });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::bridge::notification_channel;
    use tempfile::TempDir;

    fn backend_with_files(names: &[&str]) -> (CatalogBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        for name in names {
            fs::write(dir.join(name), b"mod").unwrap();
        }
        (CatalogBackend::new(dir, "bmod"), temp)
    }

    #[test]
    fn test_reload_lists_only_mod_files() {
        let (mut backend, _temp) = backend_with_files(&["b.bmod", "a.bmod", "notes.txt"]);
        let (tx, mut rx) = notification_channel();

        backend.handle(EngineCommand::ReloadMods, &tx);
        backend.handle(EngineCommand::GetModsData, &tx);

        let mut envelopes = Vec::new();
        while let Some(envelope) = rx.poll() {
            envelopes.push(envelope);
        }

        assert!(matches!(
            envelopes[0],
            Envelope::Notification(Notification::LoadingMod { .. })
        ));
        assert_eq!(envelopes[2], Envelope::ModsReloaded);
        let Envelope::ModsData(mods) = &envelopes[3] else {
            panic!("expected mods data, got {:?}", envelopes[3]);
        };
        let hashes: Vec<_> = mods.iter().map(|m| m.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a.bmod", "b.bmod"]);
    }

    #[test]
    fn test_conflict_check_for_known_mod() {
        let (mut backend, _temp) = backend_with_files(&["a.bmod"]);
        let (tx, mut rx) = notification_channel();
        backend.handle(EngineCommand::ReloadMods, &tx);
        while rx.poll().is_some() {}

        backend.handle(
            EngineCommand::GetModConflict {
                mod_hash: "a.bmod".into(),
            },
            &tx,
        );

        assert_eq!(
            rx.poll(),
            Some(Envelope::ConflictCheck {
                searching: true,
                mod_hash: "a.bmod".into()
            })
        );
        assert_eq!(
            rx.poll(),
            Some(Envelope::Notification(Notification::ConflictNotFound {
                mod_hash: "a.bmod".into()
            }))
        );
    }

    #[test]
    fn test_install_unknown_mod_is_not_started() {
        let (mut backend, _temp) = backend_with_files(&[]);
        let (tx, mut rx) = notification_channel();

        backend.handle(
            EngineCommand::InstallMod {
                mod_hash: "ghost".into(),
            },
            &tx,
        );

        assert_eq!(
            rx.poll(),
            Some(Envelope::InstallStarted {
                installing: false,
                mod_hash: "ghost".into()
            })
        );
        assert_eq!(rx.poll(), None);
    }
}
