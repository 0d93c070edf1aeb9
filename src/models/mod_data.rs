use serde::{Deserialize, Serialize};

/// Snapshot of one mod as reported by the engine's mods-data reply.
///
/// The engine owns the authoritative record; the loader only keeps this copy
/// for display and flips `installed` when an install/uninstall finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModData {
    pub game_version: String,
    pub name: String,
    pub author: String,
    pub version: String,
    pub description: String,
    pub tags: Vec<String>,
    pub previews_paths: Vec<String>,
    pub hash: String,
    pub platform: String,
    pub installed: bool,
    pub current_version: bool,
    pub mod_file_exist: bool,
}

impl ModData {
    /// Minimal record, used by the catalog engine and tests
    pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            mod_file_exist: true,
            ..Self::default()
        }
    }
}
