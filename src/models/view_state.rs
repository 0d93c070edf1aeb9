use super::ModData;
use indexmap::IndexMap;

/// Which top-level screen the presentation layer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Loading,
    Mods,
}

/// Progress dialog projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressView {
    pub visible: bool,
    pub title: String,
    pub content: String,
    pub value: u32,
    pub maximum: u32,
}

impl ProgressView {
    /// Advance by one step, never past the maximum when one is set
    pub fn add_value(&mut self) {
        self.value = self.value.saturating_add(1);
        if self.maximum > 0 {
            self.value = self.value.min(self.maximum);
        }
    }

    pub fn show(&mut self, title: impl Into<String>, content: impl Into<String>) {
        self.title = title.into();
        self.content = content.into();
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

/// A conflict waiting for an explicit accept or cancel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPrompt {
    pub mod_hash: String,
    pub title: String,
    pub content: String,
}

/// A user-facing error dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub title: String,
    pub content: String,

    /// Dismissing the dialog ends the process
    pub terminate: bool,
}

impl ErrorReport {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            terminate: false,
        }
    }

    pub fn fatal(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            terminate: true,
            ..Self::new(title, content)
        }
    }

    /// Text placed on the clipboard by the "Copy error" action
    pub fn clipboard_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }
}

/// UI-facing projection of everything the engine has told the loader.
///
/// Owned by [`crate::state::ViewStore`] and only mutated from the single
/// consumer context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub screen: Screen,
    pub loading_text: String,

    /// Mods keyed by hash, in the order the engine reported them
    pub mods: IndexMap<String, ModData>,

    pub progress: ProgressView,
    pub conflict_prompt: Option<ConflictPrompt>,
    pub error_report: Option<ErrorReport>,
}

impl ViewState {
    /// Display name for a mod, or the hash itself when the mod is not listed
    pub fn mod_name(&self, mod_hash: &str) -> String {
        self.mods
            .get(mod_hash)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| mod_hash.to_string())
    }

    pub fn is_installed(&self, mod_hash: &str) -> bool {
        self.mods.get(mod_hash).is_some_and(|m| m.installed)
    }
}
