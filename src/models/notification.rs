use super::ModData;

/// One discrete event pushed by the mod engine.
///
/// Each kind carries its own payload shape. `Unknown` keeps events from newer
/// engine versions routable without a crash.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    // Loader
    LoadingMod { path: Option<String> },
    LoadingModIsEmpty { mod_hash: String, name: String },
    ModElementsCount { mod_hash: String, count: u32 },

    // Conflict search
    ConflictSearchInSwf { mod_hash: String, swf: String },
    ConflictNotFound { mod_hash: String },
    Conflict { mod_hash: String, conflicts: Vec<String> },

    // Installer
    InstallingModSwf { mod_hash: String, swf: String },
    InstallingModSwfSprite { mod_hash: String, sprite: String },
    InstallingModSwfSound { mod_hash: String, sound: String },
    InstallingModFile { mod_hash: String, file: String },
    InstallingModFileCache { mod_hash: String, file: String },
    InstallingModFinished { mod_hash: String },
    InstallingModNotFoundFileElement { mod_hash: String, element: String },
    InstallingModNotFoundGameSwf { mod_hash: String, swf: String },
    InstallingModSwfScriptError { mod_hash: String, script: String },
    InstallingModSwfSoundSymbolclassNotExist { mod_hash: String, sound: String, swf: String },
    InstallingModSoundNotExist { mod_hash: String, sound: String, id: String, swf: String },
    InstallingModSwfSpriteSymbolclassNotExist { mod_hash: String, sprite: String, swf: String },
    InstallingModSpriteNotExist { mod_hash: String, sprite: String, id: String },

    // Uninstaller
    UninstallingModSwf { mod_hash: String, swf: String },
    UninstallingModSwfSprite { mod_hash: String, sprite: String },
    UninstallingModSwfSound { mod_hash: String, sound: String },
    UninstallingModFile { mod_hash: String, file: String },
    UninstallingModFinished { mod_hash: String },
    UninstallingModSwfOriginalElementNotFound { mod_hash: String, element: String, swf: String },
    UninstallingModSwfElementNotFound { mod_hash: String, element: String, swf: String },

    // Compiler
    CompileModSourcesSpriteHasNoSymbolclass { mod_hash: String, detail: String },
    CompileModSourcesSpriteEmpty { mod_hash: String, detail: String },
    CompileModSourcesSpriteNotFoundInFolder { mod_hash: String, detail: String },
    CompileModSourcesUnsupportedCategory { mod_hash: String, detail: String },
    CompileModSourcesUnknownFile { mod_hash: String, detail: String },
    CompileModSourcesSaveError { mod_hash: String, detail: String },

    Unknown { kind: String, args: Vec<String> },
}

impl Notification {
    /// Stable kind name, used for logging and fallback report lines
    pub fn kind_name(&self) -> &str {
        use Notification::*;
        match self {
            LoadingMod { .. } => "LoadingMod",
            LoadingModIsEmpty { .. } => "LoadingModIsEmpty",
            ModElementsCount { .. } => "ModElementsCount",
            ConflictSearchInSwf { .. } => "ModConflictSearchInSwf",
            ConflictNotFound { .. } => "ModConflictNotFound",
            Conflict { .. } => "ModConflict",
            InstallingModSwf { .. } => "InstallingModSwf",
            InstallingModSwfSprite { .. } => "InstallingModSwfSprite",
            InstallingModSwfSound { .. } => "InstallingModSwfSound",
            InstallingModFile { .. } => "InstallingModFile",
            InstallingModFileCache { .. } => "InstallingModFileCache",
            InstallingModFinished { .. } => "InstallingModFinished",
            InstallingModNotFoundFileElement { .. } => "InstallingModNotFoundFileElement",
            InstallingModNotFoundGameSwf { .. } => "InstallingModNotFoundGameSwf",
            InstallingModSwfScriptError { .. } => "InstallingModSwfScriptError",
            InstallingModSwfSoundSymbolclassNotExist { .. } => {
                "InstallingModSwfSoundSymbolclassNotExist"
            }
            InstallingModSoundNotExist { .. } => "InstallingModSoundNotExist",
            InstallingModSwfSpriteSymbolclassNotExist { .. } => {
                "InstallingModSwfSpriteSymbolclassNotExist"
            }
            InstallingModSpriteNotExist { .. } => "InstallingModSpriteNotExist",
            UninstallingModSwf { .. } => "UninstallingModSwf",
            UninstallingModSwfSprite { .. } => "UninstallingModSwfSprite",
            UninstallingModSwfSound { .. } => "UninstallingModSwfSound",
            UninstallingModFile { .. } => "UninstallingModFile",
            UninstallingModFinished { .. } => "UninstallingModFinished",
            UninstallingModSwfOriginalElementNotFound { .. } => {
                "UninstallingModSwfOriginalElementNotFound"
            }
            UninstallingModSwfElementNotFound { .. } => "UninstallingModSwfElementNotFound",
            CompileModSourcesSpriteHasNoSymbolclass { .. } => {
                "CompileModSourcesSpriteHasNoSymbolclass"
            }
            CompileModSourcesSpriteEmpty { .. } => "CompileModSourcesSpriteEmpty",
            CompileModSourcesSpriteNotFoundInFolder { .. } => {
                "CompileModSourcesSpriteNotFoundInFolder"
            }
            CompileModSourcesUnsupportedCategory { .. } => "CompileModSourcesUnsupportedCategory",
            CompileModSourcesUnknownFile { .. } => "CompileModSourcesUnknownFile",
            CompileModSourcesSaveError { .. } => "CompileModSourcesSaveError",
            Unknown { kind, .. } => kind,
        }
    }

    /// Structural problems that are buffered and reported as one batch
    /// once the current operation reaches a checkpoint.
    pub fn is_soft_error(&self) -> bool {
        use Notification::*;
        matches!(
            self,
            CompileModSourcesSpriteHasNoSymbolclass { .. }
                | CompileModSourcesSpriteEmpty { .. }
                | CompileModSourcesSpriteNotFoundInFolder { .. }
                | CompileModSourcesUnsupportedCategory { .. }
                | CompileModSourcesUnknownFile { .. }
                | CompileModSourcesSaveError { .. }
                | LoadingModIsEmpty { .. }
                | InstallingModNotFoundFileElement { .. }
                | InstallingModNotFoundGameSwf { .. }
                | InstallingModSwfScriptError { .. }
                | InstallingModSwfSoundSymbolclassNotExist { .. }
                | InstallingModSoundNotExist { .. }
                | InstallingModSwfSpriteSymbolclassNotExist { .. }
                | InstallingModSpriteNotExist { .. }
                | UninstallingModSwfOriginalElementNotFound { .. }
                | UninstallingModSwfElementNotFound { .. }
        )
    }
}

/// Everything the engine can push through the notification channel: either a
/// [`Notification`] or the acknowledgement of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Notification(Notification),

    /// `reloadMods` was processed; the previous mod list is stale
    ModsReloaded,

    /// Reply to `getModsData`
    ModsData(Vec<ModData>),

    /// Reply to `getModConflict`; `searching` is false when the mod is unknown
    ConflictCheck { searching: bool, mod_hash: String },

    InstallStarted { installing: bool, mod_hash: String },

    UninstallStarted { uninstalling: bool, mod_hash: String },

    BaseModInstalling { label: String },

    ModDeleted { mod_hash: String },

    ModsPathSet { path: String },
}

impl From<Notification> for Envelope {
    fn from(notification: Notification) -> Self {
        Envelope::Notification(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_error_classification() {
        let soft = Notification::InstallingModNotFoundGameSwf {
            mod_hash: "h".into(),
            swf: "Game.swf".into(),
        };
        let progress = Notification::InstallingModFile {
            mod_hash: "h".into(),
            file: "a.png".into(),
        };
        let unknown = Notification::Unknown {
            kind: "FutureKind".into(),
            args: vec![],
        };

        assert!(soft.is_soft_error());
        assert!(!progress.is_soft_error());
        assert!(!unknown.is_soft_error());
    }

    #[test]
    fn test_unknown_kind_name_passthrough() {
        let unknown = Notification::Unknown {
            kind: "FutureKind".into(),
            args: vec!["x".into()],
        };
        assert_eq!(unknown.kind_name(), "FutureKind");
    }
}
