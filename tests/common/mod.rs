//! Helpers shared by the integration tests

#![allow(dead_code)]

use bmodloader::services::EngineError;
use bmodloader::{Engine, ErrorReport};
use bmodloader::services::{ImportObserver, ImportProgress};
use std::sync::Mutex;

/// Engine that records every command it receives as a short string
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<String>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Engine for RecordingEngine {
    fn reload_mods(&self) -> Result<(), EngineError> {
        self.record("reload_mods".to_string())
    }

    fn get_mods_data(&self) -> Result<(), EngineError> {
        self.record("get_mods_data".to_string())
    }

    fn install_base_mod(&self, label: &str) -> Result<(), EngineError> {
        self.record(format!("install_base_mod {label}"))
    }

    fn get_mod_conflict(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.record(format!("get_mod_conflict {mod_hash}"))
    }

    fn install_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.record(format!("install_mod {mod_hash}"))
    }

    fn uninstall_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.record(format!("uninstall_mod {mod_hash}"))
    }

    fn delete_mod(&self, mod_hash: &str) -> Result<(), EngineError> {
        self.record(format!("delete_mod {mod_hash}"))
    }

    fn set_mods_path(&self, path: &str) -> Result<(), EngineError> {
        self.record(format!("set_mods_path {path}"))
    }
}

/// Import observer that keeps everything it is told
#[derive(Default)]
pub struct RecordingObserver {
    pub progress: Mutex<Vec<ImportProgress>>,
    pub failures: Mutex<Vec<ErrorReport>>,
}

impl ImportObserver for RecordingObserver {
    fn progress(&self, progress: ImportProgress) {
        self.progress.lock().unwrap().push(progress);
    }

    fn failed(&self, report: ErrorReport) {
        self.failures.lock().unwrap().push(report);
    }
}
