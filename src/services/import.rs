//! File and link imports.
//!
//! [`ImportCoordinator`] owns one [`DeferredQueue`] per input stream. Each
//! wake drains its queue completely, one item at a time, and asks the engine
//! to reload after every item that completed.

use crate::metrics::Metrics;
use crate::models::{ErrorReport, LoaderConfig};
use crate::services::archive::{ArchiveError, ArchivePipeline, Downloader};
use crate::services::deferred_queue::{DeferredQueue, WakeError};
use crate::services::destination;
use crate::services::engine::Engine;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs::File;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Progress events raised while an import runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportProgress {
    DownloadStarted { url: String },
    Downloading { percent: u8 },
    Extracting { entry: String },
    Finished,
}

/// Receives import progress and failures. Called from the import worker,
/// so implementations forward to the consumer context instead of touching
/// view state directly.
pub trait ImportObserver: Send + Sync {
    fn progress(&self, progress: ImportProgress);
    fn failed(&self, report: ErrorReport);
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("path has no file name: {0}")]
    NoFileName(Utf8PathBuf),

    #[error("failed to copy {from} to {to}")]
    Copy {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl ImportError {
    /// Dialog shown for a failed import item
    pub fn to_report(&self) -> ErrorReport {
        match self {
            ImportError::Archive(e) => e.to_report(),
            other => ErrorReport::new("Import error:", error_chain(other)),
        }
    }
}

/// Render an error and all of its sources, one per line
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// The three fields carried by a one-click install link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLink {
    pub tag: String,
    pub mod_id: String,
    pub download_id: String,
}

/// Parses `<scheme>:[//]tag,mod_id,download_id[/]` links
pub struct LinkParser {
    scheme_pattern: Regex,
}

impl LinkParser {
    pub fn new() -> Self {
        Self {
            scheme_pattern: Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("Invalid scheme regex"),
        }
    }

    /// Check whether `input` starts with `scheme:` (case-insensitive)
    pub fn has_scheme(&self, input: &str, scheme: &str) -> bool {
        self.scheme_pattern
            .find(input)
            .is_some_and(|m| m.as_str()[..m.len() - 1].eq_ignore_ascii_case(scheme))
    }

    /// Extract the link fields. Returns `None` unless exactly three
    /// comma-separated fields follow the scheme.
    pub fn parse(&self, url: &str) -> Option<ImportLink> {
        let (_, rest) = url.split_once(':')?;
        let fields: Vec<&str> = rest.trim_matches('/').split(',').collect();

        match fields.as_slice() {
            [tag, mod_id, download_id] => Some(ImportLink {
                tag: tag.to_string(),
                mod_id: mod_id.to_string(),
                download_id: download_id.to_string(),
            }),
            _ => None,
        }
    }
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `path` into `mods_dir` under a free name.
///
/// Returns `Ok(None)` when the file already lives inside the mods directory.
pub fn process_file(mods_dir: &Utf8Path, path: &Utf8Path) -> Result<Option<Utf8PathBuf>, ImportError> {
    if is_inside(mods_dir, path) {
        tracing::debug!("Skipping import of {}, already in mods directory", path);
        return Ok(None);
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| ImportError::NoFileName(path.to_path_buf()))?;

    let copy_error = |to: Utf8PathBuf, source: io::Error| ImportError::Copy {
        from: path.to_path_buf(),
        to,
        source,
    };

    let mut source = File::open(path).map_err(|e| copy_error(mods_dir.join(file_name), e))?;
    let dest = destination::write_unique(mods_dir, file_name, &mut source)
        .map_err(|e| copy_error(mods_dir.join(file_name), e))?;

    tracing::info!("Imported {} as {}", path, dest);
    Ok(Some(dest))
}

fn is_inside(dir: &Utf8Path, path: &Utf8Path) -> bool {
    match (dir.canonicalize_utf8(), path.canonicalize_utf8()) {
        (Ok(dir), Ok(path)) => path.starts_with(dir),
        _ => path.starts_with(dir),
    }
}

/// Producer-side handle: cheap to clone, safe to use from any thread
#[derive(Clone)]
pub struct ImportSubmitter {
    files: DeferredQueue<Utf8PathBuf>,
    links: DeferredQueue<String>,
}

impl ImportSubmitter {
    pub fn submit_file(&self, path: impl Into<Utf8PathBuf>) {
        self.files.push(path.into());
    }

    pub fn submit_url(&self, url: impl Into<String>) {
        self.links.push(url.into());
    }

    /// Whether a file or link drain is running right now
    pub fn is_busy(&self) -> bool {
        self.files.is_draining() || self.links.is_draining()
    }
}

pub struct ImportCoordinator {
    files: DeferredQueue<Utf8PathBuf>,
    links: DeferredQueue<String>,
    config: LoaderConfig,
    parser: LinkParser,
    pipeline: ArchivePipeline,
    engine: Arc<dyn Engine>,
    observer: Arc<dyn ImportObserver>,
    metrics: Arc<Metrics>,
}

impl ImportCoordinator {
    pub fn new(
        config: LoaderConfig,
        downloader: Box<dyn Downloader>,
        engine: Arc<dyn Engine>,
        observer: Arc<dyn ImportObserver>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let retry = config.wake_retry();
        let pipeline = ArchivePipeline::new(
            config.mods_path.clone(),
            config.scratch_path(),
            config.mod_extension.clone(),
            downloader,
        )
        .with_rar_tool(config.rar_tool.clone());

        Self {
            files: DeferredQueue::with_metrics("file-import", retry, Arc::clone(&metrics)),
            links: DeferredQueue::with_metrics("link-import", retry, Arc::clone(&metrics)),
            config,
            parser: LinkParser::new(),
            pipeline,
            engine,
            observer,
            metrics,
        }
    }

    pub fn submit_file(&self, path: impl Into<Utf8PathBuf>) {
        self.files.push(path.into());
    }

    pub fn submit_url(&self, url: impl Into<String>) {
        self.links.push(url.into());
    }

    pub fn submitter(&self) -> ImportSubmitter {
        ImportSubmitter {
            files: self.files.clone(),
            links: self.links.clone(),
        }
    }

    /// Install the consumer wake callbacks for both queues
    pub fn register_wakes<F, G>(&self, wake_files: F, wake_links: G)
    where
        F: Fn() -> Result<(), WakeError> + Send + Sync + 'static,
        G: Fn() -> Result<(), WakeError> + Send + Sync + 'static,
    {
        self.files.register_wake(wake_files);
        self.links.register_wake(wake_links);
    }

    /// Process every queued file. Returns the number of items taken off the
    /// queue, or 0 when another drain is already running.
    pub fn drain_files(&self) -> usize {
        let Some(drain) = self.files.drain() else {
            return 0;
        };

        let mut taken = 0;
        for path in drain {
            taken += 1;
            match process_file(self.config.mods_dir(), &path) {
                Ok(Some(_)) => {
                    self.metrics.record_file_imported();
                    self.reload();
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("File import of {} failed: {}", path, e);
                    self.metrics.record_import_failed();
                    self.observer.failed(e.to_report());
                }
            }
        }
        taken
    }

    /// Process every queued link, strictly one archive at a time
    pub fn drain_links(&self) -> usize {
        let Some(drain) = self.links.drain() else {
            return 0;
        };

        let mut taken = 0;
        for url in drain {
            taken += 1;
            self.process_url(&url);
        }
        taken
    }

    fn process_url(&self, url: &str) {
        let Some(link) = self.parser.parse(url) else {
            tracing::debug!("Ignoring malformed import link {}", url);
            return;
        };

        tracing::info!("Importing mod {} ({})", link.mod_id, link.tag);
        let download_url = self.config.download_url(&link.download_id);
        let observer = Arc::clone(&self.observer);

        match self
            .pipeline
            .run(&download_url, &mut |progress: ImportProgress| observer.progress(progress))
        {
            Ok(outcome) => {
                tracing::info!(
                    "Archive import finished: {} entries from {} archive",
                    outcome.extracted.len(),
                    outcome.format.as_str()
                );
                self.metrics.record_archive_imported();
                self.reload();
            }
            Err(e) => {
                let error = ImportError::from(e);
                tracing::error!("Archive import from {} failed: {}", download_url, error);
                self.metrics.record_import_failed();
                self.observer.failed(error.to_report());
            }
        }
    }

    fn reload(&self) {
        let result = self
            .engine
            .reload_mods()
            .and_then(|()| self.engine.get_mods_data());
        if let Err(e) = result {
            tracing::warn!("Failed to request mod reload: {}", e);
        }
    }

    /// Stop pending wake retries on both queues
    pub fn close(&self) {
        self.files.close();
        self.links.close();
    }
}
