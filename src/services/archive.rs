//! Download-and-unpack pipeline for one-click mod links.
//!
//! Each run downloads to a single scratch file in the mods directory,
//! identifies the container by its leading bytes, copies every entry that
//! carries the mod extension into the mods directory and removes the scratch
//! file again on every exit path.

use crate::models::{ErrorReport, is_mod_file};
use crate::services::destination;
use crate::services::import::ImportProgress;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("bmodloader/", env!("CARGO_PKG_VERSION"));

/// Leading bytes read when identifying the scratch file
const SNIFF_LEN: usize = 3;

/// Default external decompressor for RAR containers
pub const DEFAULT_RAR_TOOL: &str = "unrar";

/// Container formats recognised by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    SevenZip,
    Rar,
    Zip,
    Unknown,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Unknown => "unknown",
        }
    }
}

/// Identify a container from its first bytes.
pub fn sniff_format(header: &[u8]) -> ArchiveFormat {
    if header.starts_with(b"7z") {
        ArchiveFormat::SevenZip
    } else if header.starts_with(b"Rar") {
        ArchiveFormat::Rar
    } else if header.starts_with(b"PK") {
        ArchiveFormat::Zip
    } else {
        ArchiveFormat::Unknown
    }
}

/// Identify the container stored at `path`
pub fn sniff_file(path: &Utf8Path) -> io::Result<ArchiveFormat> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(sniff_format(&header))
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// The external decompressor for this format is not installed
    #[error("{0} executable not found")]
    DecompressorMissing(String),

    #[error("zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("7z archive: {0}")]
    SevenZip(#[from] sevenz_rust::Error),

    #[error("rar archive: {0}")]
    Rar(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Dialog shown when a link import fails
    pub fn to_report(&self) -> ErrorReport {
        match self {
            ArchiveError::DecompressorMissing(tool) => {
                ErrorReport::new("Unpack error:", format!("WinRar '{tool}' not found"))
            }
            other => ErrorReport::new("Unpack error:", crate::services::import::error_chain(other)),
        }
    }
}

/// Fetches a URL into a local file
pub trait Downloader: Send + Sync {
    /// Write the body of `url` to `dest`, reporting whole percents when the
    /// size is known.
    fn download(
        &self,
        url: &str,
        dest: &Utf8Path,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(), ArchiveError>;
}

/// Blocking HTTP downloader
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(60))
            .build();
        Self { agent }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        url: &str,
        dest: &Utf8Path,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(), ArchiveError> {
        let response = self
            .agent
            .get(url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| ArchiveError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let total = response
            .header("Content-Length")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|&len| len > 0);

        let mut reader = response.into_reader();
        let mut file = File::create(dest)?;
        copy_with_progress(&mut reader, &mut file, total, progress)?;
        file.sync_all()?;
        Ok(())
    }
}

fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    total: Option<u64>,
    progress: &mut dyn FnMut(u8),
) -> io::Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;
    let mut last_percent = None;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;

        if let Some(total) = total {
            let percent = (written.saturating_mul(100) / total).min(100) as u8;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                progress(percent);
            }
        }
    }

    Ok(written)
}

/// Result of one successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub format: ArchiveFormat,
    pub extracted: Vec<Utf8PathBuf>,
}

/// Removes the scratch file however the run ends
struct ScratchGuard {
    path: Utf8PathBuf,
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch file {}: {}", self.path, e),
        }
    }
}

/// Removes a staging directory however the run ends
struct StagingGuard {
    path: Utf8PathBuf,
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub struct ArchivePipeline {
    mods_dir: Utf8PathBuf,
    scratch_path: Utf8PathBuf,
    extension: String,
    rar_tool: String,
    downloader: Box<dyn Downloader>,
}

impl ArchivePipeline {
    pub fn new(
        mods_dir: impl Into<Utf8PathBuf>,
        scratch_path: impl Into<Utf8PathBuf>,
        extension: impl Into<String>,
        downloader: Box<dyn Downloader>,
    ) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            scratch_path: scratch_path.into(),
            extension: extension.into(),
            rar_tool: DEFAULT_RAR_TOOL.to_string(),
            downloader,
        }
    }

    /// Use `tool` instead of `unrar` for RAR containers
    pub fn with_rar_tool(mut self, tool: impl Into<String>) -> Self {
        self.rar_tool = tool.into();
        self
    }

    pub fn scratch_path(&self) -> &Utf8Path {
        &self.scratch_path
    }

    fn is_mod_entry(&self, name: &str) -> bool {
        entry_file_name(name).is_some_and(|file| is_mod_file(file, &self.extension))
    }

    /// Download `url`, unpack matching entries and clean up.
    ///
    /// An unrecognised container is not an error: nothing is extracted and
    /// the caller still reloads the mod list.
    pub fn run(
        &self,
        url: &str,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let _scratch = ScratchGuard {
            path: self.scratch_path.clone(),
        };

        tracing::info!("Downloading {} to {}", url, self.scratch_path);
        progress(ImportProgress::DownloadStarted {
            url: url.to_string(),
        });
        self.downloader
            .download(url, &self.scratch_path, &mut |percent: u8| {
                progress(ImportProgress::Downloading { percent })
            })?;

        let format = sniff_file(&self.scratch_path)?;
        tracing::info!("Downloaded archive identified as {}", format.as_str());

        let extracted = match format {
            ArchiveFormat::Zip => self.extract_zip(progress)?,
            ArchiveFormat::SevenZip => self.extract_7z(progress)?,
            ArchiveFormat::Rar => self.extract_rar(progress)?,
            ArchiveFormat::Unknown => {
                tracing::warn!("Unrecognised archive from {}, nothing extracted", url);
                Vec::new()
            }
        };

        progress(ImportProgress::Finished);
        Ok(ArchiveOutcome { format, extracted })
    }

    fn extract_zip(
        &self,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<Vec<Utf8PathBuf>, ArchiveError> {
        let file = File::open(&self.scratch_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut extracted = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if !self.is_mod_entry(&name) {
                continue;
            }
            let Some(file_name) = entry_file_name(&name) else {
                continue;
            };

            progress(ImportProgress::Extracting {
                entry: name.clone(),
            });
            let path = destination::write_unique(&self.mods_dir, file_name, &mut entry)?;
            tracing::info!("Extracted {} to {}", name, path);
            extracted.push(path);
        }

        Ok(extracted)
    }

    fn extract_7z(
        &self,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<Vec<Utf8PathBuf>, ArchiveError> {
        let mut reader =
            sevenz_rust::SevenZReader::open(&self.scratch_path, sevenz_rust::Password::empty())?;
        let mut extracted = Vec::new();

        reader.for_each_entries(|entry, data| {
            let name = entry.name().to_string();
            let wanted = !entry.is_directory() && self.is_mod_entry(&name);

            match entry_file_name(&name).filter(|_| wanted) {
                Some(file_name) => {
                    progress(ImportProgress::Extracting {
                        entry: name.clone(),
                    });
                    let path = destination::write_unique(&self.mods_dir, file_name, data)?;
                    tracing::info!("Extracted {} to {}", name, path);
                    extracted.push(path);
                }
                None => {
                    io::copy(data, &mut io::sink())?;
                }
            }
            Ok(true)
        })?;

        Ok(extracted)
    }

    fn extract_rar(
        &self,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<Vec<Utf8PathBuf>, ArchiveError> {
        let staging = Utf8PathBuf::from(format!("{}.d", self.scratch_path));
        let _ = fs::remove_dir_all(&staging);
        fs::create_dir_all(&staging)?;
        let _guard = StagingGuard {
            path: staging.clone(),
        };

        let pattern = format!("*.{}", self.extension);
        let output = Command::new(&self.rar_tool)
            .arg("e")
            .arg("-y")
            .arg("-o+")
            .arg(self.scratch_path.as_str())
            .arg(&pattern)
            .arg(format!("{staging}/"))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::DecompressorMissing(self.rar_tool.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        // unrar exits with 10 when no file matched the mask
        if !output.status.success() && output.status.code() != Some(10) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::Rar(stderr.trim().to_string()));
        }

        let mut names: Vec<String> = fs::read_dir(&staging)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.is_mod_entry(name))
            .collect();
        names.sort();

        let mut extracted = Vec::new();
        for name in names {
            progress(ImportProgress::Extracting {
                entry: name.clone(),
            });
            let mut file = File::open(staging.join(&name))?;
            let path = destination::write_unique(&self.mods_dir, &name, &mut file)?;
            tracing::info!("Extracted {} to {}", name, path);
            extracted.push(path);
        }

        Ok(extracted)
    }
}

/// Final path component of an archive entry name, with either separator
fn entry_file_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|file| !file.is_empty() && *file != "." && *file != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(b"7z\xBC\xAF\x27\x1C"), ArchiveFormat::SevenZip);
        assert_eq!(sniff_format(b"Rar!\x1A\x07"), ArchiveFormat::Rar);
        assert_eq!(sniff_format(b"PK\x03\x04"), ArchiveFormat::Zip);
        assert_eq!(sniff_format(b"<html>"), ArchiveFormat::Unknown);
        assert_eq!(sniff_format(b""), ArchiveFormat::Unknown);
        assert_eq!(sniff_format(b"7"), ArchiveFormat::Unknown);
    }

    #[test]
    fn test_entry_file_name() {
        assert_eq!(entry_file_name("a.bmod"), Some("a.bmod"));
        assert_eq!(entry_file_name("dir/sub/a.bmod"), Some("a.bmod"));
        assert_eq!(entry_file_name("dir\\a.bmod"), Some("a.bmod"));
        assert_eq!(entry_file_name("dir/"), None);
        assert_eq!(entry_file_name("dir/.."), None);
    }

    #[test]
    fn test_copy_with_progress_reports_percent() {
        let data = vec![7u8; 200 * 1024];
        let mut out = Vec::new();
        let mut seen = Vec::new();

        let written = copy_with_progress(
            &mut &data[..],
            &mut out,
            Some(data.len() as u64),
            &mut |p: u8| seen.push(p),
        )
        .unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(out.len(), data.len());
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_missing_decompressor_report() {
        let report = ArchiveError::DecompressorMissing("unrar".to_string()).to_report();
        assert_eq!(report.title, "Unpack error:");
        assert_eq!(report.content, "WinRar 'unrar' not found");
        assert!(!report.terminate);
    }
}
