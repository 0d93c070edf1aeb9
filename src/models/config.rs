use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loader configuration from bmodloader.yaml
///
/// Every field has a default, so a missing or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Managed mods directory
    pub mods_path: Utf8PathBuf,

    /// Mod file extension without the leading dot
    pub mod_extension: String,

    /// URL scheme accepted for link imports
    pub link_scheme: String,

    /// Download URL with a `{download_id}` placeholder
    pub download_url_template: String,

    /// Scratch file name, resolved inside the mods directory
    pub scratch_file_name: String,

    /// External decompressor for RAR archives
    pub rar_tool: String,

    pub poll_interval_ms: u64,

    pub wake_retry_ms: u64,

    pub log_dir: Utf8PathBuf,

    pub debug_mode: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            mods_path: Utf8PathBuf::from("Mods"),
            mod_extension: "bmod".to_string(),
            link_scheme: "bmodloader".to_string(),
            download_url_template: "https://gamebanana.com/dl/{download_id}".to_string(),
            scratch_file_name: "_mod.archive".to_string(),
            rar_tool: "unrar".to_string(),
            poll_interval_ms: 10,
            wake_retry_ms: 100,
            log_dir: Utf8PathBuf::from("logs"),
            debug_mode: false,
        }
    }
}

/// Check whether a file name carries the mod extension.
///
/// Shared by the archive pipeline and the catalog engine so both agree on
/// what counts as a mod file.
pub fn is_mod_file(name: &str, extension: &str) -> bool {
    Utf8Path::new(name).extension() == Some(extension)
}

impl LoaderConfig {
    /// Full path of the scratch file used by archive imports
    pub fn scratch_path(&self) -> Utf8PathBuf {
        self.mods_path.join(&self.scratch_file_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn wake_retry(&self) -> Duration {
        Duration::from_millis(self.wake_retry_ms.max(1))
    }

    /// Build the download URL for a download id
    pub fn download_url(&self, download_id: &str) -> String {
        self.download_url_template
            .replace("{download_id}", download_id)
    }

    pub fn mods_dir(&self) -> &Utf8Path {
        &self.mods_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_config_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.mod_extension, "bmod");
        assert_eq!(config.rar_tool, "unrar");
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.wake_retry(), Duration::from_millis(100));
        assert_eq!(config.scratch_path(), Utf8PathBuf::from("Mods/_mod.archive"));
    }

    #[test]
    fn test_download_url_substitution() {
        let config = LoaderConfig::default();
        assert_eq!(config.download_url("456"), "https://gamebanana.com/dl/456");
    }

    #[test]
    fn test_is_mod_file() {
        assert!(is_mod_file("skins/cat.bmod", "bmod"));
        assert!(is_mod_file("cat (1).bmod", "bmod"));
        assert!(!is_mod_file("readme.txt", "bmod"));
        assert!(!is_mod_file("bmod", "bmod"));
        assert!(!is_mod_file(".bmod", "bmod"));
        assert!(!is_mod_file("cat.bmod.txt", "bmod"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: LoaderConfig = serde_yaml_ng::from_str("mods_path: Custom\n").unwrap();
        assert_eq!(config.mods_path, Utf8PathBuf::from("Custom"));
        assert_eq!(config.link_scheme, "bmodloader");
    }
}
