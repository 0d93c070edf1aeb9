use crate::models::LoaderConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "bmodloader.yaml";

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "BMODLOADER";

/// Configuration manager for loading and saving the loader configuration.
///
/// Values are layered with the `config` crate, later layers winning:
/// - Built-in defaults ([`LoaderConfig::default`])
/// - `bmodloader.yaml` in the config directory (optional)
/// - `BMODLOADER_*` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created when it does not exist yet.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration from defaults, file and process environment
    pub fn load(&self) -> Result<LoaderConfig> {
        self.load_with_env(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load the configuration using `env` as the environment layer
    pub fn load_with_env(&self, env: Environment) -> Result<LoaderConfig> {
        if !self.config_path.exists() {
            tracing::info!("Config file not found at {}, using defaults", self.config_path);
        }

        let defaults = Config::try_from(&LoaderConfig::default())
            .context("Failed to build default configuration")?;

        let config: LoaderConfig = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(self.config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!(
            "Loaded config: mods_path={}, extension={}, scheme={}",
            config.mods_path,
            config.mod_extension,
            config.link_scheme
        );
        Ok(config)
    }

    /// Save the configuration file.
    pub fn save(&self, config: &LoaderConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
