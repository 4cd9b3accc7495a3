use crate::models::{CatalogConfig, ScannerSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Prefix for environment overrides, e.g. `CALARIESCAN__DEBUG_MODE=true`
/// or `CALARIESCAN__SCREENS__FOOD_SCANNER__PROGRESS_STEP=10`.
pub const ENV_PREFIX: &str = "CALARIESCAN";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two files inside the data directory:
/// - Settings (`Scanner Settings.yaml`): clock profiles per screen, logging options
/// - Catalog (`Result Catalog.yaml`): fixture payloads served at scan completion
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    catalog_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "calARieScan Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("Scanner Settings.yaml"),
            catalog_path: config_dir.join("Result Catalog.yaml"),
            config_dir,
        })
    }

    /// Load scanner settings.
    ///
    /// Layers, lowest priority first: built-in defaults, the settings file
    /// (optional), then `CALARIESCAN__*` environment variables. The merged
    /// result is validated before it is returned.
    pub fn load_settings(&self) -> Result<ScannerSettings> {
        self.load_settings_with_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_settings_with_env(&self, environment: Environment) -> Result<ScannerSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let defaults = serde_yaml_ng::to_string(&ScannerSettings::default())
            .context("Failed to serialize default settings")?;

        let settings: ScannerSettings = Config::builder()
            .add_source(File::from_str(&defaults, FileFormat::Yaml))
            .add_source(File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", self.settings_path))?;

        tracing::info!("Loaded scanner settings (debug={})", settings.debug_mode);
        Ok(settings)
    }

    /// Save scanner settings.
    pub fn save_settings(&self, settings: &ScannerSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved scanner settings to {}", self.settings_path);
        Ok(())
    }

    /// Load the result catalog fixtures.
    ///
    /// # Returns
    /// The loaded CatalogConfig, or the built-in samples if the file doesn't exist
    pub fn load_catalog(&self) -> Result<CatalogConfig> {
        if !self.catalog_path.exists() {
            tracing::warn!(
                "Catalog file not found at {}, using built-in samples",
                self.catalog_path
            );
            return Ok(CatalogConfig::default());
        }

        let file_contents = fs::read_to_string(&self.catalog_path)
            .with_context(|| format!("Failed to read catalog: {}", self.catalog_path))?;

        let catalog: CatalogConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse catalog: {}", self.catalog_path))?;

        tracing::info!(
            "Loaded {} catalog fixtures from {}",
            catalog.fixtures.len(),
            self.catalog_path
        );
        Ok(catalog)
    }

    /// Save the result catalog fixtures.
    pub fn save_catalog(&self, catalog: &CatalogConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(catalog).context("Failed to serialize catalog to YAML")?;

        fs::write(&self.catalog_path, yaml_string)
            .with_context(|| format!("Failed to write catalog: {}", self.catalog_path))?;

        tracing::info!("Saved catalog to {}", self.catalog_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    pub fn catalog_path(&self) -> &Utf8Path {
        &self.catalog_path
    }
}
