use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use crate::engine::EngineConfig;
use crate::package::{PackageReader, build_glob_set};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Prefix of every environment variable the tool reads.
pub const ENV_PREFIX: &str = "DOCVIEW_VALIDATE_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub files: FileConfig,
    pub output: OutputConfig,
    pub validators: ValidatorsConfig,
}

/// Run settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of files validated concurrently (default: number of CPUs)
    pub threads: Option<usize>,
    /// Stop starting new files after the first error
    pub fail_fast: bool,
    /// Show progress indicators
    pub show_progress: bool,
}

/// Which files are read and how they are classified
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Extensions of files that may be document views
    pub docview_extensions: Vec<String>,
    /// Include patterns (glob syntax, relative to jcr_root)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax, relative to jcr_root)
    pub exclude_patterns: Vec<String>,
    pub follow_symlinks: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    pub quiet: bool,
}

/// Built-in validator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorsConfig {
    /// Node path globs reported by the disallowed-paths validator
    pub disallowed_paths: Vec<String>,
    /// Enable the merge conflict marker check
    pub merge_markers: bool,
    /// Validator identifiers to leave out
    pub disabled: Vec<String>,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            docview_extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
            follow_symlinks: false,
        }
    }
}

impl Default for ValidatorsConfig {
    fn default() -> Self {
        Self {
            disallowed_paths: vec![],
            merge_markers: true,
            disabled: vec![],
        }
    }
}

impl Config {
    pub fn thread_count(&self) -> usize {
        self.validation.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_files: self.thread_count(),
            fail_fast: self.validation.fail_fast,
            docview_extensions: self
                .files
                .docview_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
        }
    }

    pub fn package_reader(&self) -> crate::error::Result<PackageReader> {
        Ok(PackageReader::new()
            .with_include_patterns(&self.files.include_patterns)?
            .with_exclude_patterns(&self.files.exclude_patterns)?
            .with_follow_symlinks(self.files.follow_symlinks))
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "docview-validate.toml",
    "docview-validate.json",
    ".docview-validate.toml",
    ".docview-validate.json",
];

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON). Missing keys take their defaults.
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a configuration file in the current directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        if let Some(found) = Self::find_config_file_in(Path::new(".")).await? {
            return Ok(Some(found));
        }

        if let Some(config_dir) = dirs::config_dir() {
            return Self::find_config_file_in(&config_dir.join("docview-validate")).await;
        }

        Ok(None)
    }

    /// Load the first of the known configuration file names present in `dir`
    pub async fn find_config_file_in(dir: &Path) -> Result<Option<Config>> {
        for name in &CONFIG_NAMES {
            let path = dir.join(name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        let var = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            env.get(&key).map(|value| (key, value))
        };

        // Validation settings
        if let Some((key, threads)) = var("THREADS") {
            config.validation.threads = Some(parse_env(&key, &threads)?);
        }
        if let Some((key, fail_fast)) = var("FAIL_FAST") {
            config.validation.fail_fast = parse_env(&key, &fail_fast)?;
        }
        if let Some((key, progress)) = var("PROGRESS") {
            config.validation.show_progress = parse_env(&key, &progress)?;
        }

        // Output settings
        if let Some((key, verbose)) = var("VERBOSE") {
            config.output.verbose = parse_env(&key, &verbose)?;
        }
        if let Some((key, quiet)) = var("QUIET") {
            config.output.quiet = parse_env(&key, &quiet)?;
        }
        if let Some((key, format)) = var("FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {} value: {}",
                        key, format
                    )));
                }
            };
        }

        // File settings
        if let Some((_, extensions)) = var("EXTENSIONS") {
            config.files.docview_extensions = split_list(&extensions);
        }
        if let Some((_, include)) = var("INCLUDE") {
            config.files.include_patterns = split_list(&include);
        }
        if let Some((_, exclude)) = var("EXCLUDE") {
            config.files.exclude_patterns = split_list(&exclude);
        }

        // Validator settings
        if let Some((_, disallowed)) = var("DISALLOWED_PATHS") {
            config.validators.disallowed_paths = split_list(&disallowed);
        }
        if let Some((key, merge_markers)) = var("MERGE_MARKERS") {
            config.validators.merge_markers = parse_env(&key, &merge_markers)?;
        }
        if let Some((_, disabled)) = var("DISABLED") {
            config.validators.disabled = split_list(&disabled);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence where given)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        if cli.fail_fast {
            config.validation.fail_fast = true;
        }
        if cli.progress {
            config.validation.show_progress = true;
        }

        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }
        config
            .validators
            .disallowed_paths
            .extend(cli.disallowed_paths.iter().cloned());

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.docview_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one document view extension must be specified".to_string(),
            ));
        }
        for ext in &config.files.docview_extensions {
            if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        for patterns in [
            &config.files.include_patterns,
            &config.files.exclude_patterns,
            &config.validators.disallowed_paths,
        ] {
            build_glob_set(patterns).map_err(|e| ConfigError::Validation(e.to_string()))?;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
