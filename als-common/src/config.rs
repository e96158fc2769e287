//! Configuration loading and data folder resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::items::{LikertRange, Scale};
use crate::{Error, Result};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "ALS_DATA_FOLDER";

/// Default service port
pub const DEFAULT_PORT: u16 = 5780;

/// Tunable constants of the selection and recommendation engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Short-form size for the EQ scale
    pub eq_target: usize,
    /// Short-form size for the FLA scale
    pub fla_target: usize,
    /// Items at or above this similarity are near-duplicates
    pub similarity_threshold: f64,
    /// Minimum acceptable Cronbach's alpha
    pub min_alpha: f64,
    pub likert_min: f64,
    pub likert_max: f64,
    /// Score gaps below this flag a tie
    pub tie_gap_threshold: f64,
    /// Maximum bonus a tie-breaker answer set can add or remove
    pub tie_bonus_weight: f64,
    /// Paired participants needed before a correlation counts
    pub min_correlation_observations: usize,
    /// Replacement-question rounds a client may run
    pub max_requestion_rounds: u32,
    /// Fail startup when a driver subscale has no correlation entry
    pub strict_correlation: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            eq_target: 45,
            fla_target: 12,
            similarity_threshold: 0.80,
            min_alpha: 0.70,
            likert_min: 1.0,
            likert_max: 5.0,
            tie_gap_threshold: 0.10,
            tie_bonus_weight: 0.05,
            min_correlation_observations: 3,
            max_requestion_rounds: 3,
            strict_correlation: false,
        }
    }
}

impl EngineParams {
    /// Short-form size for a driver scale (0 for the strategy scale)
    pub fn target_for(&self, scale: Scale) -> usize {
        match scale {
            Scale::Eq => self.eq_target,
            Scale::Fla => self.fla_target,
            Scale::Strategy => 0,
        }
    }

    pub fn likert(&self) -> LikertRange {
        LikertRange::new(self.likert_min, self.likert_max)
    }

    /// Reject values the engines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.eq_target == 0 || self.fla_target == 0 {
            return Err(Error::Config("Short-form targets must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !self.likert_min.is_finite() || !self.likert_max.is_finite() || self.likert_min >= self.likert_max {
            return Err(Error::Config(format!(
                "Invalid Likert range {}..{}",
                self.likert_min, self.likert_max
            )));
        }
        if self.tie_gap_threshold < 0.0 || self.tie_bonus_weight < 0.0 {
            return Err(Error::Config(
                "tie_gap_threshold and tie_bonus_weight must be non-negative".to_string(),
            ));
        }
        if self.min_correlation_observations < 2 {
            return Err(Error::Config(
                "min_correlation_observations must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// LLM tie-arbitration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key (the key itself never lives in TOML)
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 300,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Model name, with `OPENAI_MODEL` taking precedence over the TOML value
    pub fn resolved_model(&self) -> String {
        std::env::var("OPENAI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }

    /// API key from the configured environment variable, if set and non-blank
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// TOML configuration file contents; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    /// Dataset file, relative to the data folder unless absolute
    pub dataset_file: Option<PathBuf>,
    /// Selection cache artifact, relative to the data folder unless absolute
    pub cache_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub engine: EngineParams,
    pub llm: LlmConfig,
}

impl TomlConfig {
    pub fn dataset_path(&self, data_folder: &Path) -> PathBuf {
        resolve_in(data_folder, self.dataset_file.as_deref(), "dataset.json")
    }

    pub fn cache_path(&self, data_folder: &Path) -> PathBuf {
        resolve_in(
            data_folder,
            self.cache_file.as_deref(),
            ".cache/item_builder_results.json",
        )
    }
}

fn resolve_in(data_folder: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => data_folder.join(path),
        None => data_folder.join(default),
    }
}

/// Default configuration file path for the platform (`<config dir>/als/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("als").join("config.toml"))
}

/// Load the TOML configuration
///
/// An explicit path must exist. Without one, the platform default is tried; if it is
/// missing, defaults are used with a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No config file found; using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse TOML text into a validated configuration
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    config.engine.validate()?;
    Ok(config)
}

/// Data folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `ALS_DATA_FOLDER` environment variable
/// 3. `data_folder` in the TOML config
/// 4. OS-dependent default
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/als
        dirs::data_local_dir()
            .map(|d| d.join("als"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/als"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/als
        dirs::data_dir()
            .map(|d| d.join("als"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/als"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\als
        dirs::data_local_dir()
            .map(|d| d.join("als"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\als"))
    } else {
        PathBuf::from("./als_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let params = EngineParams::default();
        assert_eq!(params.target_for(Scale::Eq), 45);
        assert_eq!(params.target_for(Scale::Fla), 12);
        assert_eq!(params.target_for(Scale::Strategy), 0);
        assert_eq!(params.likert(), LikertRange::new(1.0, 5.0));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_likert_range() {
        let params = EngineParams {
            likert_min: 5.0,
            likert_max: 1.0,
            ..EngineParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_paths_relative_to_data_folder() {
        let config = TomlConfig::default();
        let root = PathBuf::from("/srv/als");
        assert_eq!(config.dataset_path(&root), root.join("dataset.json"));
        assert_eq!(
            config.cache_path(&root),
            root.join(".cache/item_builder_results.json")
        );

        let config = TomlConfig {
            dataset_file: Some(PathBuf::from("/data/bank.json")),
            cache_file: Some(PathBuf::from("cache.json")),
            ..TomlConfig::default()
        };
        assert_eq!(config.dataset_path(&root), PathBuf::from("/data/bank.json"));
        assert_eq!(config.cache_path(&root), root.join("cache.json"));
    }

    #[test]
    fn test_cli_argument_wins() {
        let config = TomlConfig {
            data_folder: Some(PathBuf::from("/from/toml")),
            ..TomlConfig::default()
        };
        let resolved = resolve_data_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
