use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub convert: ConvertConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Conversion job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertConfig {
    /// Root directory of paired `.md` / `.json` source files.
    pub source_dir: PathBuf,
    /// Root directory rendered documents are written under, mirroring the
    /// source tree's relative layout.
    pub dist_dir: PathBuf,
    /// Path to the fingerprint cache database (a single JSON file).
    pub cache_db: PathBuf,
    /// Names excluded from discovery at every directory level.
    #[serde(default = "default_excluded_names")]
    pub excluded_names: Vec<String>,
    /// Fixed UTC offset, in hours, every timestamp is normalized to.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Optional job list driven by `--use-config`.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// One entry of the `--use-config` job list
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub source: PathBuf,
    pub dist: PathBuf,
    #[serde(default)]
    pub highlight: bool,
}

/// Code highlighting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// "local" (syntect), "remote" (highlighting service), or "off".
    #[serde(default = "default_highlight_mode")]
    pub mode: String,
    /// Remote highlighting service endpoint.
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Performance tuning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Documents in flight at once; also the batch chunk size.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Cache table is flushed to disk every this many completed documents.
    #[serde(default = "default_cache_flush_every")]
    pub cache_flush_every: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            mode: default_highlight_mode(),
            api_url: String::new(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache_flush_every: default_cache_flush_every(),
        }
    }
}

fn default_excluded_names() -> Vec<String> {
    [".DS_Store", ".git", ".gitignore", "README.json", "README.md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_utc_offset_hours() -> i32 {
    8
}

fn default_highlight_mode() -> String {
    "off".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    8
}

fn default_cache_flush_every() -> usize {
    16
}

impl Config {
    /// Load configuration from file
    ///
    /// Looks for the config file in this order:
    /// 1. Path specified in the BLOGCONV_CONFIG environment variable
    /// 2. ./config.toml in the current directory
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BLOGCONV_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.convert.source_dir.exists() {
            anyhow::bail!(
                "source_dir does not exist: {}. Set source_dir in config.toml to your posts directory.",
                self.convert.source_dir.display()
            );
        }

        if !self.convert.source_dir.is_dir() {
            anyhow::bail!(
                "source_dir must be a directory, not a file: {}",
                self.convert.source_dir.display()
            );
        }

        if !matches!(self.highlight.mode.as_str(), "local" | "remote" | "off") {
            anyhow::bail!(
                "highlight.mode must be one of \"local\", \"remote\", \"off\" (got {:?})",
                self.highlight.mode
            );
        }

        if self.highlight.mode == "remote" && self.highlight.api_url.is_empty() {
            anyhow::bail!("highlight.api_url must be set when highlight.mode is \"remote\"");
        }

        if self.performance.concurrency == 0 {
            anyhow::bail!("performance.concurrency must be greater than 0");
        }

        if self.performance.cache_flush_every == 0 {
            anyhow::bail!("performance.cache_flush_every must be greater than 0");
        }

        if self.convert.utc_offset_hours < -12 || self.convert.utc_offset_hours > 14 {
            anyhow::bail!("convert.utc_offset_hours must be a valid UTC offset");
        }

        Ok(())
    }

    /// Get the source tree root
    pub fn source_dir(&self) -> &Path {
        &self.convert.source_dir
    }

    /// Get the output tree root
    pub fn dist_dir(&self) -> &Path {
        &self.convert.dist_dir
    }

    /// Get the cache database path
    pub fn cache_db(&self) -> &Path {
        &self.convert.cache_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn create_test_config(temp_dir: &TempDir) -> String {
        let source_dir = temp_dir.path().canonicalize().unwrap();
        let source_str = source_dir.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[convert]
source_dir = "{}"
dist_dir = "./export"
cache_db = "./cache.json"
utc_offset_hours = 8

[highlight]
mode = "off"

[performance]
concurrency = 4
cache_flush_every = 8
"#,
            source_str
        )
    }

    fn with_config_env(config_path: &std::path::Path, f: impl FnOnce()) {
        let original = std::env::var("BLOGCONV_CONFIG").ok();
        std::env::set_var("BLOGCONV_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("BLOGCONV_CONFIG");
        if let Some(val) = original {
            std::env::set_var("BLOGCONV_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, create_test_config(&temp_dir)).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.performance.concurrency, 4);
            assert_eq!(config.highlight.mode, "off");
            assert_eq!(config.convert.utc_offset_hours, 8);
            // Denylist defaults apply when omitted from the file
            assert!(config.convert.excluded_names.contains(&".git".to_string()));
        });
    }

    #[test]
    fn test_config_remote_requires_api_url() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let source_dir = temp_dir.path().canonicalize().unwrap();
        let content = format!(
            r#"
[convert]
source_dir = "{}"
dist_dir = "./export"
cache_db = "./cache.json"

[highlight]
mode = "remote"
"#,
            source_dir.to_str().unwrap().replace('\\', "\\\\")
        );
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, content).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("api_url"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("BLOGCONV_CONFIG").ok();
        std::env::set_var("BLOGCONV_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("BLOGCONV_CONFIG");
        if let Some(v) = original {
            std::env::set_var("BLOGCONV_CONFIG", v);
        }
    }
}
