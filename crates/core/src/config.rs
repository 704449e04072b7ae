//! Configuration management
//!
//! The configuration lives in a TOML file, by default
//! `<config dir>/bucketfence/config.toml`. `BF_CONFIG_DIR` overrides the
//! directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BF_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const SCHEMA_VERSION: u32 = 1;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            store: StoreConfig::default(),
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Store root and client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root every name is resolved against
    #[serde(default = "default_root")]
    pub root: String,

    /// Identity token of the client session
    #[serde(default = "default_identity")]
    pub identity: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            identity: default_identity(),
        }
    }
}

fn default_root() -> String {
    "/".to_string()
}

fn default_identity() -> String {
    "anonymous".to_string()
}

/// Which storage medium backs the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory tree, gone when the process exits
    #[default]
    Memory,

    /// Directories and files under a local path
    Local {
        /// Base directory holding the tree
        path: PathBuf,
    },

    /// One physical bucket on an S3-compatible service
    S3(S3Config),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::Local { .. } => "local",
            BackendConfig::S3(_) => "s3",
        }
    }
}

/// Connection settings for the S3 backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL (e.g. `http://localhost:9000`)
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    pub access_key: String,

    pub secret_key: String,

    /// Physical bucket that holds the whole tree
    pub bucket: String,

    /// Bucket lookup style: auto, path, or dns
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,
}

impl S3Config {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: default_region(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            bucket_lookup: default_bucket_lookup(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

/// Retry policy for backend requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

impl Config {
    /// Check the configuration for values that can never work
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            )));
        }

        if self.store.root.trim().is_empty() {
            return Err(Error::Config("store root cannot be empty".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        match &self.backend {
            BackendConfig::Memory => {}
            BackendConfig::Local { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Config("local backend path cannot be empty".to_string()));
                }
            }
            BackendConfig::S3(s3) => {
                let url = url::Url::parse(&s3.endpoint).map_err(|e| {
                    Error::Config(format!("invalid endpoint '{}': {e}", s3.endpoint))
                })?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(Error::Config(format!(
                        "endpoint must use http or https: {}",
                        s3.endpoint
                    )));
                }
                if s3.bucket.is_empty() {
                    return Err(Error::Config("s3 bucket cannot be empty".to_string()));
                }
                if !matches!(s3.bucket_lookup.as_str(), "auto" | "path" | "dns") {
                    return Err(Error::Config(
                        "bucket_lookup must be 'auto', 'path', or 'dns'".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Locate the configuration file from `BF_CONFIG_DIR` or the user config dir
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?
                .join("bucketfence"),
        };
        Ok(Self::in_dir(dir))
    }

    /// Use `config.toml` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_path(dir.as_ref().join(CONFIG_FILE))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", self.path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and write the configuration, creating parent directories
    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(dir.path());
        let config = manager.load().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.store.root, "/");
        assert_eq!(config.backend, BackendConfig::Memory);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(dir.path().join("nested"));

        let mut config = Config::default();
        config.store.root = "/data".to_string();
        config.store.identity = "alice".to_string();
        config.backend = BackendConfig::Local {
            path: dir.path().join("tree"),
        };

        manager.save(&config).unwrap();
        assert!(manager.path().exists());
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_parse_s3_backend() {
        let content = r#"
            [store]
            root = "/data"

            [backend]
            type = "s3"
            endpoint = "http://localhost:9000"
            access_key = "minioadmin"
            secret_key = "minioadmin"
            bucket = "tree"

            [retry]
            max_attempts = 5
        "#;

        let config: Config = toml::from_str(content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.store.identity, "anonymous");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 100);

        match config.backend {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "tree");
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(s3.bucket_lookup, "auto");
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.store.root = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backend = BackendConfig::S3(S3Config::new("not a url", "k", "s", "b"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let mut s3 = S3Config::new("ftp://host", "k", "s", "b");
        config.backend = BackendConfig::S3(s3.clone());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        s3.endpoint = "http://localhost:9000".to_string();
        s3.bucket_lookup = "virtual".to_string();
        config.backend = BackendConfig::S3(s3);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(dir.path());
        std::fs::write(manager.path(), "schema_version = \"one\"").unwrap();
        assert!(matches!(manager.load(), Err(Error::Config(_))));
    }
}
