//! Loader configuration and connection targets

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Deserialize;

use crate::error::{LoadError, Result};

/// Key page size used by finalization when scanning side-indexes
pub const DEFAULT_FINALIZE_BATCH_SIZE: usize = 100;

/// Environment variable overriding the worker count
pub const WORKERS_ENV: &str = "GRAPHLOAD_WORKERS";

/// Environment variable overriding the finalization batch size
pub const BATCH_SIZE_ENV: &str = "GRAPHLOAD_BATCH_SIZE";

/// Store login
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// BLAKE3 digest of `username:password`
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.username.as_bytes());
        hasher.update(b":");
        hasher.update(self.password.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "admin")
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn default_batch_size() -> usize {
    DEFAULT_FINALIZE_BATCH_SIZE
}

/// Tunables of one [`Loader`](crate::Loader)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Worker threads draining the operation queue
    pub workers: usize,
    /// Vertex keys fetched per side-index page during finalization
    pub finalize_batch_size: usize,
    pub credentials: Credentials,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            finalize_batch_size: default_batch_size(),
            credentials: Credentials::default(),
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn finalize_batch_size(mut self, size: usize) -> Self {
        self.finalize_batch_size = size;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = fs::File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `GRAPHLOAD_WORKERS` / `GRAPHLOAD_BATCH_SIZE` applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(workers) = read_env_usize(WORKERS_ENV)? {
            self.workers = workers;
        }
        if let Some(size) = read_env_usize(BATCH_SIZE_ENV)? {
            self.finalize_batch_size = size;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LoadError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.finalize_batch_size == 0 {
            return Err(LoadError::InvalidConfig(
                "finalize batch size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn read_env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LoadError::InvalidConfig(format!("{} is not a number: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Where a loader connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Fresh in-process store, gone when the loader is dropped
    Memory,
    /// sled directory, created on first use
    Sled(PathBuf),
}

impl Target {
    /// Parse `memory:`, `sled:<path>` or a bare path
    pub fn parse(target: &str) -> Result<Self> {
        // The name after `memory:` only labels the store.
        if target.starts_with("memory:") {
            return Ok(Target::Memory);
        }
        let path = target.strip_prefix("sled:").unwrap_or(target);
        if path.is_empty() {
            return Err(LoadError::InvalidTarget(target.to_string()));
        }
        Ok(Target::Sled(PathBuf::from(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.finalize_batch_size, 100);
        assert_eq!(config.credentials, Credentials::new("admin", "admin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = LoaderConfig::new().workers(0);
        assert!(matches!(config.validate(), Err(LoadError::InvalidConfig(_))));

        let config = LoaderConfig::new().workers(3).finalize_batch_size(0);
        assert!(matches!(config.validate(), Err(LoadError::InvalidConfig(_))));

        let config = LoaderConfig::new().workers(3).finalize_batch_size(7);
        assert_eq!((config.workers, config.finalize_batch_size), (3, 7));
    }

    #[test]
    fn test_config_from_json_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("load.json");
        fs::write(
            &path,
            r#"{"workers": 2, "credentials": {"username": "root", "password": "pw"}}"#,
        )
        .unwrap();

        let config = LoaderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.finalize_batch_size, DEFAULT_FINALIZE_BATCH_SIZE);
        assert_eq!(config.credentials.username, "root");
    }

    #[test]
    fn test_credentials_digest() {
        let a = Credentials::default().digest();
        assert_eq!(a, Credentials::new("admin", "admin").digest());
        assert_ne!(a, Credentials::new("admin", "other").digest());
        assert_ne!(Credentials::new("ad", "min:").digest(), Credentials::new("ad:", "min").digest());
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(Target::parse("memory:test1").unwrap(), Target::Memory);
        assert_eq!(Target::parse("memory:").unwrap(), Target::Memory);
        assert_eq!(
            Target::parse("sled:/tmp/graph").unwrap(),
            Target::Sled(PathBuf::from("/tmp/graph"))
        );
        assert_eq!(Target::parse("data/graph").unwrap(), Target::Sled(PathBuf::from("data/graph")));
        assert!(matches!(Target::parse("sled:"), Err(LoadError::InvalidTarget(_))));
    }
}
