use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Object storage addressing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bind every path to this bucket. When unset, the first path segment
    /// names the bucket.
    pub bucket: Option<String>,
    /// Prepended to every object key
    pub prefix: Option<String>,
    pub separator: char,
    /// Create missing buckets on first use
    pub create_bucket: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { bucket: None, prefix: None, separator: '/', create_bucket: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "bucketfs=info".to_string(), json: false }
    }
}

impl Config {
    /// Layers an optional `bucketfs.{toml,yaml,json}` file in the working
    /// directory and `BUCKETFS__SECTION__KEY` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("bucketfs").required(false))
            .add_source(config::Environment::with_prefix("BUCKETFS").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.storage.bucket.is_none());
        assert!(config.storage.prefix.is_none());
        assert_eq!(config.storage.separator, '/');
        assert!(config.storage.create_bucket);

        assert_eq!(config.logging.filter, "bucketfs=info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nbucket = \"photos\"\nprefix = \"tenant-a\"\ncreate_bucket = false\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.storage.bucket.as_deref(), Some("photos"));
        assert_eq!(config.storage.prefix.as_deref(), Some("tenant-a"));
        assert_eq!(config.storage.separator, '/');
        assert!(!config.storage.create_bucket);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "bucketfs=info");
    }

    #[test]
    fn test_from_missing_file_fails() {
        assert!(Config::from_file("/nonexistent/bucketfs.toml").is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_environment() {
        unsafe {
            env::set_var("BUCKETFS__STORAGE__BUCKET", "from-env");
            env::set_var("BUCKETFS__LOGGING__FILTER", "bucketfs=debug");
        }

        let config = Config::load().unwrap();

        unsafe {
            env::remove_var("BUCKETFS__STORAGE__BUCKET");
            env::remove_var("BUCKETFS__LOGGING__FILTER");
        }

        assert_eq!(config.storage.bucket.as_deref(), Some("from-env"));
        assert_eq!(config.logging.filter, "bucketfs=debug");
        assert!(config.storage.create_bucket);
    }

    #[test]
    #[serial]
    fn test_load_without_sources_uses_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.storage.separator, '/');
        assert_eq!(config.logging.filter, "bucketfs=info");
    }
}
