//! Configuration types and loading
//!
//! Precedence: CLI `--config` > `CONFIG_PATH` env var > `learning-api.toml`
//! in the working directory. Every section is optional; a missing default
//! config file means "all defaults". `API_BASE_URL` overrides `api.base_url`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Backend connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the token pair is persisted
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

fn default_base_url() -> String {
    session_auth::DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl Config {
    /// Load from a TOML file, then overlay the environment and validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Defaults plus environment overrides, for when no config file exists.
    pub fn from_env() -> common::Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn client_config(&self) -> api_client::ClientConfig {
        api_client::ClientConfig {
            base_url: self.api.base_url.clone(),
            timeout: self.timeout(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("API_BASE_URL")
            && !url.trim().is_empty()
        {
            self.api.base_url = url.trim().to_string();
        }
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag tells the caller whether the path was asked for explicitly;
    /// only an explicit path is an error when missing.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from("learning-api.toml"), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[api]
base_url = "https://learn.example.org/api"
timeout_secs = 10

[credentials]
path = "/var/lib/learning-api/credentials.json"
"#
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("API_BASE_URL") };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning-api.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://learn.example.org/api");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.credentials.path,
            PathBuf::from("/var/lib/learning-api/credentials.json")
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("API_BASE_URL") };

        let config = Config::from_toml("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8001/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.credentials.path, PathBuf::from("credentials.json"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/learning-api.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = Config::from_toml("not valid {{{{ toml");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("API_BASE_URL") };

        let result = Config::from_toml("[api]\nbase_url = \"ftp://learn.example.org\"\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("base_url"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("API_BASE_URL") };

        let result = Config::from_toml("[api]\ntimeout_secs = 0\n");
        assert!(result.unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_env_overrides_base_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("API_BASE_URL", "https://staging.example.org/api") };

        let config = Config::from_toml(valid_toml()).unwrap();
        assert_eq!(config.api.base_url, "https://staging.example.org/api");

        let defaults = Config::from_env().unwrap();
        assert_eq!(defaults.api.base_url, "https://staging.example.org/api");

        unsafe { remove_env("API_BASE_URL") };
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/etc/learning-api.toml") };

        let (path, explicit) = Config::resolve_path(Some("./local.toml"));
        assert_eq!(path, PathBuf::from("./local.toml"));
        assert!(explicit);

        let (path, explicit) = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/etc/learning-api.toml"));
        assert!(explicit);

        unsafe { remove_env("CONFIG_PATH") };
        let (path, explicit) = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("learning-api.toml"));
        assert!(!explicit);
    }

    #[test]
    fn test_client_config_carries_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("API_BASE_URL") };

        let config = Config::from_toml(valid_toml()).unwrap();
        let client_config = config.client_config();
        assert_eq!(client_config.base_url, "https://learn.example.org/api");
        assert_eq!(client_config.timeout, Duration::from_secs(10));
    }
}
