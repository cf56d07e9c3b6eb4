use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::resource::ResourceKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Kinds to track; all registered kinds when empty.
    #[serde(default)]
    pub resource_kinds: Vec<String>,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kubecache.db")
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            refresh_interval_secs: default_refresh_interval(),
            db_path: default_db_path(),
            kubeconfig: None,
            request_timeout_secs: default_request_timeout(),
            resource_kinds: Vec::new(),
        }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = match std::fs::read_to_string(path) {
            Ok(data) => Self::parse(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn parse(data: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh_interval_secs must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be > 0".into()));
        }
        self.tracked_kinds().map(|_| ())
    }

    pub fn tracked_kinds(&self) -> Result<Vec<ResourceKind>, ConfigError> {
        if self.resource_kinds.is_empty() {
            return Ok(ResourceKind::all().collect());
        }
        self.resource_kinds
            .iter()
            .map(|k| k.parse::<ResourceKind>().map_err(ConfigError::Invalid))
            .collect()
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }
}
