//! Control-plane configuration: YAML file, environment overrides, defaults.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Control-plane YAML config.
///
/// ```yaml
/// host: 127.0.0.1
/// port: 7000
/// allow_origins: ["*"]
/// agent_offline_threshold_seconds: 20
/// database_url: sqlite://observix.db
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_offline_threshold")]
    pub agent_offline_threshold_seconds: i64,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_offline_threshold() -> i64 {
    20
}

fn default_database_url() -> String {
    "sqlite://observix.db".to_string()
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_origins: default_allow_origins(),
            agent_offline_threshold_seconds: default_offline_threshold(),
            database_url: default_database_url(),
        }
    }
}

impl ControlPlaneConfig {
    /// Load configuration: YAML file when given, defaults otherwise.
    /// `DATABASE_URL` (environment or `.env`) overrides the file value.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("config not found: {}", path.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("invalid control-plane config: {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database_url = url;
            }
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
        assert_eq!(config.agent_offline_threshold_seconds, 20);
        assert_eq!(config.allow_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_load_from_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cp.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"host: 0.0.0.0\nport: 9000\nagent_offline_threshold_seconds: 60\n")
            .unwrap();

        let config = ControlPlaneConfig::load(Some(&path)).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.agent_offline_threshold_seconds, 60);
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(config.database_url, "sqlite://observix.db");
        }
    }
}
