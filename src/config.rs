//! Agent configuration loaded from YAML.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Agent YAML config.
///
/// ```yaml
/// agent_id: edge-1
/// region: eu
/// control_plane_url: http://127.0.0.1:7000
/// poll_assignments_seconds: 3
/// state_dir: /var/lib/observix
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub region: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub admin_port: Option<u16>,
    pub control_plane_url: String,
    #[serde(default = "default_poll_assignments_seconds")]
    pub poll_assignments_seconds: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_poll_assignments_seconds() -> u64 {
    3
}

fn default_state_dir() -> String {
    "observix-state".to_string()
}

impl AgentConfig {
    /// Load and validate the agent config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("config not found: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid agent config: {}", path.display()))?;

        if config.agent_id.trim().is_empty() {
            anyhow::bail!("agent_id must not be empty");
        }
        if config.region.trim().is_empty() {
            anyhow::bail!("region must not be empty");
        }
        if config.control_plane_url.trim().is_empty() {
            anyhow::bail!("control_plane_url must not be empty");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_tmp, path) = write_config(
            "agent_id: edge-1\n\
             region: eu\n\
             tenant_id: acme\n\
             admin_port: 7301\n\
             control_plane_url: http://cp:7000\n\
             poll_assignments_seconds: 10\n\
             state_dir: /tmp/observix\n",
        );
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.agent_id, "edge-1");
        assert_eq!(config.tenant_id.as_deref(), Some("acme"));
        assert_eq!(config.admin_port, Some(7301));
        assert_eq!(config.poll_assignments_seconds, 10);
    }

    #[test]
    fn test_defaults_applied() {
        let (_tmp, path) = write_config(
            "agent_id: edge-1\nregion: eu\ncontrol_plane_url: http://cp:7000\n",
        );
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.poll_assignments_seconds, 3);
        assert_eq!(config.state_dir, "observix-state");
        assert!(config.tenant_id.is_none());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let (_tmp, path) = write_config("agent_id: edge-1\nregion: eu\n");
        assert!(AgentConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(AgentConfig::load("/nonexistent/agent.yaml").is_err());
    }
}
