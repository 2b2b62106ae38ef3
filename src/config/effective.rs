//! Effective configuration with provenance
//!
//! Records the merged configuration plus where each contributing layer came
//! from, then exposes it as a typed [`CoreConfig`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::hooks::HookSpec;

/// Upper bound for guard timeouts
const MAX_GUARD_TIMEOUT_SECONDS: u64 = 60;

/// Where a configuration layer came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Workspace,
    Cli,
}

/// One configuration layer that contributed to the merged value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// Set for file layers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// sha256 of the file bytes, set for file layers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Guard policy options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    pub timeout_seconds: u64,
    pub paper_session: bool,
    pub pen_layers: bool,
}

/// External device command (argv). Both commands print JSON on stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub status_command: Vec<String>,
    #[serde(default)]
    pub list_command: Vec<String>,
}

impl DeviceConfig {
    pub fn is_configured(&self) -> bool {
        !self.status_command.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub probe_command: Vec<String>,
}

impl CameraConfig {
    pub fn is_configured(&self) -> bool {
        !self.probe_command.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistConfig {
    /// File name inside each job directory
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    pub keep_entries: usize,
}

/// Typed view of the merged configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub guards: GuardConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    pub checklist: ChecklistConfig,
    pub journal: JournalConfig,
    #[serde(default)]
    pub hooks: Vec<HookSpec>,
}

impl CoreConfig {
    pub fn guard_timeout(&self) -> Duration {
        Duration::from_secs(self.guards.timeout_seconds)
    }

    /// Reject values the lifecycle core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.guards.timeout_seconds;
        if timeout == 0 || timeout > MAX_GUARD_TIMEOUT_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "guards.timeout_seconds must be in (0, {}], got {}",
                MAX_GUARD_TIMEOUT_SECONDS, timeout
            )));
        }

        if self.device.status_command.is_empty() != self.device.list_command.is_empty() {
            return Err(ConfigError::ValidationError(
                "device.status_command and device.list_command must be set together".to_string(),
            ));
        }

        if self.journal.keep_entries == 0 {
            return Err(ConfigError::ValidationError(
                "journal.keep_entries must be at least 1".to_string(),
            ));
        }

        if self.checklist.file.is_empty() || self.checklist.file.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "checklist.file must be a plain file name, got {:?}",
                self.checklist.file
            )));
        }

        for (index, hook) in self.hooks.iter().enumerate() {
            if hook.command.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "hooks[{}].command must not be empty",
                    index
                )));
            }
            if hook.timeout_seconds == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "hooks[{}].timeout_seconds must be positive",
                    index
                )));
            }
        }

        Ok(())
    }
}

/// Merged configuration and the layers it was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub created_at: DateTime<Utc>,

    /// Deep-merged layers, highest precedence last
    pub config: Value,

    pub sources: Vec<ConfigSource>,
}

/// Default host config location (~/.config/penplot/config.toml)
pub fn default_host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/penplot/config.toml"))
}

impl EffectiveConfig {
    /// Build effective config from layers. Missing files are skipped.
    pub fn build(
        host_config_path: Option<&Path>,
        workspace_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        let files = [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Workspace, workspace_config_path),
        ];
        for (origin, path) in files {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let effective = Self {
            created_at: Utc::now(),
            config: merge_layers(layers),
            sources,
        };
        effective.core()?.validate()?;
        Ok(effective)
    }

    /// Typed configuration
    pub fn core(&self) -> Result<CoreConfig, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))
    }

    /// Look up a merged value by dotted key, e.g. `guards.timeout_seconds`
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Read one TOML layer. Returns the layer as JSON and the sha256 of the
    /// raw bytes.
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        let digest = hex::encode(Sha256::digest(&bytes));

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        let layer: Value = toml::from_str(text)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        Ok((layer, digest))
    }
}

/// Configuration failures. All are fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use penplot_journal::JobState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        let core = config.core().unwrap();

        assert_eq!(core.guards.timeout_seconds, 5);
        assert_eq!(core.guard_timeout(), Duration::from_secs(5));
        assert!(!core.device.is_configured());
        assert!(core.hooks.is_empty());
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_cli_override() {
        let cli = serde_json::json!({"guards": {"timeout_seconds": 2}});
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.core().unwrap().guards.timeout_seconds, 2);
        assert_eq!(config.get("guards.paper_session"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_timeout_bounds() {
        for bad in [0, 61] {
            let cli = serde_json::json!({"guards": {"timeout_seconds": bad}});
            let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
            assert!(err.to_string().contains("guards.timeout_seconds"));
        }
    }

    #[test]
    fn test_device_commands_set_together() {
        let cli = serde_json::json!({"device": {"status_command": ["plotctl", "status"]}});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("device.status_command"));
    }

    #[test]
    fn test_workspace_toml_layer() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[guards]").unwrap();
        writeln!(temp, "paper_session = true").unwrap();
        writeln!(temp, "[[hooks]]").unwrap();
        writeln!(temp, "on = \"COMPLETED\"").unwrap();
        writeln!(temp, "command = [\"notify-send\", \"plot done\"]").unwrap();

        let config = EffectiveConfig::build(None, Some(temp.path()), None).unwrap();
        let core = config.core().unwrap();

        assert!(core.guards.paper_session);
        assert_eq!(core.guards.timeout_seconds, 5);
        assert_eq!(core.hooks.len(), 1);
        assert_eq!(core.hooks[0].on, JobState::Completed);
        assert_eq!(config.sources[1].origin, ConfigOrigin::Workspace);
        assert_eq!(config.sources[1].digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_files_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/host.toml")),
            Some(Path::new("/nonexistent/penplot.toml")),
            None,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_invalid_toml_reported() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[guards").unwrap();

        let err = EffectiveConfig::build(None, Some(temp.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_empty_hook_command_rejected() {
        let cli = serde_json::json!({"hooks": [{"on": "PLOTTING", "command": []}]});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("hooks[0].command"));
    }
}
