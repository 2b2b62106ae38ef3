//! Layered configuration
//!
//! Four layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Host config (~/.config/penplot/config.toml)
//! 3. Workspace config (<workspace>/penplot.toml)
//! 4. CLI overrides
//!
//! The merged value is deserialized into [`CoreConfig`].

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_host_config_path, CameraConfig, ChecklistConfig, ConfigError, ConfigOrigin,
    ConfigSource, CoreConfig, DeviceConfig, EffectiveConfig, GuardConfig, JournalConfig,
};
pub use merge::{deep_merge, merge_layers};
