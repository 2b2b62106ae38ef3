//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Bound on every guard adapter call (default: 5)
    pub guard_timeout_seconds: u64,

    /// Require a paper session before arming (default: false)
    pub paper_session_guard: bool,

    /// Require configured pen/layer mapping before arming (default: false)
    pub pen_layer_guard: bool,

    /// Per-job checklist file name (default: "checklist.json")
    pub checklist_file: String,

    /// Records kept by journal cleanup (default: 1000)
    pub journal_keep_entries: usize,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            guard_timeout_seconds: 5,
            paper_session_guard: false,
            pen_layer_guard: false,
            checklist_file: "checklist.json".to_string(),
            journal_keep_entries: 1000,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "guards": {
                "timeout_seconds": self.guard_timeout_seconds,
                "paper_session": self.paper_session_guard,
                "pen_layers": self.pen_layer_guard
            },
            "device": {
                "status_command": [],
                "list_command": []
            },
            "camera": {
                "probe_command": []
            },
            "checklist": {
                "file": self.checklist_file
            },
            "journal": {
                "keep_entries": self.journal_keep_entries
            },
            "hooks": []
        })
    }
}
