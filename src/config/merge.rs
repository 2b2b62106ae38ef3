//! Configuration merge logic
//!
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins), so a workspace hook list replaces the host's
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge `overlay` onto `base`
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // Arrays and scalars: overlay wins entirely
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_override_keeps_siblings() {
        let base = json!({"guards": {"timeout_seconds": 5, "pen_layers": false}});
        let overlay = json!({"guards": {"pen_layers": true}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["guards"]["timeout_seconds"], 5);
        assert_eq!(result["guards"]["pen_layers"], true);
    }

    #[test]
    fn test_hook_list_replaced() {
        let base = json!({"hooks": [{"on": "PLOTTING", "command": ["a"]}]});
        let overlay = json!({"hooks": [{"on": "COMPLETED", "command": ["b"]}]});
        let result = deep_merge(base, overlay);

        let hooks = result["hooks"].as_array().unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0]["on"], "COMPLETED");
    }

    #[test]
    fn test_command_argv_replaced() {
        let base = json!({"device": {"status_command": ["axicli", "--status"]}});
        let overlay = json!({"device": {"status_command": ["plotctl", "status"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["device"]["status_command"], json!(["plotctl", "status"]));
    }

    #[test]
    fn test_merge_layers_precedence() {
        let layers = vec![
            json!({"guards": {"timeout_seconds": 5}}),
            json!({"guards": {"timeout_seconds": 10}}),
            json!({"guards": {"timeout_seconds": 2}}),
        ];
        assert_eq!(merge_layers(layers)["guards"]["timeout_seconds"], 2);
    }

    #[test]
    fn test_merge_empty_layers() {
        assert_eq!(merge_layers(Vec::new()), Value::Null);
    }
}
