//! Engine configuration.
//!
//! Defaults match the interactive editor: at most three sort keys and three
//! group-by columns. Limits can be overridden from the environment (a `.env`
//! file is honored) or from a JSON file passed to the CLI.

use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable overriding [`EngineConfig::max_sort_keys`].
pub const ENV_MAX_SORT_KEYS: &str = "TABCRAFT_MAX_SORT_KEYS";

/// Environment variable overriding [`EngineConfig::max_group_columns`].
pub const ENV_MAX_GROUP_COLUMNS: &str = "TABCRAFT_MAX_GROUP_COLUMNS";

/// Limits and parsing defaults shared by validation and the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of sort keys in a sort stage.
    pub max_sort_keys: usize,

    /// Maximum number of group-by columns in a group stage.
    pub max_group_columns: usize,

    /// Raw cell texts read as null (trimmed, case-insensitive).
    pub null_tokens: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sort_keys: 3,
            max_group_columns: 3,
            null_tokens: vec![String::new(), "null".to_string()],
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TABCRAFT_*` variables.
    ///
    /// Loads `.env` first if present. Values that are not positive integers
    /// are ignored.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Some(v) = read_limit(ENV_MAX_SORT_KEYS) {
            config.max_sort_keys = v;
        }
        if let Some(v) = read_limit(ENV_MAX_GROUP_COLUMNS) {
            config.max_group_columns = v;
        }
        config
    }

    /// Whether raw cell text stands for a missing value.
    pub fn is_null_token(&self, text: &str) -> bool {
        let text = text.trim();
        self.null_tokens
            .iter()
            .any(|token| token.trim().eq_ignore_ascii_case(text))
    }
}

fn read_limit(name: &str) -> Option<usize> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_sort_keys, 3);
        assert_eq!(config.max_group_columns, 3);
        assert!(config.is_null_token(""));
        assert!(config.is_null_token("  NULL "));
        assert!(!config.is_null_token("0"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_value(json!({ "max_sort_keys": 5 })).unwrap();
        assert_eq!(config.max_sort_keys, 5);
        assert_eq!(config.max_group_columns, 3);
        assert_eq!(config.null_tokens.len(), 2);
    }
}
