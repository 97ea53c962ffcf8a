//! Runtime limits
//!
//! Loaded from a `kurt.toml` when the host has one; every field has a
//! default so partial files are fine:
//!
//! ```toml
//! max_depth = 2000
//! ```

use serde::Deserialize;

/// Nesting depth at which evaluation fails with stack exhaustion
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Stack growth parameters for deep recursion
pub const DEFAULT_STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
pub const DEFAULT_STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_depth: usize,
    pub stack_red_zone: usize,
    pub stack_grow_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
            stack_red_zone: DEFAULT_STACK_RED_ZONE,
            stack_grow_size: DEFAULT_STACK_GROW_SIZE,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str("max_depth = 50").unwrap();
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.stack_red_zone, DEFAULT_STACK_RED_ZONE);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_toml_str("depth = 1").is_err());
    }
}
