//! # Manager Configuration
//!
//! The size-class table is the only configuration surface. It is compiled
//! in (the default catalogue), built in code, or loaded once at startup
//! from a TOML file:
//!
//! ```toml
//! check_generations = true
//!
//! [[size_class]]
//! block_size = 16
//! block_count = 1024
//!
//! [[size_class]]
//! block_size = 64
//! block_count = 256
//! ```
//!
//! A file without any `size_class` entry selects the default catalogue.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::size_class::{SizeClass, SizeClassTable};

/// Construction parameters for a [`MemoryManager`](crate::MemoryManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Reject stale handles by comparing generations on every access.
    ///
    /// Off by default: the base design trades misuse detection for zero
    /// per-access overhead, and double-free or use-after-free of a
    /// valid-looking index goes undetected.
    #[serde(default)]
    pub check_generations: bool,

    /// `(block_size, block_count)` entries, strictly ascending.
    /// Empty selects the default catalogue.
    #[serde(default, rename = "size_class")]
    pub size_classes: Vec<SizeClass>,
}

impl MemoryConfig {
    /// Creates a configuration from an already validated table.
    #[must_use]
    pub fn new(table: &SizeClassTable) -> Self {
        Self {
            check_generations: false,
            size_classes: table.as_slice().to_vec(),
        }
    }

    /// Creates a configuration from `(block_size, block_count)` pairs.
    ///
    /// Validation is deferred to [`size_class_table`](Self::size_class_table).
    #[must_use]
    pub fn from_pairs(pairs: &[(usize, u32)]) -> Self {
        Self {
            check_generations: false,
            size_classes: pairs
                .iter()
                .map(|&(size, count)| SizeClass::new(size, count))
                .collect(),
        }
    }

    /// Enables or disables generation checks.
    #[must_use]
    pub fn with_generation_checks(mut self, enabled: bool) -> Self {
        self.check_generations = enabled;
        self
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the document is malformed.
    /// The table itself is validated at construction.
    pub fn from_toml_str(source: &str) -> MemoryResult<Self> {
        toml::from_str(source).map_err(|e| MemoryError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            MemoryError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Serializes the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> MemoryResult<String> {
        toml::to_string(self).map_err(|e| MemoryError::InvalidConfig(e.to_string()))
    }

    /// Validates the size classes into a table.
    ///
    /// # Errors
    ///
    /// Same as [`SizeClassTable::new`].
    pub fn size_class_table(&self) -> MemoryResult<SizeClassTable> {
        if self.size_classes.is_empty() {
            return Ok(SizeClassTable::default());
        }
        SizeClassTable::new(self.size_classes.clone())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new(&SizeClassTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config = MemoryConfig::from_toml_str(
            r"
            check_generations = true

            [[size_class]]
            block_size = 16
            block_count = 8

            [[size_class]]
            block_size = 64
            block_count = 2
            ",
        )
        .unwrap();

        assert!(config.check_generations);
        assert_eq!(
            config.size_classes,
            vec![SizeClass::new(16, 8), SizeClass::new(64, 2)]
        );
        assert_eq!(config.size_class_table().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_toml_selects_default_table() {
        let config = MemoryConfig::from_toml_str("").unwrap();
        assert!(!config.check_generations);
        assert_eq!(
            config.size_class_table().unwrap(),
            SizeClassTable::default()
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = MemoryConfig::from_toml_str("heap_bytes = 4096");
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_table_rejected_on_validation() {
        let config = MemoryConfig::from_pairs(&[(64, 1), (32, 1)]);
        assert!(matches!(
            config.size_class_table(),
            Err(MemoryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MemoryConfig::from_pairs(&[(16, 4), (32, 2)]).with_generation_checks(true);
        let text = config.to_toml_string().unwrap();
        assert_eq!(MemoryConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let result = MemoryConfig::from_toml_file("/nonexistent/keystone/memory.toml");
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }
}
