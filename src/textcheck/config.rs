// textcheck-core/src/textcheck/config.rs
//
// Configuration for a text-check session

use serde::{Deserialize, Serialize};

use super::error::TextCheckError;
use super::types::Category;

/// Text-check session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextCheckConfig {
    /// Longest text (UTF-16 units) sent to the check endpoint
    pub max_text_length: usize,

    /// Skip reconciliation when the synced text hashes to the last one
    pub skip_unchanged_sync: bool,

    /// Categories the editor may check; empty allows any
    pub known_categories: Vec<Category>,
}

impl Default for TextCheckConfig {
    fn default() -> Self {
        Self {
            max_text_length: 100_000,
            skip_unchanged_sync: true,
            known_categories: Vec::new(),
        }
    }
}

impl TextCheckConfig {
    /// Parse from a JSON string, falling back to defaults for absent fields
    pub fn from_json(json: &str) -> Result<Self, TextCheckError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TextCheckError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TextCheckError> {
        if self.max_text_length == 0 {
            return Err(TextCheckError::InvalidConfig(
                "maxTextLength must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn accepts_category(&self, category: &Category) -> bool {
        self.known_categories.is_empty() || self.known_categories.contains(category)
    }
}
