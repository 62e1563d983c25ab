//! Core data structures for the text-check overlay
//!
//! Positions (`offset`, `from`, `to`) are UTF-16 code units into the
//! category's plain text, which is what the editor and the check endpoint
//! both count in.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identity
// =============================================================================

/// Name of one checked text field of a documentation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ephemeral match key, only unique inside one category snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u32);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Ignore state
// =============================================================================

/// Exactly one ignore state is active per match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IgnoreState {
    #[default]
    None,
    IgnoredOnce,
    IgnoredInDocument,
    IgnoredGlobally,
}

impl IgnoreState {
    /// Whether the mark renders as ignored
    pub fn is_ignored(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Document and global scope suppress the "ignore once" affordance
    pub fn allows_ignore_once(&self) -> bool {
        matches!(self, Self::None | Self::IgnoredOnce)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::IgnoredOnce => "ignored_once",
            Self::IgnoredInDocument => "ignored_in_document",
            Self::IgnoredGlobally => "ignored_globally",
        }
    }
}

// =============================================================================
// Match
// =============================================================================

/// A single flagged span of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub word: String,
    pub category: Category,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub short_message: String,
    #[serde(default)]
    pub ignore_state: IgnoreState,
    /// Start of the span (UTF-16 units)
    pub offset: usize,
    /// Length of the span (UTF-16 units)
    pub length: usize,
    /// Replacement suggestions from the analysis service
    #[serde(default)]
    pub replacements: Vec<String>,
    /// Visual category (misspelling, grammar, ...)
    #[serde(default)]
    pub issue_type: String,
    /// Ignored by a read-only dictionary; the user cannot remove it
    #[serde(default)]
    pub locked: bool,
}

impl Match {
    /// Bare active match covering `word` at `offset`
    pub fn new(id: u32, word: &str, category: impl Into<Category>, offset: usize) -> Self {
        Self {
            id: MatchId(id),
            word: word.to_string(),
            category: category.into(),
            message: String::new(),
            short_message: String::new(),
            ignore_state: IgnoreState::None,
            offset,
            length: word.encode_utf16().count(),
            replacements: Vec::new(),
            issue_type: String::new(),
            locked: false,
        }
    }

    /// End of the span (exclusive, UTF-16 units)
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Builders for test fixtures
#[cfg(test)]
impl Match {
    pub(crate) fn with_state(mut self, state: IgnoreState) -> Self {
        self.ignore_state = state;
        self
    }

    pub(crate) fn with_replacements(mut self, replacements: &[&str]) -> Self {
        self.replacements = replacements.iter().map(|r| r.to_string()).collect();
        self
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Underline style of a rendered mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkStyle {
    /// Red wavy underline
    Error,
    /// Blue solid underline
    Ignored,
}

/// Render instruction for the editor, always derived from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMark {
    pub id: MatchId,
    pub category: Category,
    pub from: usize,
    pub to: usize,
    pub ignored: bool,
    pub style: MarkStyle,
    pub issue_type: String,
}

impl From<&Match> for RenderedMark {
    fn from(m: &Match) -> Self {
        let ignored = m.ignore_state.is_ignored();
        Self {
            id: m.id,
            category: m.category.clone(),
            from: m.offset,
            to: m.end(),
            ignored,
            style: if ignored { MarkStyle::Ignored } else { MarkStyle::Error },
            issue_type: m.issue_type.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
