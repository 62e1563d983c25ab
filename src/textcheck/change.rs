//! ChangeDetector: Content-Addressable Change Detection
//!
//! Hashes the plain text of a category so that a sync with identical content
//! can skip reconciliation entirely.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Result of change detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeResult {
    pub has_changed: bool,
    pub content_hash: u64,
    pub previous_hash: Option<u64>,
}

/// Content-addressable change detector
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    /// Hash and UTF-16 length of the previous content
    last: Option<(u64, usize)>,
    check_count: u64,
    skip_count: u64,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record `text`. First check always counts as changed.
    pub fn check(&mut self, text: &str) -> ChangeResult {
        self.check_count += 1;

        let current = (compute_hash(text), text.encode_utf16().count());
        let previous = self.last;

        // Length guards against hash collisions between texts of different size
        let has_changed = previous != Some(current);
        if !has_changed {
            self.skip_count += 1;
        }

        self.last = Some(current);

        ChangeResult {
            has_changed,
            content_hash: current.0,
            previous_hash: previous.map(|(hash, _)| hash),
        }
    }

    pub fn has_changed(&mut self, text: &str) -> bool {
        self.check(text).has_changed
    }

    /// Record `text` as the known content without counting a check
    pub fn record(&mut self, text: &str) {
        self.last = Some((compute_hash(text), text.encode_utf16().count()));
    }

    /// Skip rate as percentage
    pub fn skip_rate(&self) -> f64 {
        if self.check_count == 0 {
            return 0.0;
        }
        (self.skip_count as f64 / self.check_count as f64) * 100.0
    }
}

fn compute_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
