//! Check endpoint wire types
//!
//! Converts a check response into store matches anchored in the plain text
//! that was sent with the request.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::annotated::AnnotatedHtmlParser;
use super::error::TextCheckError;
use super::text::{find_whole_word, span_equals, utf16_units, whole_word_offsets};
use super::types::{Category, IgnoreState, Match, MatchId};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub document_id: Option<String>,
    pub category: Category,
    pub text: String,
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(default)]
    pub html_text: String,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: u32,
    pub word: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub short_message: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub is_ignored_once: bool,
    #[serde(default)]
    pub ignored_text_check_words: Vec<IgnoredWordRecord>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub replacements: Vec<ReplacementRecord>,
    #[serde(default)]
    pub rule: Option<RuleRecord>,
}

/// Where an ignored word is stored on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredWordType {
    DocumentationUnit,
    Global,
    /// Read-only external dictionary
    GlobalJdv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredWordRecord {
    #[serde(rename = "type")]
    pub kind: IgnoredWordType,
    #[serde(default = "default_editable")]
    pub is_editable: bool,
}

fn default_editable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplacementRecord {
    Plain(String),
    Value { value: String },
}

impl ReplacementRecord {
    pub fn into_text(self) -> String {
        match self {
            Self::Plain(text) | Self::Value { value: text } => text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    #[serde(default)]
    pub issue_type: String,
}

impl MatchRecord {
    /// Broadest scope wins; returns the state and whether it is locked
    pub fn ignore_state(&self) -> (IgnoreState, bool) {
        let global = self
            .ignored_text_check_words
            .iter()
            .filter(|w| matches!(w.kind, IgnoredWordType::Global | IgnoredWordType::GlobalJdv))
            .collect::<Vec<_>>();

        if !global.is_empty() {
            let locked = global.iter().all(|w| !w.is_editable);
            return (IgnoreState::IgnoredGlobally, locked);
        }

        if self
            .ignored_text_check_words
            .iter()
            .any(|w| w.kind == IgnoredWordType::DocumentationUnit)
        {
            return (IgnoreState::IgnoredInDocument, false);
        }

        if self.is_ignored_once {
            return (IgnoreState::IgnoredOnce, false);
        }

        (IgnoreState::None, false)
    }
}

impl CheckResponse {
    /// Convert records into matches anchored in `text`, ordered by offset.
    ///
    /// Anchors come from explicit offsets when they spell the word, else from
    /// the annotated marker with the same id: the marker's n-th whole-word
    /// occurrence in the HTML maps to the n-th one in `text`. Records without
    /// a resolvable anchor are dropped. A marker flagged `ignored` counts as
    /// ignored once when the record itself carries no ignore information.
    pub fn into_matches(
        self,
        category: &Category,
        text: &str,
        parser: &AnnotatedHtmlParser,
    ) -> Result<Vec<Match>, TextCheckError> {
        let units = utf16_units(text);

        let mut marker_positions: HashMap<u32, usize> = HashMap::new();
        let mut marker_types: HashMap<u32, String> = HashMap::new();
        let mut marker_ignored: HashSet<u32> = HashSet::new();
        let mut occurrences: HashMap<String, Vec<usize>> = HashMap::new();
        let mut cursor = 0;
        for marker in parser.parse(&self.html_text) {
            let Some(id) = marker.id else { continue };
            let starts = occurrences
                .entry(marker.text.clone())
                .or_insert_with(|| whole_word_offsets(text, &marker.text));
            // Markup and plain text disagree: fall back to marker order
            let start = starts
                .get(marker.occurrence)
                .copied()
                .or_else(|| find_whole_word(text, &marker.text, cursor));
            if let Some(start) = start {
                cursor = start + marker.text.encode_utf16().count();
                marker_positions.insert(id, start);
            }
            if marker.ignored {
                marker_ignored.insert(id);
            }
            if !marker.issue_type.is_empty() {
                marker_types.insert(id, marker.issue_type);
            }
        }

        let mut seen = HashSet::new();
        let mut matches = Vec::with_capacity(self.matches.len());

        for record in self.matches {
            if !seen.insert(record.id) {
                return Err(TextCheckError::MalformedResponse(format!(
                    "duplicate match id {}",
                    record.id
                )));
            }
            if record.word.is_empty() {
                return Err(TextCheckError::MalformedResponse(format!(
                    "match {} has an empty word",
                    record.id
                )));
            }
            if let Some(other) = &record.category {
                if other != category {
                    tracing::debug!(match_id = record.id, %other, %category, "skipping match of foreign category");
                    continue;
                }
            }

            let length = record.word.encode_utf16().count();
            let explicit = match (record.offset, record.length) {
                (Some(offset), Some(len)) if span_equals(&units, offset, offset.saturating_add(len), &record.word) => {
                    Some(offset)
                }
                _ => None,
            };
            let offset = explicit.or_else(|| {
                marker_positions
                    .get(&record.id)
                    .copied()
                    .filter(|&start| span_equals(&units, start, start + length, &record.word))
            });

            let Some(offset) = offset else {
                tracing::debug!(match_id = record.id, word = %record.word, "dropping match without anchor");
                continue;
            };

            let (mut ignore_state, locked) = record.ignore_state();
            if ignore_state == IgnoreState::None && marker_ignored.contains(&record.id) {
                ignore_state = IgnoreState::IgnoredOnce;
            }
            let issue_type = record
                .rule
                .map(|rule| rule.issue_type)
                .filter(|t| !t.is_empty())
                .or_else(|| marker_types.remove(&record.id))
                .unwrap_or_default();

            matches.push(Match {
                id: MatchId(record.id),
                word: record.word,
                category: category.clone(),
                message: record.message,
                short_message: record.short_message,
                ignore_state,
                offset,
                length,
                replacements: record.replacements.into_iter().map(ReplacementRecord::into_text).collect(),
                issue_type,
                locked,
            });
        }

        matches.sort_by_key(|m| (m.offset, m.id));
        Ok(matches)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "Das ist ein felher. Das ist ein zweiter felher.";
    const HTML: &str = r#"<p>Das ist ein <text-check id="1" type="misspelling" ignored="false">felher</text-check>. Das ist ein zweiter <text-check id="2" type="misspelling" ignored="false">felher</text-check>.</p>"#;

    fn response(json: &str) -> CheckResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_anchors_from_markers() {
        let resp = response(&format!(
            r#"{{ "htmlText": {html}, "matches": [
                {{ "id": 1, "word": "felher", "message": "Möglicher Tippfehler", "shortMessage": "Rechtschreibfehler", "category": "headnote", "isIgnoredOnce": false }},
                {{ "id": 2, "word": "felher", "category": "headnote" }}
            ] }}"#,
            html = serde_json::to_string(HTML).unwrap()
        ));

        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].offset, 12);
        assert_eq!(matches[1].offset, 40);
        assert_eq!(matches[0].issue_type, "misspelling");
        assert_eq!(matches[0].short_message, "Rechtschreibfehler");
        assert!(matches.iter().all(|m| m.ignore_state == IgnoreState::None));
    }

    #[test]
    fn test_marker_anchors_to_its_own_occurrence() {
        let text = "Ich sehe das Haus, das er kommt.";
        let html = r#"<p>Ich sehe das Haus, <text-check id="1" type="grammar">das</text-check> er kommt.</p>"#;
        let resp = response(&format!(
            r#"{{ "htmlText": {html}, "matches": [ {{ "id": 1, "word": "das" }} ] }}"#,
            html = serde_json::to_string(html).unwrap()
        ));

        let matches = resp
            .into_matches(&Category::from("headnote"), text, &AnnotatedHtmlParser::new())
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].offset, 19);
        assert_eq!(matches[0].issue_type, "grammar");
    }

    #[test]
    fn test_ignored_marker_without_record_state() {
        let html = r#"<p>Das ist ein <text-check id="1" ignored="true">felher</text-check>. Das ist ein zweiter <text-check id="2" ignored="true">felher</text-check>.</p>"#;
        let resp = response(&format!(
            r#"{{ "htmlText": {html}, "matches": [
                {{ "id": 1, "word": "felher" }},
                {{ "id": 2, "word": "felher",
                   "ignoredTextCheckWords": [ {{ "type": "documentation_unit" }} ] }}
            ] }}"#,
            html = serde_json::to_string(html).unwrap()
        ));

        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();

        assert_eq!(matches[0].ignore_state, IgnoreState::IgnoredOnce);
        assert_eq!(matches[1].ignore_state, IgnoreState::IgnoredInDocument);
    }

    #[test]
    fn test_explicit_offsets_win() {
        let resp = response(
            r#"{ "matches": [ { "id": 5, "word": "felher", "offset": 40, "length": 6 } ] }"#,
        );
        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();
        assert_eq!(matches[0].offset, 40);
    }

    #[test]
    fn test_unresolvable_anchor_dropped() {
        let resp = response(r#"{ "matches": [ { "id": 5, "word": "nirgends" } ] }"#);
        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_malformed() {
        let resp = response(
            r#"{ "matches": [
                { "id": 1, "word": "felher", "offset": 12, "length": 6 },
                { "id": 1, "word": "felher", "offset": 40, "length": 6 }
            ] }"#,
        );
        let err = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap_err();
        assert!(matches!(err, TextCheckError::MalformedResponse(_)));
    }

    #[test]
    fn test_ignore_state_precedence() {
        let resp = response(
            r#"{ "matches": [
                { "id": 1, "word": "felher", "offset": 12, "length": 6, "isIgnoredOnce": true },
                { "id": 2, "word": "felher", "offset": 40, "length": 6, "isIgnoredOnce": true,
                  "ignoredTextCheckWords": [ { "type": "documentation_unit", "isEditable": true } ] }
            ] }"#,
        );
        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();
        assert_eq!(matches[0].ignore_state, IgnoreState::IgnoredOnce);
        assert_eq!(matches[1].ignore_state, IgnoreState::IgnoredInDocument);
    }

    #[test]
    fn test_read_only_dictionary_locks_match() {
        let record: MatchRecord = serde_json::from_str(
            r#"{ "id": 1, "word": "felher",
                 "ignoredTextCheckWords": [ { "type": "global_jdv", "isEditable": false } ] }"#,
        )
        .unwrap();
        assert_eq!(record.ignore_state(), (IgnoreState::IgnoredGlobally, true));
    }

    #[test]
    fn test_replacements_accept_both_shapes() {
        let resp = response(
            r#"{ "matches": [ { "id": 1, "word": "felher", "offset": 12, "length": 6,
                 "replacements": ["Fehler", { "value": "Fehlern" }],
                 "rule": { "issueType": "misspelling" } } ] }"#,
        );
        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();
        assert_eq!(matches[0].replacements, vec!["Fehler".to_string(), "Fehlern".to_string()]);
        assert_eq!(matches[0].issue_type, "misspelling");
    }

    #[test]
    fn test_foreign_category_skipped() {
        let resp = response(
            r#"{ "matches": [ { "id": 1, "word": "felher", "offset": 12, "length": 6, "category": "tenor" } ] }"#,
        );
        let matches = resp
            .into_matches(&Category::from("headnote"), TEXT, &AnnotatedHtmlParser::new())
            .unwrap();
        assert!(matches.is_empty());
    }
}
