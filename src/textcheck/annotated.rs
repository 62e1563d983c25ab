//! Annotated HTML marker parsing
//!
//! The check endpoint returns the checked field as HTML in which every
//! flagged span is wrapped as
//! `<text-check id="1" type="misspelling" ignored="false">felher</text-check>`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::text::whole_word_offsets;

/// One inline marker found in annotated HTML, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCheckMarker {
    pub id: Option<u32>,
    pub issue_type: String,
    pub ignored: bool,
    /// Marker content with tags stripped and entities decoded
    pub text: String,
    /// Whole-word occurrences of `text` in the plain text before the marker
    pub occurrence: usize,
}

pub struct AnnotatedHtmlParser {
    marker_re: Regex,
    attr_re: Regex,
    tag_re: Regex,
}

impl Default for AnnotatedHtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotatedHtmlParser {
    pub fn new() -> Self {
        // Group 1: attributes, Group 2: content (may contain nested inline tags)
        let marker_re = Regex::new(r"(?s)<text-check\b([^>]*)>(.*?)</text-check>")
            .expect("Marker regex should compile");
        let attr_re = Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*"([^"]*)""#)
            .expect("Attribute regex should compile");
        let tag_re = Regex::new(r"<[^>]*>").expect("Tag regex should compile");

        Self { marker_re, attr_re, tag_re }
    }

    /// Markup stripped, entities decoded
    fn plain(&self, html: &str) -> String {
        decode_entities(&self.tag_re.replace_all(html, ""))
    }

    pub fn parse(&self, html: &str) -> Vec<TextCheckMarker> {
        // Plain text of everything before the current marker
        let mut preceding = String::new();
        let mut last_end = 0;

        self.marker_re
            .captures_iter(html)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let attrs = cap.get(1)?.as_str();
                let content = cap.get(2)?.as_str();

                preceding.push_str(&self.plain(&html[last_end..whole.start()]));
                last_end = whole.end();

                let text = self.plain(content);
                let occurrence = whole_word_offsets(&preceding, &text).len();
                preceding.push_str(&text);

                let mut marker = TextCheckMarker {
                    id: None,
                    issue_type: String::new(),
                    ignored: false,
                    text,
                    occurrence,
                };

                for attr in self.attr_re.captures_iter(attrs) {
                    let value = &attr[2];
                    match &attr[1] {
                        "id" => marker.id = value.parse().ok(),
                        "type" => marker.issue_type = value.to_string(),
                        "ignored" => marker.ignored = value == "true",
                        _ => {}
                    }
                }

                if marker.text.is_empty() {
                    return None;
                }
                Some(marker)
            })
            .collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
