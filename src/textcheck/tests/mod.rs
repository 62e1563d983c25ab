mod check_cycle_tests;

use crate::textcheck::response::CheckResponse;

pub(super) const TEXT: &str = "Das ist ein felher. Das ist ein zweiter felher.";

/// Response for TEXT as the check endpoint sends it: annotated HTML, no offsets
pub(super) fn felher_response(first_ignored_once: bool) -> CheckResponse {
    let json = serde_json::json!({
        "htmlText": format!(
            "<p>Das ist ein <text-check id=\"1\" type=\"misspelling\" ignored=\"{}\">felher</text-check>. \
             Das ist ein zweiter <text-check id=\"2\" type=\"misspelling\">felher</text-check>.</p>",
            first_ignored_once
        ),
        "matches": [
            {
                "id": 1,
                "word": "felher",
                "message": "Möglicher Tippfehler gefunden.",
                "shortMessage": "Rechtschreibfehler",
                "isIgnoredOnce": first_ignored_once,
                "replacements": [{ "value": "Fehler" }, { "value": "Felder" }],
                "rule": { "issueType": "misspelling" }
            },
            {
                "id": 2,
                "word": "felher",
                "message": "Möglicher Tippfehler gefunden.",
                "shortMessage": "Rechtschreibfehler",
                "replacements": [{ "value": "Fehler" }],
                "rule": { "issueType": "misspelling" }
            }
        ]
    });
    serde_json::from_value(json).unwrap()
}
