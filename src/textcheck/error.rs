use thiserror::Error;

use super::types::{Category, MatchId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextCheckError {
    #[error("Check request failed: {0}")]
    CheckFailed(String),

    #[error("Malformed check response: {0}")]
    MalformedResponse(String),

    #[error("Could not save ignore decision: {0}")]
    PersistFailed(String),

    #[error("No match {match_id} in category {category}")]
    MatchNotFound { category: Category, match_id: MatchId },

    #[error("No decision surface is open")]
    NoDecisionOpen,

    #[error("Option not offered for this match: {0}")]
    OptionNotOffered(String),

    #[error("Text too long for check: {len} > {max} units")]
    TextTooLong { len: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid edit: {0}")]
    InvalidEdit(String),
}
