use thiserror::Error;

/// Reasons a notification text did not match the expected grammar.
///
/// Every variant is terminal: a message that fails to parse is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 3 lines (title, text, timestamp), got {lines}: {text:?}")]
    Layout { lines: usize, text: String },

    #[error("title line not recognized: {0:?}")]
    Title(String),

    #[error("notification text does not match: {0:?}")]
    Body(String),

    #[error("invalid amount {0:?}")]
    Amount(String),

    #[error("invalid date {0:?} (expected DD-MM-YYYY)")]
    Date(String),

    #[error("invalid time {0:?} (expected HH:MM:SS)")]
    Time(String),

    #[error("invalid timestamp line: {0:?}")]
    Timestamp(String),

    #[error("no notification grammar for bank {0:?}")]
    UnknownBank(String),
}

/// Longest slice of offending text kept in an error.
const EXCERPT_CHARS: usize = 120;

/// First [`EXCERPT_CHARS`] characters of `text`, with an ellipsis when cut.
pub(crate) fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
