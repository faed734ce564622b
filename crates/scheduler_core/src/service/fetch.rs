//! Backend call failures as seen by the session.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const VALIDATION_MARKER: &str = "FIELD_CUSTOM_VALIDATION_EXCEPTION";

static VALIDATION_MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)FIELD_CUSTOM_VALIDATION_EXCEPTION,\s*(.*?)(?::\s*\[[^\]]*\])?\s*$")
        .expect("valid validation message regex")
});

/// Failure of the data collaborator for one fetch or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Call did not complete.
    Transport(String),
    /// Backend answered with an error message.
    Business(String),
}

impl FetchError {
    /// Message suitable for a toast.
    ///
    /// Validation-rule failures are reduced to the rule's own text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(message) => message.clone(),
            Self::Business(message) => clean_backend_message(message),
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "backend call failed: {message}"),
            Self::Business(message) => write!(f, "backend rejected request: {message}"),
        }
    }
}

impl Error for FetchError {}

/// Strips the platform envelope around custom validation messages.
pub fn clean_backend_message(message: &str) -> String {
    if !message.contains(VALIDATION_MARKER) {
        return message.trim().to_string();
    }
    VALIDATION_MESSAGE_RE
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|text| text.as_str().trim())
        .filter(|text| !text.is_empty())
        .map_or_else(|| message.trim().to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_envelope_is_stripped() {
        let raw = "Insert failed. First exception on row 0; first error: \
                   FIELD_CUSTOM_VALIDATION_EXCEPTION, Room is out of order: []";
        assert_eq!(clean_backend_message(raw), "Room is out of order");
    }

    #[test]
    fn validation_without_field_list_keeps_full_text() {
        let raw = "FIELD_CUSTOM_VALIDATION_EXCEPTION, Dates overlap a stay";
        assert_eq!(clean_backend_message(raw), "Dates overlap a stay");
    }

    #[test]
    fn other_messages_pass_through() {
        let error = FetchError::Business(" Unable to lock row ".to_string());
        assert_eq!(error.user_message(), "Unable to lock row");
        assert_eq!(
            FetchError::Transport("timeout".to_string()).user_message(),
            "timeout"
        );
    }
}
