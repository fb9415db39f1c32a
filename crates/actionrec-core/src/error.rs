//! Structured errors shared by recorders, storage backends and the CLI

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Operation is not valid for the current session state
    InvalidState,
    /// Playback requested but nothing has been persisted
    EmptySequence,
    /// Storage insert/read failed
    PersistenceFailure,
    /// The playback trigger callback failed
    TriggerFailure,
    InvalidConfig,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidState,
            format!("cannot {} while {}", operation, state),
        )
    }

    pub fn empty_sequence(name: &str) -> Self {
        Self::new(
            ErrorCode::EmptySequence,
            format!("no persisted events in sequence '{}'", name),
        )
        .with_suggestions(vec![
            "record at least one action before starting playback".to_string(),
        ])
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceFailure, message)
    }

    pub fn trigger_failed(reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::TriggerFailure,
            format!("trigger callback failed: {}", reason),
        )
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    pub fn is_persistence(&self) -> bool {
        self.code == ErrorCode::PersistenceFailure
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(inner) => inner,
            Err(e) => Self::new(ErrorCode::Unknown, format!("{:#}", e)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::persistence(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::persistence(format!("malformed record: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::invalid_state("start recording", "recording");
        assert_eq!(
            e.to_string(),
            "[InvalidState] cannot start recording while recording"
        );
    }

    #[test]
    fn serializes_code_in_screaming_case() {
        let e = Error::empty_sequence("action_record_data_0");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["code"], "EMPTY_SEQUENCE");
        assert_eq!(v["suggestions"].as_array().unwrap().len(), 1);
        assert!(v.get("context").is_none());
    }

    #[test]
    fn anyhow_roundtrip_keeps_code() {
        let original = Error::persistence("disk full");
        let wrapped: anyhow::Error = original.into();
        let back = Error::from(wrapped);
        assert_eq!(back.code, ErrorCode::PersistenceFailure);

        let foreign = Error::from(anyhow::anyhow!("boom"));
        assert_eq!(foreign.code, ErrorCode::Unknown);
        assert_eq!(foreign.message, "boom");
    }
}
