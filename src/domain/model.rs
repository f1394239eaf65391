use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Requesting identity that owns a saved set (a chat user id).
pub type OwnerId = i64;

/// Canonical digit-only token. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Builds an identifier from already-canonical input; `None` unless every
    /// character is an ASCII digit and there is at least one.
    pub fn from_digits(digits: &str) -> Option<Self> {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(digits.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Positive,
    Negative,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub classification: Classification,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub id: Identifier,
    pub classification: Classification,
}

impl ProbeResult {
    pub fn new(id: Identifier, classification: Classification) -> Self {
        Self { id, classification }
    }
}

/// Account binding per positive identifier: `Some(true)` connected to an
/// account, `Some(false)` free, `None` looked up but undetermined.
/// Identifiers without an entry are rendered unannotated.
pub type Annotations = HashMap<Identifier, Option<bool>>;

/// Raw observation handed back by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Per-probe failure classes. These never leave the prober.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub total: usize,
    /// Canonical identifiers dropped because the set was full.
    pub overflow: usize,
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    pub removed: usize,
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rejects_non_digits() {
        assert!(Identifier::from_digits("888123").is_some());
        assert!(Identifier::from_digits("").is_none());
        assert!(Identifier::from_digits("+888").is_none());
    }

    #[test]
    fn classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}
