//! Subject identity types shared by the credential and dashboard layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric identifier of an account (the `userId` claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(i64);

impl SubjectId {
    /// Wraps a raw account id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw account id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for SubjectId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a subject id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid subject id: {input}")]
pub struct ParseSubjectIdError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for SubjectId {
    type Err = ParseSubjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ParseSubjectIdError {
                input: s.to_string(),
            })
    }
}

/// Identity decoded from a verified credential.
///
/// This is the value the credential cache memoizes; it never carries
/// credential material itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Account id.
    #[serde(rename = "userId")]
    pub subject_id: SubjectId,

    /// Account email (the token `sub` claim).
    pub email: String,

    /// Display name (the token `nickname` claim).
    #[serde(rename = "nickname")]
    pub display_name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(
        subject_id: impl Into<SubjectId>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}
