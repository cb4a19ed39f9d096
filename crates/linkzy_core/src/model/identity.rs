//! User identity model.
//!
//! # Responsibility
//! - Wrap the opaque identifier issued by the auth provider.
//! - Carry the optional email used for partner lookup.
//!
//! # Invariants
//! - A `UserId` is never empty and never contains the pair separator.
//! - Identifiers are compared byte-wise; no case folding is applied.

use crate::model::pair::PAIR_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque user identifier issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Reasons a raw string cannot become a `UserId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    Empty,
    ContainsSeparator(String),
}

impl Display for UserIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "user id cannot be empty"),
            Self::ContainsSeparator(value) => write!(
                f,
                "user id `{value}` contains reserved separator `{PAIR_SEPARATOR}`"
            ),
        }
    }
}

impl Error for UserIdError {}

impl UserId {
    /// Parses an identifier, trimming surrounding whitespace.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, UserIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(UserIdError::Empty);
        }
        if trimmed.contains(PAIR_SEPARATOR) {
            return Err(UserIdError::ContainsSeparator(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Issues a fresh random identifier.
    ///
    /// Uses the simple (hyphen-free) UUID form; it never contains the
    /// pair separator.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Signed-in user as seen by application logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: UserId,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: UserId, email: Option<String>) -> Self {
        Self { uid, email }
    }

    /// Display name derived from the local part of the email.
    ///
    /// Falls back to `User` when no email is known.
    pub fn username(&self) -> &str {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
    }
}
