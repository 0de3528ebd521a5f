//! Strongly typed identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire form of [`Subject::Application`].
pub const APPLICATION_SUBJECT: &str = "-user";

/// Identifier of a connected app. Equal to its callback slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Principal a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    /// A human user, by user id.
    User(String),
    /// The application itself (client-credentials tokens).
    Application,
}

impl Subject {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    #[must_use]
    pub const fn is_application(&self) -> bool {
        matches!(self, Self::Application)
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        if value == APPLICATION_SUBJECT { Self::Application } else { Self::User(value) }
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        match value {
            Subject::User(user) => user,
            Subject::Application => APPLICATION_SUBJECT.to_string(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => f.write_str(user),
            Self::Application => f.write_str(APPLICATION_SUBJECT),
        }
    }
}

/// Composite identity of a token cache row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub app: AppId,
    pub subject: Subject,
}

impl TokenKey {
    #[must_use]
    pub const fn new(app: AppId, subject: Subject) -> Self {
        Self { app, subject }
    }

    /// Row name: `<app>-<user>`, or `<app>-user` for the application itself.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.subject {
            Subject::User(user) => format!("{}-{}", self.app, user),
            Subject::Application => format!("{}{}", self.app, APPLICATION_SUBJECT),
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
