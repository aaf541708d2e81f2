//! Grant subjects and caller identities

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ROLE_PREFIX, USER_PREFIX};
use crate::error::{Error, Result};
use crate::scope::validate_name;

/// Holder of a grant: a user, or a role whose grants apply to all its members
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    User(String),
    Role(String),
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Subject::User(name.into())
    }

    pub fn role(name: impl Into<String>) -> Self {
        Subject::Role(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Subject::User(n) | Subject::Role(n) => n,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Subject::User(n) => validate_name("user", n),
            Subject::Role(n) => validate_name("role", n),
        }
    }

    pub(crate) fn key(&self) -> String {
        match self {
            Subject::User(n) => format!("{}{}", USER_PREFIX, n),
            Subject::Role(n) => format!("{}{}", ROLE_PREFIX, n),
        }
    }

    pub(crate) fn from_key(key: &str) -> Result<Self> {
        if let Some(n) = key.strip_prefix(USER_PREFIX) {
            Ok(Subject::User(n.to_string()))
        } else if let Some(n) = key.strip_prefix(ROLE_PREFIX) {
            Ok(Subject::Role(n.to_string()))
        } else {
            Err(Error::Storage(format!("Malformed subject key '{}'", key)))
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(n) => write!(f, "user '{}'", n),
            Subject::Role(n) => write!(f, "role '{}'", n),
        }
    }
}

/// The user on whose behalf an operation runs. Passed explicitly to every
/// protected call and captured by value into deferred tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    user: String,
}

impl Identity {
    pub fn user(name: impl Into<String>) -> Self {
        Identity { user: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.user
    }

    pub fn subject(&self) -> Subject {
        Subject::User(self.user.clone())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}
