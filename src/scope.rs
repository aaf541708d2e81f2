//! Access levels and the System > Database > Collection scope hierarchy

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COLLECTION_PREFIX, DATABASE_PREFIX, LEVEL_NONE, LEVEL_RO, LEVEL_RW, MAX_NAME_LEN, SYSTEM_KEY,
};
use crate::error::{Error, Result};

/// Totally ordered access level: `None < ReadOnly < ReadWrite`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AccessLevel {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl AccessLevel {
    pub fn code(self) -> u64 {
        match self {
            AccessLevel::None => LEVEL_NONE,
            AccessLevel::ReadOnly => LEVEL_RO,
            AccessLevel::ReadWrite => LEVEL_RW,
        }
    }

    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            LEVEL_NONE => Ok(AccessLevel::None),
            LEVEL_RO => Ok(AccessLevel::ReadOnly),
            LEVEL_RW => Ok(AccessLevel::ReadWrite),
            _ => Err(Error::Storage(format!("Unknown access level code {}", code))),
        }
    }

    /// Parse the short names used by grant administration: `none`, `ro`, `rw`
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(AccessLevel::None),
            "ro" => Ok(AccessLevel::ReadOnly),
            "rw" => Ok(AccessLevel::ReadWrite),
            _ => Err(Error::Invalid(format!("Unknown access level '{}'", s))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::ReadOnly => "ro",
            AccessLevel::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in the hierarchy at which a grant may be recorded.
///
/// A `Collection` scope is always nested in exactly one `Database` scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    System,
    Database(String),
    Collection(String, String),
}

impl Scope {
    pub fn database(name: impl Into<String>) -> Self {
        Scope::Database(name.into())
    }

    pub fn collection(database: impl Into<String>, name: impl Into<String>) -> Self {
        Scope::Collection(database.into(), name.into())
    }

    /// The next less specific scope, `None` for `System`
    pub fn parent(&self) -> Option<Scope> {
        match self {
            Scope::System => None,
            Scope::Database(_) => Some(Scope::System),
            Scope::Collection(db, _) => Some(Scope::Database(db.clone())),
        }
    }

    /// This scope followed by each ancestor up to `System`
    pub fn path(&self) -> Vec<Scope> {
        let mut path = vec![self.clone()];
        let mut cur = self.parent();
        while let Some(s) = cur {
            cur = s.parent();
            path.push(s);
        }
        path
    }

    /// Reject names that cannot be stored or would break key encoding
    pub fn validate(&self) -> Result<()> {
        match self {
            Scope::System => Ok(()),
            Scope::Database(db) => validate_name("database", db),
            Scope::Collection(db, col) => {
                validate_name("database", db)?;
                validate_name("collection", col)
            }
        }
    }

    pub(crate) fn key(&self) -> String {
        match self {
            Scope::System => SYSTEM_KEY.to_string(),
            Scope::Database(db) => format!("{}{}", DATABASE_PREFIX, db),
            Scope::Collection(db, col) => format!("{}{}:{}", COLLECTION_PREFIX, db, col),
        }
    }

    pub(crate) fn from_key(key: &str) -> Result<Self> {
        if key == SYSTEM_KEY {
            return Ok(Scope::System);
        }
        if let Some(db) = key.strip_prefix(DATABASE_PREFIX) {
            return Ok(Scope::Database(db.to_string()));
        }
        if let Some((db, col)) = key.strip_prefix(COLLECTION_PREFIX).and_then(|r| r.split_once(':')) {
            return Ok(Scope::Collection(db.to_string(), col.to_string()));
        }
        Err(Error::Storage(format!("Malformed scope key '{}'", key)))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::System => f.write_str("_system"),
            Scope::Database(db) => write!(f, "database '{}'", db),
            Scope::Collection(db, col) => write!(f, "collection '{}/{}'", db, col),
        }
    }
}

/// Validate an object or subject name.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Invalid(format!("{} name cannot be empty", kind)));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::Invalid(format!(
            "{} name too long: {} bytes (max {})",
            kind,
            name.len(),
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(|c| c == '/' || c == ':' || c.is_control()) {
        return Err(Error::Invalid(format!(
            "{} name '{}' contains a reserved character",
            kind,
            name.escape_debug()
        )));
    }
    Ok(())
}
