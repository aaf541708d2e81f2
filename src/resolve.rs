//! Effective access resolution.
//!
//! Walks from the requested scope up to `System`. At each level a direct user
//! grant is authoritative; failing that, the most permissive grant among the
//! user's roles at that level is. The first level holding any grant ends the
//! walk, so an explicit `None` on a collection masks a `ReadWrite` on its
//! database, while a missing grant defers to the parent.

use heed::RoTxn;

use crate::db::{Dbs, Store};
use crate::error::Result;
use crate::grants::{get_in, roles_of_in};
use crate::scope::{AccessLevel, Scope};
use crate::subject::Subject;

#[derive(Clone)]
pub struct Resolver {
    store: Store,
}

impl Resolver {
    pub fn new(store: Store) -> Self {
        Resolver { store }
    }

    /// Effective access of `subject` at `scope`, computed from one snapshot
    pub fn effective_access(&self, subject: &Subject, scope: &Scope) -> Result<AccessLevel> {
        self.store.read(|d, tx| resolve(d, tx, subject, scope))
    }

    /// Check if subject's effective access at scope reaches `required`
    pub fn check(&self, subject: &Subject, scope: &Scope, required: AccessLevel) -> Result<bool> {
        Ok(self.effective_access(subject, scope)? >= required)
    }
}

/// Resolve inside an existing read transaction
pub(crate) fn resolve(d: &Dbs, tx: &RoTxn, subject: &Subject, scope: &Scope) -> Result<AccessLevel> {
    let roles: Vec<Subject> = match subject {
        Subject::User(name) => roles_of_in(d, tx, name)?.into_iter().map(Subject::Role).collect(),
        Subject::Role(_) => Vec::new(),
    };
    for level_scope in scope.path() {
        if let Some(level) = get_in(d, tx, subject, &level_scope)? {
            return Ok(level);
        }
        let mut best: Option<AccessLevel> = None;
        for role in &roles {
            if let Some(level) = get_in(d, tx, role, &level_scope)? {
                best = Some(best.map_or(level, |b| b.max(level)));
            }
        }
        if let Some(level) = best {
            return Ok(level);
        }
    }
    Ok(AccessLevel::None)
}
