//! Grant storage: at most one level per (subject, scope), plus role membership.
//!
//! Lookups here never fall back to a parent scope; that is the resolver's job.

use heed::{RoTxn, RwTxn};

use crate::db::{key, list_pfx, Dbs, Store};
use crate::error::{err, Result};
use crate::scope::{validate_name, AccessLevel, Scope};
use crate::subject::Subject;

#[derive(Clone)]
pub struct GrantStore {
    store: Store,
}

impl GrantStore {
    pub fn new(store: Store) -> Self {
        GrantStore { store }
    }

    /// Upsert a grant, replacing any level stored at the same (subject, scope)
    pub fn put(&self, subject: &Subject, scope: &Scope, level: AccessLevel) -> Result<()> {
        subject.validate()?;
        scope.validate()?;
        self.store.write(|d, tx| put_in(d, tx, subject, scope, level))?;
        tracing::debug!(%subject, %scope, %level, "grant stored");
        Ok(())
    }

    /// The grant stored at exactly this scope, if any
    pub fn get(&self, subject: &Subject, scope: &Scope) -> Result<Option<AccessLevel>> {
        self.store.read(|d, tx| get_in(d, tx, subject, scope))
    }

    pub fn remove(&self, subject: &Subject, scope: &Scope) -> Result<bool> {
        let removed = self.store.write(|d, tx| d.grants.del(tx, &subject.key(), &scope.key()))?;
        if removed {
            tracing::debug!(%subject, %scope, "grant removed");
        }
        Ok(removed)
    }

    /// Every grant held directly by `subject`
    pub fn list_for_subject(&self, subject: &Subject) -> Result<Vec<(Scope, AccessLevel)>> {
        self.store.read(|d, tx| {
            d.grants
                .list_fwd(tx, &subject.key())?
                .into_iter()
                .map(|(s, v)| -> Result<(Scope, AccessLevel)> {
                    Ok((Scope::from_key(&s)?, AccessLevel::from_code(v)?))
                })
                .collect()
        })
    }

    /// Every subject holding a grant at exactly `scope`
    pub fn list_for_scope(&self, scope: &Scope) -> Result<Vec<(Subject, AccessLevel)>> {
        self.store.read(|d, tx| {
            d.grants
                .list_rev(tx, &scope.key())?
                .into_iter()
                .map(|(s, v)| -> Result<(Subject, AccessLevel)> {
                    Ok((Subject::from_key(&s)?, AccessLevel::from_code(v)?))
                })
                .collect()
        })
    }

    /// Remove every grant recorded at exactly `scope`
    pub fn purge_scope(&self, scope: &Scope) -> Result<usize> {
        self.store.write(|d, tx| purge_scope_in(d, tx, scope))
    }

    // Role membership

    pub fn add_member(&self, user: &str, role: &str) -> Result<()> {
        validate_name("user", user)?;
        validate_name("role", role)?;
        self.store
            .write(|d, tx| d.members.put(tx, &key(user, role), &1).map_err(err))?;
        tracing::debug!(user, role, "role member added");
        Ok(())
    }

    pub fn remove_member(&self, user: &str, role: &str) -> Result<bool> {
        self.store
            .write(|d, tx| d.members.delete(tx, &key(user, role)).map_err(err))
    }

    pub fn roles_of(&self, user: &str) -> Result<Vec<String>> {
        self.store.read(|d, tx| roles_of_in(d, tx, user))
    }

    pub fn members_of(&self, role: &str) -> Result<Vec<String>> {
        self.store.read(|d, tx| members_of_in(d, tx, role))
    }
}

pub(crate) fn get_in(d: &Dbs, tx: &RoTxn, subject: &Subject, scope: &Scope) -> Result<Option<AccessLevel>> {
    d.grants
        .get(tx, &subject.key(), &scope.key())?
        .map(AccessLevel::from_code)
        .transpose()
}

pub(crate) fn put_in(d: &Dbs, tx: &mut RwTxn, subject: &Subject, scope: &Scope, level: AccessLevel) -> Result<()> {
    d.grants.put(tx, &subject.key(), &scope.key(), level.code())
}

pub(crate) fn roles_of_in(d: &Dbs, tx: &RoTxn, user: &str) -> Result<Vec<String>> {
    Ok(list_pfx(tx, &d.members, user)?.into_iter().map(|(r, _)| r).collect())
}

pub(crate) fn purge_scope_in(d: &Dbs, tx: &mut RwTxn, scope: &Scope) -> Result<usize> {
    let scope_key = scope.key();
    let holders = d.grants.list_rev(tx, &scope_key)?;
    for (subject, _) in &holders {
        d.grants.del(tx, subject, &scope_key)?;
    }
    Ok(holders.len())
}

/// Users holding `role` (full scan; membership is keyed by user)
pub(crate) fn members_of_in(d: &Dbs, tx: &RoTxn, role: &str) -> Result<Vec<String>> {
    let mut users = Vec::new();
    for item in d.members.iter(tx).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        if let Some((user, r)) = k.split_once('/') {
            if r == role {
                users.push(user.to_string());
            }
        }
    }
    Ok(users)
}
