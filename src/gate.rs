//! Operation gate: every protected mutation declares the (scope, level) pairs
//! it needs, and runs only when the caller's effective access meets all of them.

use std::collections::BTreeSet;

use heed::RoTxn;

use crate::db::{Dbs, Store};
use crate::error::{Error, Result};
use crate::resolve::resolve;
use crate::scope::{AccessLevel, Scope};
use crate::subject::Identity;

/// An administrative operation, carrying what its requirements depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `links`: collections named by the initial properties
    CreateView { database: String, links: Vec<String> },
    DropView { database: String },
    ReadView { database: String },
    RenameView { database: String },
    /// Partial update; `links`: collections the patch sets or removes
    UpdateProperties { database: String, links: Vec<String> },
    /// Full replace; `linked`: collections linked right now, which the replace
    /// may silently drop or reset
    ReplaceProperties {
        database: String,
        linked: Vec<String>,
        links: Vec<String>,
    },
    /// Deferred execution admission
    RegisterTask { database: String },
    /// Grant, revoke and role membership changes
    AdministerGrants,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateView { .. } => "create_view",
            Operation::DropView { .. } => "drop_view",
            Operation::ReadView { .. } => "read_view",
            Operation::RenameView { .. } => "rename_view",
            Operation::UpdateProperties { .. } => "update_properties",
            Operation::ReplaceProperties { .. } => "replace_properties",
            Operation::RegisterTask { .. } => "register_task",
            Operation::AdministerGrants => "administer_grants",
        }
    }

    /// The static requirement table
    pub fn requirements(&self) -> Vec<(Scope, AccessLevel)> {
        let rw = AccessLevel::ReadWrite;
        match self {
            Operation::ReadView { database } => vec![(Scope::database(database), AccessLevel::ReadOnly)],
            Operation::DropView { database }
            | Operation::RenameView { database }
            | Operation::RegisterTask { database } => vec![(Scope::database(database), rw)],
            Operation::CreateView { database, links } | Operation::UpdateProperties { database, links } => {
                with_collections(database, links.iter())
            }
            Operation::ReplaceProperties { database, linked, links } => {
                with_collections(database, linked.iter().chain(links.iter()))
            }
            Operation::AdministerGrants => vec![(Scope::System, rw)],
        }
    }
}

fn with_collections<'a, I: Iterator<Item = &'a String>>(database: &str, cols: I) -> Vec<(Scope, AccessLevel)> {
    let cols: BTreeSet<&String> = cols.collect();
    let mut reqs = vec![(Scope::database(database), AccessLevel::ReadWrite)];
    reqs.extend(cols.into_iter().map(|c| (Scope::collection(database, c.as_str()), AccessLevel::ReadWrite)));
    reqs
}

#[derive(Clone)]
pub struct OperationGate {
    store: Store,
}

impl OperationGate {
    pub fn new(store: Store) -> Self {
        OperationGate { store }
    }

    /// Check every requirement of `op` for `identity`.
    ///
    /// All requirements are resolved against one snapshot. Any shortfall is
    /// reported as a bare `Forbidden`; which scope failed is only logged.
    pub fn authorize(&self, identity: &Identity, op: &Operation) -> Result<()> {
        self.store.read(|d, tx| authorize_in(d, tx, identity, op))
    }

    /// Authorize, then run `apply` exactly once. On denial `apply` never runs.
    /// The result of `apply` is returned unchanged.
    pub fn authorize_and_apply<T, F>(&self, identity: &Identity, op: &Operation, apply: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.authorize(identity, op)?;
        apply()
    }
}

/// Authorize inside an existing transaction, so the decision and whatever the
/// caller reads alongside it share one snapshot
pub(crate) fn authorize_in(d: &Dbs, tx: &RoTxn, identity: &Identity, op: &Operation) -> Result<()> {
    let subject = identity.subject();
    for (scope, required) in op.requirements() {
        let effective = resolve(d, tx, &subject, &scope)?;
        if effective < required {
            tracing::debug!(
                user = %identity,
                op = op.name(),
                %scope,
                %required,
                %effective,
                "forbidden"
            );
            return Err(Error::Forbidden);
        }
    }
    tracing::debug!(user = %identity, op = op.name(), "authorized");
    Ok(())
}
