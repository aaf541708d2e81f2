//! Engine: one opened environment plus the components built on it

use crate::catalog::Catalog;
use crate::config::{Config, PollConfig};
use crate::db::Store;
use crate::error::Result;
use crate::gate::OperationGate;
use crate::grants::GrantStore;
use crate::keyspace::KeySpaces;
use crate::resolve::Resolver;

/// Cheap to clone; clones share storage and key spaces
#[derive(Clone)]
pub struct Engine {
    store: Store,
    keyspaces: KeySpaces,
    poll: PollConfig,
}

impl Engine {
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Engine {
            store: Store::open(config)?,
            keyspaces: KeySpaces::new(),
            poll: config.poll,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn grants(&self) -> GrantStore {
        GrantStore::new(self.store.clone())
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.store.clone())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.store.clone())
    }

    pub fn gate(&self) -> OperationGate {
        OperationGate::new(self.store.clone())
    }

    pub fn keyspaces(&self) -> &KeySpaces {
        &self.keyspaces
    }

    pub fn poll(&self) -> PollConfig {
        self.poll
    }
}
