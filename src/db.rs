//! LMDB environment, table handles and transaction helpers

use std::sync::Arc;

use byteorder::BigEndian;
use heed::types::{Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::config::Config;
use crate::constants::META_NEXT_ID;
use crate::error::{err, Result};

// Database type aliases
pub type Db = Database<Str, U64<BigEndian>>;
pub type DbStr = Database<Str, Str>;

/// Join two key parts. Names never contain `/`, so the join is unambiguous.
#[inline]
pub fn key(a: &str, b: &str) -> String {
    format!("{}/{}", a, b)
}

/// Bidirectional index: fwd[a/b] and rev[b/a] stay in sync
pub struct BiPair {
    pub fwd: Db,
    pub rev: Db,
}

impl BiPair {
    #[inline]
    pub fn get(&self, tx: &RoTxn, a: &str, b: &str) -> Result<Option<u64>> {
        self.fwd.get(tx, &key(a, b)).map_err(err)
    }

    #[inline]
    pub fn put(&self, tx: &mut RwTxn, a: &str, b: &str, v: u64) -> Result<()> {
        self.fwd.put(tx, &key(a, b), &v).map_err(err)?;
        self.rev.put(tx, &key(b, a), &v).map_err(err)
    }

    #[inline]
    pub fn del(&self, tx: &mut RwTxn, a: &str, b: &str) -> Result<bool> {
        let r = self.fwd.delete(tx, &key(a, b)).map_err(err)?;
        self.rev.delete(tx, &key(b, a)).map_err(err)?;
        Ok(r)
    }

    pub fn list_fwd(&self, tx: &RoTxn, a: &str) -> Result<Vec<(String, u64)>> {
        list_pfx(tx, &self.fwd, a)
    }

    pub fn list_rev(&self, tx: &RoTxn, b: &str) -> Result<Vec<(String, u64)>> {
        list_pfx(tx, &self.rev, b)
    }
}

/// All entries under `pfx/`, returned as (suffix, value)
pub fn list_pfx(tx: &RoTxn, db: &Db, pfx: &str) -> Result<Vec<(String, u64)>> {
    let pfx = format!("{}/", pfx);
    let mut r = Vec::new();
    for item in db.prefix_iter(tx, pfx.as_str()).map_err(err)? {
        let (k, v) = item.map_err(err)?;
        r.push((k[pfx.len()..].to_string(), v));
    }
    Ok(r)
}

/// All keys starting with `pfx` in a string table
pub fn keys_with_prefix(tx: &RoTxn, db: &DbStr, pfx: &str) -> Result<Vec<String>> {
    let mut r = Vec::new();
    for item in db.prefix_iter(tx, pfx).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        r.push(k.to_string());
    }
    Ok(r)
}

/// All database handles
pub struct Dbs {
    /// subject/scope -> level, and scope/subject -> level
    pub grants: BiPair,
    /// user/role -> 1
    pub members: Db,
    /// database -> JSON record
    pub databases: DbStr,
    /// db/collection -> JSON record
    pub collections: DbStr,
    /// db/collection/key -> JSON document
    pub documents: DbStr,
    /// db/view -> JSON record
    pub views: DbStr,
    pub meta: DbStr,
}

/// Handle to an opened environment. Cheap to clone; clones share the env.
#[derive(Clone)]
pub struct Store {
    env: Env,
    dbs: Arc<Dbs>,
}

impl Store {
    /// Open (or create) the environment described by `config`
    pub fn open(config: &Config) -> Result<Store> {
        std::fs::create_dir_all(&config.path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_dbs(config.max_dbs)
                .open(&config.path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            grants: BiPair {
                fwd: env.create_database(&mut tx, Some("grants")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("grants_rev")).map_err(err)?,
            },
            members: env.create_database(&mut tx, Some("members")).map_err(err)?,
            databases: env.create_database(&mut tx, Some("databases")).map_err(err)?,
            collections: env.create_database(&mut tx, Some("collections")).map_err(err)?,
            documents: env.create_database(&mut tx, Some("documents")).map_err(err)?,
            views: env.create_database(&mut tx, Some("views")).map_err(err)?,
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        tracing::debug!(path = %config.path.display(), "opened environment");
        Ok(Store { env, dbs: Arc::new(dbs) })
    }

    /// Execute a read-only operation against one consistent snapshot
    #[inline]
    pub fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&self.dbs, &tx)
    }

    /// Execute a write operation; committed only if `f` succeeds
    #[inline]
    pub fn write<T, F: FnOnce(&Dbs, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let r = f(&self.dbs, &mut tx)?;
        tx.commit().map_err(err)?;
        Ok(r)
    }

    /// Clear all tables (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.write(|d, tx| {
            d.grants.fwd.clear(tx).map_err(err)?;
            d.grants.rev.clear(tx).map_err(err)?;
            d.members.clear(tx).map_err(err)?;
            d.databases.clear(tx).map_err(err)?;
            d.collections.clear(tx).map_err(err)?;
            d.documents.clear(tx).map_err(err)?;
            d.views.clear(tx).map_err(err)?;
            d.meta.clear(tx).map_err(err)
        })
    }
}

/// Allocate the next object id inside a write transaction
pub(crate) fn next_id(d: &Dbs, tx: &mut RwTxn) -> Result<u64> {
    let id = d
        .meta
        .get(tx, META_NEXT_ID)
        .map_err(err)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(1u64);
    d.meta.put(tx, META_NEXT_ID, &(id + 1).to_string()).map_err(err)?;
    Ok(id)
}
