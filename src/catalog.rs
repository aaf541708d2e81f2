//! Databases, collections, documents and views (no permission checks).
//!
//! Storage patterns:
//! - `db` -> database record
//! - `db/collection` -> collection record
//! - `db/collection/key` -> document
//! - `db/view` -> view record (properties included)

use heed::{RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db::{key, keys_with_prefix, next_id, DbStr, Dbs, Store};
use crate::error::{err, Error, Result};
use crate::grants::purge_scope_in;
use crate::scope::{validate_name, Scope};
use crate::view::{ViewProperties, ViewType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub database: String,
    pub name: String,
}

/// A view. `id` survives renames; `name` does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: u64,
    pub database: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    pub properties: ViewProperties,
}

#[derive(Clone)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn new(store: Store) -> Self {
        Catalog { store }
    }

    // ========================================================================
    // Databases
    // ========================================================================

    pub fn create_database(&self, name: &str) -> Result<DatabaseInfo> {
        validate_name("database", name)?;
        let db = self.store.write(|d, tx| {
            if d.databases.get(tx, name).map_err(err)?.is_some() {
                return Err(Error::Conflict(format!("database '{}' already exists", name)));
            }
            let db = DatabaseInfo { id: next_id(d, tx)?, name: name.to_string() };
            put_json(tx, &d.databases, name, &db)?;
            Ok(db)
        })?;
        tracing::info!(database = name, "database created");
        Ok(db)
    }

    pub fn database_exists(&self, name: &str) -> Result<bool> {
        self.store.read(|d, tx| database_exists_in(d, tx, name))
    }

    /// Drop a database with all its collections, documents, views and grants
    pub fn drop_database(&self, name: &str) -> Result<()> {
        self.store.write(|d, tx| {
            if !d.databases.delete(tx, name).map_err(err)? {
                return Err(Error::NotFound(format!("database '{}'", name)));
            }
            let pfx = format!("{}/", name);
            for k in keys_with_prefix(tx, &d.collections, &pfx)? {
                let col = &k[pfx.len()..];
                purge_scope_in(d, tx, &Scope::collection(name, col))?;
                d.collections.delete(tx, &k).map_err(err)?;
            }
            for k in keys_with_prefix(tx, &d.documents, &pfx)? {
                d.documents.delete(tx, &k).map_err(err)?;
            }
            for k in keys_with_prefix(tx, &d.views, &pfx)? {
                d.views.delete(tx, &k).map_err(err)?;
            }
            purge_scope_in(d, tx, &Scope::database(name))?;
            Ok(())
        })?;
        tracing::info!(database = name, "database dropped");
        Ok(())
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub fn create_collection(&self, database: &str, name: &str) -> Result<Collection> {
        validate_name("collection", name)?;
        let col = self.store.write(|d, tx| {
            require_database(d, tx, database)?;
            let k = key(database, name);
            if d.collections.get(tx, &k).map_err(err)?.is_some() {
                return Err(Error::Conflict(format!("collection '{}' already exists", name)));
            }
            let col = Collection {
                id: next_id(d, tx)?,
                database: database.to_string(),
                name: name.to_string(),
            };
            put_json(tx, &d.collections, &k, &col)?;
            Ok(col)
        })?;
        tracing::info!(database, collection = name, "collection created");
        Ok(col)
    }

    pub fn collection(&self, database: &str, name: &str) -> Result<Option<Collection>> {
        self.store
            .read(|d, tx| get_json(tx, &d.collections, &key(database, name)))
    }

    /// Drop a collection. Grants at its scope are purged and every view of the
    /// database loses its link to it, in the same transaction.
    pub fn drop_collection(&self, database: &str, name: &str) -> Result<()> {
        self.store.write(|d, tx| {
            if !d.collections.delete(tx, &key(database, name)).map_err(err)? {
                return Err(Error::NotFound(format!("collection '{}'", name)));
            }
            for k in keys_with_prefix(tx, &d.documents, &format!("{}/{}/", database, name))? {
                d.documents.delete(tx, &k).map_err(err)?;
            }
            purge_scope_in(d, tx, &Scope::collection(database, name))?;
            for k in keys_with_prefix(tx, &d.views, &format!("{}/", database))? {
                if let Some(mut view) = get_json::<View>(tx, &d.views, &k)? {
                    if view.properties.links.remove(name).is_some() {
                        tracing::debug!(view = %view.name, collection = name, "link dropped with collection");
                        put_json(tx, &d.views, &k, &view)?;
                    }
                }
            }
            Ok(())
        })?;
        tracing::info!(database, collection = name, "collection dropped");
        Ok(())
    }

    /// Remove all documents, returning how many were removed
    pub fn truncate_collection(&self, database: &str, name: &str) -> Result<usize> {
        self.store.write(|d, tx| {
            require_collection(d, tx, database, name)?;
            let keys = keys_with_prefix(tx, &d.documents, &format!("{}/{}/", database, name))?;
            for k in &keys {
                d.documents.delete(tx, k).map_err(err)?;
            }
            Ok(keys.len())
        })
    }

    /// Insert a document. A string `_key` is used as-is, otherwise one is assigned.
    pub fn insert_document(&self, database: &str, collection: &str, doc: &serde_json::Value) -> Result<String> {
        if !doc.is_object() {
            return Err(Error::Invalid("document must be an object".into()));
        }
        let explicit = match doc.get("_key") {
            Some(serde_json::Value::String(k)) => {
                validate_name("document key", k)?;
                Some(k.clone())
            }
            Some(_) => return Err(Error::Invalid("_key must be a string".into())),
            None => None,
        };
        self.store.write(|d, tx| {
            require_collection(d, tx, database, collection)?;
            let doc_key = match explicit {
                Some(k) => k,
                None => next_id(d, tx)?.to_string(),
            };
            let k = format!("{}/{}/{}", database, collection, doc_key);
            if d.documents.get(tx, &k).map_err(err)?.is_some() {
                return Err(Error::Conflict(format!("document '{}' already exists", doc_key)));
            }
            put_json(tx, &d.documents, &k, doc)?;
            Ok(doc_key)
        })
    }

    pub fn count_documents(&self, database: &str, collection: &str) -> Result<usize> {
        self.store.read(|d, tx| {
            require_collection(d, tx, database, collection)?;
            Ok(keys_with_prefix(tx, &d.documents, &format!("{}/{}/", database, collection))?.len())
        })
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn create_view(
        &self,
        database: &str,
        name: &str,
        view_type: ViewType,
        properties: ViewProperties,
    ) -> Result<View> {
        validate_name("view", name)?;
        properties.validate()?;
        let view = self.store.write(|d, tx| {
            require_database(d, tx, database)?;
            let k = key(database, name);
            if d.views.get(tx, &k).map_err(err)?.is_some() {
                return Err(Error::Conflict(format!("view '{}' already exists", name)));
            }
            require_link_targets(d, tx, database, &properties)?;
            let view = View {
                id: next_id(d, tx)?,
                database: database.to_string(),
                name: name.to_string(),
                view_type,
                properties,
            };
            put_json(tx, &d.views, &k, &view)?;
            Ok(view)
        })?;
        tracing::info!(database, view = name, id = view.id, "view created");
        Ok(view)
    }

    pub fn view(&self, database: &str, name: &str) -> Result<Option<View>> {
        self.store.read(|d, tx| get_json(tx, &d.views, &key(database, name)))
    }

    pub fn list_views(&self, database: &str) -> Result<Vec<View>> {
        self.store.read(|d, tx| {
            let mut views = Vec::new();
            for k in keys_with_prefix(tx, &d.views, &format!("{}/", database))? {
                if let Some(v) = get_json(tx, &d.views, &k)? {
                    views.push(v);
                }
            }
            Ok(views)
        })
    }

    pub fn drop_view(&self, database: &str, name: &str) -> Result<()> {
        let removed = self
            .store
            .write(|d, tx| d.views.delete(tx, &key(database, name)).map_err(err))?;
        if !removed {
            return Err(Error::NotFound(format!("view '{}'", name)));
        }
        tracing::info!(database, view = name, "view dropped");
        Ok(())
    }

    /// Rename in place; the view keeps its id and properties
    pub fn rename_view(&self, database: &str, name: &str, new_name: &str) -> Result<View> {
        validate_name("view", new_name)?;
        let view = self.store.write(|d, tx| {
            let old_key = key(database, name);
            let mut view: View = get_json(tx, &d.views, &old_key)?
                .ok_or_else(|| Error::NotFound(format!("view '{}'", name)))?;
            if name == new_name {
                return Ok(view);
            }
            let new_key = key(database, new_name);
            if d.views.get(tx, &new_key).map_err(err)?.is_some() {
                return Err(Error::Conflict(format!("view '{}' already exists", new_name)));
            }
            d.views.delete(tx, &old_key).map_err(err)?;
            view.name = new_name.to_string();
            put_json(tx, &d.views, &new_key, &view)?;
            Ok(view)
        })?;
        tracing::info!(database, from = name, to = new_name, id = view.id, "view renamed");
        Ok(view)
    }

    /// Read-modify-write of a view's properties in one write transaction, so
    /// concurrent updates to the same view serialize instead of overwriting
    /// each other.
    pub fn update_view_properties<F>(&self, database: &str, name: &str, f: F) -> Result<View>
    where
        F: FnOnce(&View) -> Result<ViewProperties>,
    {
        self.update_view_in(database, name, |_, _, view| match view {
            Some(v) => f(v),
            None => Err(Error::NotFound(format!("view '{}'", name))),
        })
    }

    /// Like `update_view_properties`, but `f` also sees the transaction and
    /// is called with `None` for a missing view. A missing view is always
    /// `NotFound` unless `f` fails first.
    pub(crate) fn update_view_in<F>(&self, database: &str, name: &str, f: F) -> Result<View>
    where
        F: FnOnce(&Dbs, &RoTxn, Option<&View>) -> Result<ViewProperties>,
    {
        let view = self.store.write(|d, tx| {
            let k = key(database, name);
            let current: Option<View> = get_json(tx, &d.views, &k)?;
            let properties = f(d, tx, current.as_ref())?;
            let mut view = current.ok_or_else(|| Error::NotFound(format!("view '{}'", name)))?;
            properties.validate()?;
            require_link_targets(d, tx, database, &properties)?;
            view.properties = properties;
            put_json(tx, &d.views, &k, &view)?;
            Ok(view)
        })?;
        tracing::info!(database, view = name, "view properties updated");
        Ok(view)
    }
}

pub(crate) fn database_exists_in(d: &Dbs, tx: &RoTxn, name: &str) -> Result<bool> {
    Ok(d.databases.get(tx, name).map_err(err)?.is_some())
}

fn require_database(d: &Dbs, tx: &RoTxn, name: &str) -> Result<()> {
    if database_exists_in(d, tx, name)? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("database '{}'", name)))
    }
}

fn require_collection(d: &Dbs, tx: &RoTxn, database: &str, name: &str) -> Result<()> {
    if d.collections.get(tx, &key(database, name)).map_err(err)?.is_some() {
        Ok(())
    } else {
        Err(Error::NotFound(format!("collection '{}'", name)))
    }
}

fn require_link_targets(d: &Dbs, tx: &RoTxn, database: &str, properties: &ViewProperties) -> Result<()> {
    for col in properties.links.keys() {
        validate_name("collection", col)?;
        require_collection(d, tx, database, col)?;
    }
    Ok(())
}

fn get_json<T: DeserializeOwned>(tx: &RoTxn, db: &DbStr, k: &str) -> Result<Option<T>> {
    match db.get(tx, k).map_err(err)? {
        Some(s) => serde_json::from_str(s).map(Some).map_err(err),
        None => Ok(None),
    }
}

fn put_json<T: Serialize + ?Sized>(tx: &mut RwTxn, db: &DbStr, k: &str, v: &T) -> Result<()> {
    let s = serde_json::to_string(v).map_err(err)?;
    db.put(tx, k, &s).map_err(err)
}
