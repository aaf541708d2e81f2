//! Protected API layer
//!
//! All mutations take the caller's identity explicitly and go through the
//! operation gate. Database existence is checked before authorization; view
//! and collection existence only after it, so a caller without rights learns
//! nothing about what a database contains.

use crate::catalog::View;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::gate::{authorize_in, Operation};
use crate::scope::{validate_name, AccessLevel, Scope};
use crate::subject::{Identity, Subject};
use crate::view::{merge, PropertiesPatch, ViewProperties, ViewType};

fn require_database(engine: &Engine, database: &str) -> Result<()> {
    validate_name("database", database)?;
    if engine.catalog().database_exists(database)? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("database '{}'", database)))
    }
}

fn validate_links(patch: &PropertiesPatch) -> Result<Vec<String>> {
    let links = patch.link_names();
    for col in &links {
        validate_name("collection", col)?;
    }
    Ok(links)
}

// ============================================================================
// Views
// ============================================================================

/// Create a view. Requires `ReadWrite` on the database and on every
/// collection the initial properties link.
pub fn create_view(
    engine: &Engine,
    identity: &Identity,
    database: &str,
    name: &str,
    view_type: ViewType,
    properties: &PropertiesPatch,
) -> Result<View> {
    let links = validate_links(properties)?;
    require_database(engine, database)?;
    let op = Operation::CreateView {
        database: database.to_string(),
        links,
    };
    engine.gate().authorize_and_apply(identity, &op, || {
        let initial = merge(view_type, &view_type.default_properties(), properties, false);
        engine.catalog().create_view(database, name, view_type, initial)
    })
}

/// Drop a view. Requires `ReadWrite` on the database.
pub fn drop_view(engine: &Engine, identity: &Identity, database: &str, name: &str) -> Result<()> {
    require_database(engine, database)?;
    let op = Operation::DropView {
        database: database.to_string(),
    };
    engine
        .gate()
        .authorize_and_apply(identity, &op, || engine.catalog().drop_view(database, name))
}

/// Look up a view. Requires `ReadOnly` on the database.
pub fn view(engine: &Engine, identity: &Identity, database: &str, name: &str) -> Result<View> {
    require_database(engine, database)?;
    let op = Operation::ReadView {
        database: database.to_string(),
    };
    engine.gate().authorize_and_apply(identity, &op, || {
        engine
            .catalog()
            .view(database, name)?
            .ok_or_else(|| Error::NotFound(format!("view '{}'", name)))
    })
}

/// Rename a view in place. Requires `ReadWrite` on the database.
pub fn rename_view(
    engine: &Engine,
    identity: &Identity,
    database: &str,
    name: &str,
    new_name: &str,
) -> Result<View> {
    require_database(engine, database)?;
    let op = Operation::RenameView {
        database: database.to_string(),
    };
    engine.gate().authorize_and_apply(identity, &op, || {
        engine.catalog().rename_view(database, name, new_name)
    })
}

/// Update a view's properties, partially or by full replace.
///
/// A partial update needs `ReadWrite` on the database plus on each collection
/// the patch links or unlinks. A full replace additionally needs it on every
/// collection linked right now, since the replace can drop those links.
pub fn update_view_properties(
    engine: &Engine,
    identity: &Identity,
    database: &str,
    name: &str,
    patch: &PropertiesPatch,
    partial: bool,
) -> Result<ViewProperties> {
    let links = validate_links(patch)?;
    require_database(engine, database)?;
    if partial {
        let op = Operation::UpdateProperties {
            database: database.to_string(),
            links,
        };
        return engine.gate().authorize_and_apply(identity, &op, || {
            engine
                .catalog()
                .update_view_properties(database, name, |v| Ok(merge(v.view_type, &v.properties, patch, true)))
                .map(|v| v.properties)
        });
    }
    // The linked set is read in the write transaction the replace commits in;
    // a missing view yields an empty set and NotFound once the gate passes.
    engine
        .catalog()
        .update_view_in(database, name, |d, tx, view| {
            let op = Operation::ReplaceProperties {
                database: database.to_string(),
                linked: view.map(|v| v.properties.linked_collections()).unwrap_or_default(),
                links,
            };
            authorize_in(d, tx, identity, &op)?;
            let view = view.ok_or_else(|| Error::NotFound(format!("view '{}'", name)))?;
            Ok(merge(view.view_type, &view.properties, patch, false))
        })
        .map(|v| v.properties)
}

// ============================================================================
// Grants
// ============================================================================

/// Set a grant. Requires `ReadWrite` on `_system`.
pub fn grant(engine: &Engine, actor: &Identity, subject: &Subject, scope: &Scope, level: AccessLevel) -> Result<()> {
    engine.gate().authorize_and_apply(actor, &Operation::AdministerGrants, || {
        engine.grants().put(subject, scope, level)
    })
}

/// Remove a grant. Requires `ReadWrite` on `_system`.
pub fn revoke(engine: &Engine, actor: &Identity, subject: &Subject, scope: &Scope) -> Result<bool> {
    engine
        .gate()
        .authorize_and_apply(actor, &Operation::AdministerGrants, || engine.grants().remove(subject, scope))
}

pub fn add_member(engine: &Engine, actor: &Identity, user: &str, role: &str) -> Result<()> {
    engine
        .gate()
        .authorize_and_apply(actor, &Operation::AdministerGrants, || engine.grants().add_member(user, role))
}

pub fn remove_member(engine: &Engine, actor: &Identity, user: &str, role: &str) -> Result<bool> {
    engine.gate().authorize_and_apply(actor, &Operation::AdministerGrants, || {
        engine.grants().remove_member(user, role)
    })
}
