//! Bootstrap and system initialization

use crate::constants::META_ROOT;
use crate::db::Store;
use crate::error::{err, Error, Result};
use crate::grants::put_in;
use crate::scope::{validate_name, AccessLevel, Scope};
use crate::subject::Subject;

/// Check if bootstrapped by looking for a recorded root user
pub fn is_bootstrapped(store: &Store) -> Result<bool> {
    Ok(root_user(store)?.is_some())
}

pub fn root_user(store: &Store) -> Result<Option<String>> {
    store.read(|d, tx| Ok(d.meta.get(tx, META_ROOT).map_err(err)?.map(|s| s.to_string())))
}

/// Bootstrap the system: `root` gets `ReadWrite` on `_system`.
pub fn bootstrap(store: &Store, root: &str) -> Result<()> {
    validate_name("user", root)?;
    store.write(|d, tx| {
        if d.meta.get(tx, META_ROOT).map_err(err)?.is_some() {
            return Err(Error::Conflict("Already bootstrapped".into()));
        }
        put_in(d, tx, &Subject::user(root), &Scope::System, AccessLevel::ReadWrite)?;
        d.meta.put(tx, META_ROOT, root).map_err(err)
    })?;
    tracing::info!(root, "bootstrapped");
    Ok(())
}
