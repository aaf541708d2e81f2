//! Viewgate - access control for search view administration
//!
//! Grants are recorded per subject (user or role) at one of three scopes:
//! `_system`, a database, or a collection inside a database. Effective access
//! is resolved most-specific-first, and every view mutation passes through an
//! operation gate that checks the database and any collection the change
//! touches. Deferred tasks carry the registering identity and run as it.
//!
//! Storage is a single LMDB environment (via `heed`).

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod gate;
pub mod grants;
pub mod keyspace;
pub mod protected;
pub mod resolve;
pub mod scope;
pub mod subject;
pub mod tasks;
pub mod view;

pub use bootstrap::{bootstrap, is_bootstrapped, root_user};
pub use catalog::{Catalog, Collection, DatabaseInfo, View};
pub use config::{Config, PollConfig};
pub use engine::Engine;
pub use error::{Error, Result};
pub use gate::{Operation, OperationGate};
pub use grants::GrantStore;
pub use keyspace::KeySpaces;
pub use resolve::Resolver;
pub use scope::{AccessLevel, Scope};
pub use subject::{Identity, Subject};
pub use tasks::{await_completion, Command, Completion, CompletionKey, Scheduler, TaskHandle};
pub use view::{
    merge, ConsolidationPolicy, LinkFields, LinkPatch, LinkProperties, PolicyKind, PropertiesPatch, StoreValues,
    ViewProperties, ViewType,
};
