//! Shared fixture: a bootstrapped engine in a fresh temp directory

#![allow(dead_code)]

use std::time::Duration;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use viewgate::*;

pub const DB: &str = "UnitTestsDb";
pub const ROOT: &str = "root";
pub const COL1: &str = "UnitTestCol1";
pub const COL2: &str = "UnitTestCol2";
pub const VIEW1: &str = "UnitTestView1";
pub const VIEW2: &str = "UnitTestView2";

pub struct Fixture {
    pub engine: Engine,
    _dir: TempDir,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bootstrapped engine with database `DB` created
pub fn setup() -> Fixture {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut config = Config::new(dir.path());
    config.map_size = 1 << 26;
    config.poll = PollConfig {
        retries: 300,
        interval: Duration::from_millis(10),
    };
    let engine = Engine::open(&config).unwrap();
    bootstrap(engine.store(), ROOT).unwrap();
    engine.catalog().create_database(DB).unwrap();
    Fixture { engine, _dir: dir }
}

pub fn root() -> Identity {
    Identity::user(ROOT)
}

pub fn user(name: &str) -> Identity {
    Identity::user(name)
}

impl Fixture {
    pub fn grant_db(&self, user: &str, level: AccessLevel) {
        self.engine
            .grants()
            .put(&Subject::user(user), &Scope::database(DB), level)
            .unwrap();
    }

    pub fn grant_col(&self, user: &str, col: &str, level: AccessLevel) {
        self.engine
            .grants()
            .put(&Subject::user(user), &Scope::collection(DB, col), level)
            .unwrap();
    }

    /// Create COL1 and COL2 with one document each
    pub fn seed_collections(&self) {
        let catalog = self.engine.catalog();
        for col in [COL1, COL2] {
            catalog.create_collection(DB, col).unwrap();
            catalog
                .insert_document(DB, col, &serde_json::json!({"prop1": format!("{}_1", col), "propI": 0}))
                .unwrap();
        }
    }

    /// Create VIEW1 linked to COL1 with includeAllFields, as root
    pub fn seed_view(&self) -> View {
        let patch = PropertiesPatch::default().with_link(COL1, LinkFields::default().include_all_fields(true));
        viewgate::protected::create_view(&self.engine, &root(), DB, VIEW1, ViewType::Search, &patch).unwrap()
    }

    pub fn props(&self, view: &str) -> ViewProperties {
        self.engine.catalog().view(DB, view).unwrap().unwrap().properties
    }
}
