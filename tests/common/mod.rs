#![allow(dead_code)]

use std::sync::{Arc, Once};

use propbag::config::Settings;
use propbag::model::Model;
use propbag::schema::{ColumnOptions, Role};
use propbag::store::{SqliteStore, Store};
use propbag::types::Value;

static TRACING: Once = Once::new();

/// Installs a subscriber honoring `RUST_LOG` once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixtures {
    pub employee: Arc<Model>,
    pub developer: Arc<Model>,
    pub poet: Arc<Role>,
}

/// Employee with native names and an indexed age, a Developer subtype, and
/// a Poet role not yet included anywhere.
pub fn fixtures_with(settings: Settings) -> Fixtures {
    let employee = Model::builder("Employee")
        .attributes(["first_name", "last_name"])
        .method("muse", |r| {
            Value::from(format!("{} is my muse", r.value("first_name")))
        })
        .settings(settings)
        .build();
    employee
        .property()
        .string("first_name_alias", ColumnOptions::new())
        .expect("declare first_name_alias");
    employee
        .property()
        .integer("age", ColumnOptions::new().indexed())
        .expect("declare age");

    let developer = Model::builder("Developer")
        .parent(&employee)
        .attribute("language_level")
        .build();
    developer
        .property()
        .string("language", ColumnOptions::new().default("Rust"))
        .expect("declare language");

    let poet = Role::new("Poet");
    poet.string("poem", ColumnOptions::new().default_method("muse"))
        .expect("declare poem");

    Fixtures {
        employee,
        developer,
        poet,
    }
}

pub fn fixtures() -> Fixtures {
    fixtures_with(Settings::default())
}

/// In-memory store with the given models installed.
pub fn store_for(models: &[&Arc<Model>]) -> SqliteStore {
    init_tracing();
    let store = SqliteStore::open_in_memory().expect("open store");
    for model in models {
        store.install(model).expect("install model");
    }
    store
}

pub fn count_rows(store: &SqliteStore, table: &str) -> i64 {
    store
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .expect("count rows")
}
