//! Shared fixtures for the crate's unit tests: two small record types and
//! registry constructors over in-memory groups.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use crate::config::{ConfigSource, GroupConfig};
use crate::record::Record;
use crate::registry::{RecordObserver, Registry, RegistryBuilder};
use crate::schema::{EntityDescriptor, SqlType};
use crate::value::Value;

/// A note in the default group, with a formula column computed at read time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Note {
    pub id: i64,
    pub title: String,
    /// Filled by the engine on load; empty on fresh instances.
    pub title_upper: String,
}

static NOTE: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::builder("Note", "notes")
        .primary_key("id", SqlType::Integer)
        .column("title", SqlType::Text)
        .formula("title_upper", SqlType::Text, "upper(title)")
        .build()
});

impl Note {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            title_upper: String::new(),
        }
    }
}

impl Record for Note {
    fn descriptor() -> &'static EntityDescriptor {
        &NOTE
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }

    fn to_row(&self) -> Vec<Value> {
        vec![Value::Integer(self.id), Value::from(self.title.as_str())]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Note {
            id: row.get(0)?,
            title: row.get(1)?,
            title_upper: row.get(2)?,
        })
    }
}

/// A tag stored in the separate "archive" group.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tag {
    pub name: String,
}

static TAG: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::builder("Tag", "tags")
        .group("archive")
        .primary_key("name", SqlType::Text)
        .build()
});

impl Record for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        &TAG
    }

    fn primary_key(&self) -> Value {
        Value::from(self.name.as_str())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![Value::from(self.name.as_str())]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Tag { name: row.get(0)? })
    }
}

/// Registered with no registry in tests exercising the not-registered path.
#[derive(Debug)]
pub(crate) struct Unregistered;

static UNREGISTERED: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::builder("Unregistered", "unregistered")
        .primary_key("id", SqlType::Integer)
        .build()
});

impl Record for Unregistered {
    fn descriptor() -> &'static EntityDescriptor {
        &UNREGISTERED
    }

    fn primary_key(&self) -> Value {
        Value::Integer(0)
    }

    fn to_row(&self) -> Vec<Value> {
        vec![Value::Integer(0)]
    }

    fn from_row(_row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Unregistered)
    }
}

/// An observer that counts callbacks.
#[derive(Default)]
pub(crate) struct CountingObserver {
    pub saves: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl RecordObserver for CountingObserver {
    fn on_save(&self, _entity: &str, _table: &str) {
        self.saves.fetch_add(1, Ordering::SeqCst);
    }

    fn on_delete_all(&self, _entity: &str, _table: &str) {
        self.deletes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Two in-memory groups: "default" (with show_sql) and "archive".
pub(crate) fn memory_source() -> ConfigSource {
    ConfigSource::builder()
        .group(
            "default",
            GroupConfig::in_memory().property("show_sql", "true"),
        )
        .group("archive", GroupConfig::in_memory())
        .build()
}

pub(crate) fn builder_with_fixtures() -> RegistryBuilder {
    Registry::builder().register::<Note>().register::<Tag>()
}

/// A registry over [`memory_source`] with [`Note`] and [`Tag`] registered.
pub(crate) fn memory_registry() -> Arc<Registry> {
    builder_with_fixtures()
        .initialize(memory_source())
        .expect("fixture registry initializes")
}
