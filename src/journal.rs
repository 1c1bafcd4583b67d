//! The demo journal domain: the records served by the bundled HTTP API and
//! used as fixtures by the integration tests.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use rowboat_common::{Result, ScopeStrategy};
use rowboat_db::config::{ConfigSource, GroupConfig, Storage};
use rowboat_db::record::Record;
use rowboat_db::registry::Registry;
use rowboat_db::schema::{EntityDescriptor, SqlType};
use rowboat_db::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// A journal post.
///
/// `excerpt` is formula-backed: the engine computes it from `body` at read
/// time, so it is `None` on instances that were never loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub excerpt: Option<String>,
}

static POST: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::builder("Post", "posts")
        .primary_key("id", SqlType::Text)
        .column("title", SqlType::Text)
        .column("body", SqlType::Text)
        .column("published", SqlType::Integer)
        .column("created_at", SqlType::Text)
        .formula("excerpt", SqlType::Text, "substr(body, 1, 64)")
        .build()
});

impl Post {
    /// Create a fresh, unsaved post with a generated id.
    pub fn new(title: &str, body: &str, published: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            published,
            created_at: Utc::now(),
            excerpt: None,
        }
    }
}

impl Record for Post {
    fn descriptor() -> &'static EntityDescriptor {
        &POST
    }

    fn primary_key(&self) -> Value {
        Value::from(self.id.as_str())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.title.as_str()),
            Value::from(self.body.as_str()),
            Value::from(self.published),
            Value::from(self.created_at.to_rfc3339()),
        ]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Post {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            published: row.get::<_, i32>(3)? != 0,
            created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                .unwrap()
                .with_timezone(&Utc),
            excerpt: row.get(5)?,
        })
    }
}

/// A journal author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

static AUTHOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::builder("Author", "authors")
        .primary_key("id", SqlType::Text)
        .unique_column("name", SqlType::Text)
        .nullable_column("email", SqlType::Text)
        .build()
});

impl Author {
    /// Create a fresh, unsaved author with a generated id.
    pub fn new(name: &str, email: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
        }
    }
}

impl Record for Author {
    fn descriptor() -> &'static EntityDescriptor {
        &AUTHOR
    }

    fn primary_key(&self) -> Value {
        Value::from(self.id.as_str())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.name.as_str()),
            Value::from(self.email.as_deref()),
        ]
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Author {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
        })
    }
}

/// Build the configuration source from the application config.
///
/// No database path means an in-memory database. The strategy is always
/// request-aware here; this application opens scopes through the web
/// pipeline.
pub fn build_source(config: &Config) -> ConfigSource {
    let mut group = match &config.database.path {
        Some(path) => GroupConfig::file(path),
        None => GroupConfig::in_memory(),
    };
    group = group.flush(config.database.flush);
    if config.database.show_sql {
        group = group.property("show_sql", "true");
    }

    ConfigSource::builder()
        .group(rowboat_db::config::DEFAULT_GROUP, group)
        .strategy(ScopeStrategy::PerRequest)
        .build()
}

/// Register the journal records and initialize the registry.
pub fn build_registry(source: ConfigSource) -> Result<Arc<Registry>> {
    Registry::builder()
        .register::<Post>()
        .register::<Author>()
        .initialize(source)
}

/// Human-readable description of where a source's default group stores data.
pub fn describe_storage(source: &ConfigSource) -> String {
    match source
        .group(rowboat_db::config::DEFAULT_GROUP)
        .map(GroupConfig::storage)
    {
        Some(Storage::File(path)) => path.display().to_string(),
        _ => "in-memory".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_row_round_trip_shape() {
        let post = Post::new("title", "body", true);
        let row = post.to_row();
        // Stored columns only; the formula excerpt is not written.
        assert_eq!(row.len(), 5);
        assert_eq!(row[1], Value::from("title"));
        assert_eq!(row[3], Value::Integer(1));
    }

    #[test]
    fn test_build_source_defaults_to_memory() {
        let source = build_source(&Config::default());
        assert_eq!(source.strategy(), ScopeStrategy::PerRequest);
        assert_eq!(describe_storage(&source), "in-memory");
    }

    #[test]
    fn test_registry_builds_for_default_config() {
        let registry = build_registry(build_source(&Config::default())).unwrap();
        assert!(registry.is_registered::<Post>());
        assert!(registry.is_registered::<Author>());
    }
}
