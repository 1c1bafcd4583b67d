//! Rowboat-DB: entity descriptors, registry, session scopes, and the
//! repository facade over SQLite.
//!
//! This crate is the persistence layer proper. SQL execution, transactions,
//! and connection pooling are delegated to rusqlite and r2d2; this layer
//! contributes descriptor metadata, configuration glue, and unit-of-work
//! lifecycle management.
//!
//! # Modules
//!
//! - `value` - Dynamic cell values bridging records and the engine
//! - `schema` - Entity/column descriptors and SQL generation
//! - `record` - The [`Record`] trait implemented by domain entities
//! - `config` - The immutable [`ConfigSource`] built at startup
//! - `pool` - Connection pool management
//! - `registry` - The constructed-once [`Registry`] context object
//! - `scope` - Session scopes (units of work) and the [`ScopeStack`]
//! - `repo` - Generic persistence operations per record type
//!
//! # Example
//!
//! ```no_run
//! use rowboat_db::config::{ConfigSource, GroupConfig};
//! use rowboat_db::registry::Registry;
//! use rowboat_db::scope::ScopeStack;
//! # use rowboat_db::record::Record;
//! # use rowboat_db::schema::EntityDescriptor;
//! # use rowboat_db::value::Value;
//! # struct Post;
//! # impl Record for Post {
//! #     fn descriptor() -> &'static EntityDescriptor { unimplemented!() }
//! #     fn primary_key(&self) -> Value { unimplemented!() }
//! #     fn to_row(&self) -> Vec<Value> { unimplemented!() }
//! #     fn from_row(_: &rusqlite::Row<'_>) -> rusqlite::Result<Self> { unimplemented!() }
//! # }
//!
//! let source = ConfigSource::builder()
//!     .group("default", GroupConfig::in_memory())
//!     .build();
//! let registry = Registry::builder()
//!     .register::<Post>()
//!     .initialize(source)
//!     .unwrap();
//!
//! let stack = ScopeStack::new(registry);
//! let scope = stack.open().unwrap();
//! let posts: Vec<Post> = rowboat_db::repo::find_all(&scope).unwrap();
//! stack.close(scope).unwrap();
//! # let _ = posts;
//! ```

pub mod config;
pub mod pool;
pub mod record;
pub mod registry;
pub mod repo;
pub mod schema;
pub mod scope;
pub mod value;

#[cfg(test)]
mod test_fixtures;

pub use rowboat_common::{Error, FlushMode, NestingMode, Result, ScopeStrategy};
