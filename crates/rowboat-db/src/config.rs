//! The immutable configuration source consumed at startup.
//!
//! A [`ConfigSource`] maps entity-configuration group names to
//! [`GroupConfig`] values (storage backend, pool size, flush policy, and a
//! verbatim property bag) and carries the global scope strategy and nesting
//! mode. It is built once with [`ConfigSource::builder`] and read-only
//! afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rowboat_common::{FlushMode, NestingMode, ScopeStrategy};

/// Name of the group every descriptor belongs to unless it says otherwise.
pub const DEFAULT_GROUP: &str = "default";

/// Property key that turns on statement logging for a group.
pub const PROP_SHOW_SQL: &str = "show_sql";

/// Prefix for property keys applied as PRAGMAs on every new connection.
pub const PROP_PRAGMA_PREFIX: &str = "pragma.";

/// Where a group's database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// A shared in-memory database, private to one pool. Lost when the pool
    /// is dropped.
    Memory,
    /// A database file on disk.
    File(PathBuf),
}

/// Connection and policy settings for one entity-configuration group.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    storage: Storage,
    pool_size: u32,
    flush: FlushMode,
    properties: BTreeMap<String, String>,
}

impl GroupConfig {
    /// A group backed by a shared in-memory database.
    pub fn in_memory() -> Self {
        Self {
            storage: Storage::Memory,
            pool_size: 4,
            flush: FlushMode::default(),
            properties: BTreeMap::new(),
        }
    }

    /// A group backed by a database file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Storage::File(path.into()),
            pool_size: 4,
            flush: FlushMode::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the connection pool size. Defaults to 4, like the engine default.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the flush policy for sessions in this group.
    pub fn flush(mut self, mode: FlushMode) -> Self {
        self.flush = mode;
        self
    }

    /// Add a provider property, passed through verbatim.
    ///
    /// Recognized keys: `show_sql` (`"true"` logs every statement) and
    /// `pragma.<name>` (applied as `PRAGMA <name> = <value>` on each new
    /// connection). Unrecognized keys are preserved untouched.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The storage backend.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The configured pool size.
    pub fn pool_size_value(&self) -> u32 {
        self.pool_size
    }

    /// The flush policy.
    pub fn flush_mode(&self) -> FlushMode {
        self.flush
    }

    /// The property bag, exactly as passed at startup.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Whether statement logging is enabled for this group.
    pub fn show_sql(&self) -> bool {
        self.properties
            .get(PROP_SHOW_SQL)
            .is_some_and(|v| v == "true" || v == "1")
    }

    /// PRAGMA statements derived from `pragma.*` properties.
    pub fn pragmas(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(PROP_PRAGMA_PREFIX)
                    .map(|name| format!("PRAGMA {name} = {v};"))
            })
            .collect()
    }
}

/// The full configuration source: groups plus global scope policy.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    groups: BTreeMap<String, GroupConfig>,
    strategy: ScopeStrategy,
    nesting: NestingMode,
}

impl ConfigSource {
    /// Start building a configuration source.
    pub fn builder() -> ConfigSourceBuilder {
        ConfigSourceBuilder {
            groups: BTreeMap::new(),
            strategy: ScopeStrategy::default(),
            nesting: NestingMode::default(),
        }
    }

    /// A source with a single in-memory default group, for tests and
    /// scratch use.
    pub fn in_memory() -> Self {
        Self::builder()
            .group(DEFAULT_GROUP, GroupConfig::in_memory())
            .build()
    }

    /// Look up a group's configuration.
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.get(name)
    }

    /// All configured group names.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// The configured scope strategy.
    pub fn strategy(&self) -> ScopeStrategy {
        self.strategy
    }

    /// The configured nesting mode.
    pub fn nesting(&self) -> NestingMode {
        self.nesting
    }
}

/// Builder for [`ConfigSource`].
pub struct ConfigSourceBuilder {
    groups: BTreeMap<String, GroupConfig>,
    strategy: ScopeStrategy,
    nesting: NestingMode,
}

impl ConfigSourceBuilder {
    /// Add or replace a group configuration.
    pub fn group(mut self, name: impl Into<String>, config: GroupConfig) -> Self {
        self.groups.insert(name.into(), config);
        self
    }

    /// Set the scope strategy. Defaults to [`ScopeStrategy::Manual`].
    pub fn strategy(mut self, strategy: ScopeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the nesting mode. Defaults to [`NestingMode::Join`].
    pub fn nesting(mut self, nesting: NestingMode) -> Self {
        self.nesting = nesting;
        self
    }

    /// Finish the source. A missing default group is added as in-memory so
    /// the source is always usable.
    pub fn build(mut self) -> ConfigSource {
        self.groups
            .entry(DEFAULT_GROUP.to_string())
            .or_insert_with(GroupConfig::in_memory);
        ConfigSource {
            groups: self.groups,
            strategy: self.strategy,
            nesting: self.nesting,
        }
    }
}
