//! The constructed-once registry: the context object every operation
//! receives by reference.
//!
//! `Registry::builder().register::<T>()...initialize(source)` resolves each
//! record type against the configuration source, builds one connection pool
//! per entity-configuration group in use, and creates the schema for every
//! descriptor. The registry is immutable after initialization.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use rowboat_common::{Error, NestingMode, Result, ScopeStrategy};

use crate::config::{ConfigSource, GroupConfig};
use crate::pool::{self, DbPool};
use crate::record::Record;
use crate::schema::EntityDescriptor;

/// Callbacks invoked after persistence operations execute.
///
/// Observers are registered at build time and may not abort an operation;
/// they are notification-only, the way the source system's event listeners
/// are.
pub trait RecordObserver: Send + Sync {
    /// A row for `entity` was written to `table`.
    fn on_save(&self, entity: &str, table: &str) {
        let _ = (entity, table);
    }

    /// All rows of `entity` were deleted from `table`.
    fn on_delete_all(&self, entity: &str, table: &str) {
        let _ = (entity, table);
    }
}

/// Immutable runtime context: registered types, pools, policy, observers.
pub struct Registry {
    source: ConfigSource,
    entities: HashMap<TypeId, &'static EntityDescriptor>,
    pools: HashMap<&'static str, DbPool>,
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            entities: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// The descriptor for `T`, or [`Error::NotRegistered`] when `T` was not
    /// registered at initialization.
    pub fn descriptor_of<T: Record>(&self) -> Result<&'static EntityDescriptor> {
        self.entities
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| Error::not_registered(T::descriptor().entity()))
    }

    /// Whether `T` was registered at initialization.
    pub fn is_registered<T: Record>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<T>())
    }

    /// The resolved configuration for an entity-configuration group.
    pub fn resolved_config(&self, group: &str) -> Result<&GroupConfig> {
        self.source
            .group(group)
            .ok_or_else(|| Error::misconfigured(format!("unknown configuration group '{group}'")))
    }

    /// The configured scope strategy.
    pub fn strategy(&self) -> ScopeStrategy {
        self.source.strategy()
    }

    /// The configured nesting mode.
    pub fn nesting(&self) -> NestingMode {
        self.source.nesting()
    }

    pub(crate) fn pool(&self, group: &str) -> Result<&DbPool> {
        self.pools
            .get(group)
            .ok_or_else(|| Error::misconfigured(format!("no pool for configuration group '{group}'")))
    }

    pub(crate) fn notify_save(&self, entity: &str, table: &str) {
        tracing::trace!(entity, table, "record saved");
        for observer in &self.observers {
            observer.on_save(entity, table);
        }
    }

    pub(crate) fn notify_delete_all(&self, entity: &str, table: &str) {
        tracing::trace!(entity, table, "records deleted");
        for observer in &self.observers {
            observer.on_delete_all(entity, table);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entities.len())
            .field("pools", &self.pools.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Registry`].
pub struct RegistryBuilder {
    entities: Vec<(TypeId, &'static EntityDescriptor)>,
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl RegistryBuilder {
    /// Register a record type.
    pub fn register<T: Record>(mut self) -> Self {
        self.entities.push((TypeId::of::<T>(), T::descriptor()));
        self
    }

    /// Attach an observer notified after saves and deletes.
    pub fn observe(mut self, observer: Arc<dyn RecordObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Resolve every registered type against `source`, build pools, and
    /// create the schema. Must be called exactly once per process for a
    /// given application; the returned registry is shared by reference.
    ///
    /// Fails fast on duplicate registrations and on descriptors naming a
    /// group the source does not configure.
    pub fn initialize(self, source: ConfigSource) -> Result<Arc<Registry>> {
        let mut entities: HashMap<TypeId, &'static EntityDescriptor> = HashMap::new();
        for &(type_id, descriptor) in &self.entities {
            if entities.insert(type_id, descriptor).is_some() {
                return Err(Error::misconfigured(format!(
                    "record type '{}' registered twice",
                    descriptor.entity()
                )));
            }
            if source.group(descriptor.group()).is_none() {
                return Err(Error::misconfigured(format!(
                    "entity '{}' belongs to unknown configuration group '{}'",
                    descriptor.entity(),
                    descriptor.group()
                )));
            }
        }

        // One pool per group actually used by a registered entity.
        let mut pools: HashMap<&'static str, DbPool> = HashMap::new();
        for descriptor in entities.values() {
            let group = descriptor.group();
            if !pools.contains_key(group) {
                let config = source
                    .group(group)
                    .ok_or_else(|| Error::misconfigured(format!("unknown group '{group}'")))?;
                pools.insert(group, pool::init_pool(config)?);
            }
        }

        let registry = Registry {
            source,
            entities,
            pools,
            observers: self.observers,
        };
        registry.ensure_schema()?;

        tracing::info!(
            entities = registry.entities.len(),
            groups = registry.pools.len(),
            "registry initialized"
        );
        Ok(Arc::new(registry))
    }
}

impl Registry {
    fn ensure_schema(&self) -> Result<()> {
        for descriptor in self.entities.values() {
            let conn = pool::get_conn(self.pool(descriptor.group())?)?;
            let ddl = descriptor.create_table_sql();
            tracing::debug!(table = descriptor.table(), "creating table");
            conn.execute_batch(&ddl)
                .map_err(|e| Error::database(format!("schema creation failed: {e}")))?;
        }
        Ok(())
    }
}
