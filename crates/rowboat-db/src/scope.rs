//! Session scopes: units of work with deterministic teardown.
//!
//! A [`ScopeStack`] is the explicit per-context handle for "the current
//! scope": one stack per request or task, never shared across contexts.
//! Opening a scope while another is current follows the configured
//! [`NestingMode`]; closing anything but the innermost open scope is a
//! discipline violation and fails fast.
//!
//! A [`SessionScope`] lazily opens one [`Session`] per entity-configuration
//! group. Each session takes a pooled connection, begins a deferred
//! transaction, and queues pending saves. Closing the scope flushes and
//! commits under `Auto`/`Commit` flush policy, or discards and rolls back
//! under `Never`, then returns the connections to their pools. A scope
//! dropped without an orderly close releases its connections too; the
//! engine rolls back the open transaction when the connection drops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rowboat_common::{Error, FlushMode, NestingMode, Result};

use crate::pool::{self, PooledConnection};
use crate::record::Record;
use crate::registry::Registry;
use crate::schema::EntityDescriptor;
use crate::value::Value;

static SCOPE_IDS: AtomicU64 = AtomicU64::new(1);

/// The explicit "current scope" holder for one logical context.
pub struct ScopeStack {
    registry: Arc<Registry>,
    stack: Mutex<Vec<StackEntry>>,
}

struct StackEntry {
    scope: Arc<SessionScope>,
    /// Join-mode handle count; the scope closes when it reaches zero.
    depth: usize,
}

impl ScopeStack {
    /// Create an empty stack bound to a registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            stack: Mutex::new(Vec::new()),
        }
    }

    /// The registry this stack operates against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Open a scope and make it current.
    ///
    /// With a scope already current, [`NestingMode::Join`] returns the same
    /// scope (depth-counted); [`NestingMode::Independent`] pushes a fresh
    /// scope with its own sessions.
    pub fn open(&self) -> Result<Arc<SessionScope>> {
        self.open_inner(None)
    }

    /// Open the outermost scope with a flush-mode override.
    ///
    /// Overriding the flush mode while joining an already-open scope would
    /// silently change the outer scope's semantics, so it is rejected as a
    /// discipline violation.
    pub fn open_with(&self, flush: FlushMode) -> Result<Arc<SessionScope>> {
        self.open_inner(Some(flush))
    }

    fn open_inner(&self, flush: Option<FlushMode>) -> Result<Arc<SessionScope>> {
        let mut stack = self.stack.lock();
        if let Some(top) = stack.last_mut() {
            if self.registry.nesting() == NestingMode::Join {
                if flush.is_some() {
                    return Err(Error::scope_violation(
                        "cannot override flush mode when joining an open scope",
                    ));
                }
                top.depth += 1;
                tracing::trace!(scope = top.scope.id(), depth = top.depth, "joined scope");
                return Ok(top.scope.clone());
            }
        }

        let scope = Arc::new(SessionScope::new(self.registry.clone(), flush));
        tracing::trace!(scope = scope.id(), "opened scope");
        stack.push(StackEntry {
            scope: scope.clone(),
            depth: 1,
        });
        Ok(scope)
    }

    /// The innermost open scope, if any.
    pub fn current(&self) -> Option<Arc<SessionScope>> {
        self.stack.lock().last().map(|entry| entry.scope.clone())
    }

    /// The number of distinct open scopes.
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Close a scope obtained from [`open`](Self::open).
    ///
    /// Only the innermost current scope may be closed; anything else is a
    /// programmer error and fails fast without touching the stack. Under
    /// join nesting the underlying unit of work flushes and releases its
    /// connections when the outermost handle closes.
    pub fn close(&self, scope: Arc<SessionScope>) -> Result<()> {
        let mut stack = self.stack.lock();
        let top = stack
            .last_mut()
            .ok_or_else(|| Error::scope_violation("no scope is open on this context"))?;
        if top.scope.id() != scope.id() {
            return Err(Error::scope_violation(format!(
                "scope {} is not the innermost open scope (current is {})",
                scope.id(),
                top.scope.id()
            )));
        }

        top.depth -= 1;
        if top.depth > 0 {
            tracing::trace!(scope = scope.id(), depth = top.depth, "left joined scope");
            return Ok(());
        }

        let Some(entry) = stack.pop() else {
            return Ok(());
        };
        drop(stack);
        tracing::trace!(scope = entry.scope.id(), "closing scope");
        entry.scope.close()
    }
}

/// A unit of work spanning one session per entity-configuration group.
pub struct SessionScope {
    id: u64,
    registry: Arc<Registry>,
    flush_override: Option<FlushMode>,
    inner: Mutex<ScopeInner>,
}

impl std::fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionScope")
            .field("id", &self.id)
            .field("flush_override", &self.flush_override)
            .field("open", &self.is_open())
            .finish()
    }
}

struct ScopeInner {
    open: bool,
    sessions: HashMap<&'static str, Session>,
}

impl SessionScope {
    fn new(registry: Arc<Registry>, flush_override: Option<FlushMode>) -> Self {
        Self {
            id: SCOPE_IDS.fetch_add(1, Ordering::Relaxed),
            registry,
            flush_override,
            inner: Mutex::new(ScopeInner {
                open: true,
                sessions: HashMap::new(),
            }),
        }
    }

    /// A process-unique id for diagnostics.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the scope is still open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// The registry this scope operates against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Write all pending saves in every session to storage, inside the
    /// scope's open transactions.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::scope_violation("flush on a closed scope"));
        }
        for session in inner.sessions.values_mut() {
            session.flush()?;
        }
        Ok(())
    }

    /// Run `f` against the session for the descriptor's group, opening the
    /// session (connection + BEGIN) on first use.
    pub(crate) fn with_session<R>(
        &self,
        descriptor: &'static EntityDescriptor,
        f: impl FnOnce(&mut Session) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::scope_violation(format!(
                "operation on closed scope {}",
                self.id
            )));
        }

        let group = descriptor.group();
        if !inner.sessions.contains_key(group) {
            let config = self.registry.resolved_config(group)?;
            let conn = pool::get_conn(self.registry.pool(group)?)?;
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| Error::database(e.to_string()))?;
            let session = Session {
                conn,
                registry: self.registry.clone(),
                flush_mode: self.flush_override.unwrap_or(config.flush_mode()),
                show_sql: config.show_sql(),
                pending: Vec::new(),
            };
            inner.sessions.insert(group, session);
        }

        let session = inner
            .sessions
            .get_mut(group)
            .ok_or_else(|| Error::scope_violation("session vanished from open scope"))?;
        f(session)
    }

    /// Flush or discard per policy, end the transactions, and release the
    /// connections. Closing twice is a discipline violation.
    pub(crate) fn close(&self) -> Result<()> {
        let sessions = {
            let mut inner = self.inner.lock();
            if !inner.open {
                return Err(Error::scope_violation(format!(
                    "scope {} is already closed",
                    self.id
                )));
            }
            inner.open = false;
            std::mem::take(&mut inner.sessions)
        };

        let mut first_err = None;
        for (group, session) in sessions {
            if let Err(e) = session.finish() {
                tracing::error!(group, error = %e, "session teardown failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct PendingWrite {
    entity: &'static str,
    table: &'static str,
    sql: String,
    params: Vec<Value>,
}

/// One underlying engine session: a pooled connection with an open deferred
/// transaction and a queue of pending writes.
pub(crate) struct Session {
    conn: PooledConnection,
    registry: Arc<Registry>,
    flush_mode: FlushMode,
    show_sql: bool,
    pending: Vec<PendingWrite>,
}

impl Session {
    fn log_sql(&self, sql: &str) {
        if self.show_sql {
            tracing::debug!(target: "rowboat::sql", "{sql}");
        }
    }

    /// Queue an upsert of `row` for later flush.
    pub(crate) fn queue_save(&mut self, descriptor: &'static EntityDescriptor, row: Vec<Value>) {
        self.pending.push(PendingWrite {
            entity: descriptor.entity(),
            table: descriptor.table(),
            sql: descriptor.insert_sql(),
            params: row,
        });
    }

    /// Execute every pending write in queue order.
    pub(crate) fn flush(&mut self) -> Result<()> {
        for write in self.pending.drain(..) {
            if self.show_sql {
                tracing::debug!(target: "rowboat::sql", "{}", write.sql);
            }
            self.conn
                .execute(&write.sql, rusqlite::params_from_iter(write.params.iter()))
                .map_err(|e| Error::database(e.to_string()))?;
            self.registry.notify_save(write.entity, write.table);
        }
        Ok(())
    }

    fn flush_before_query(&mut self) -> Result<()> {
        if self.flush_mode == FlushMode::Auto && !self.pending.is_empty() {
            self.flush()?;
        }
        Ok(())
    }

    pub(crate) fn select_all<T: Record>(
        &mut self,
        descriptor: &'static EntityDescriptor,
    ) -> Result<Vec<T>> {
        self.flush_before_query()?;
        let sql = descriptor.select_sql();
        self.log_sql(&sql);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| T::from_row(row))
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows)
    }

    pub(crate) fn select_by_key<T: Record>(
        &mut self,
        descriptor: &'static EntityDescriptor,
        key: &Value,
    ) -> Result<Option<T>> {
        self.flush_before_query()?;
        let sql = descriptor.select_by_key_sql();
        self.log_sql(&sql);
        match self
            .conn
            .query_row(&sql, rusqlite::params![key], |row| T::from_row(row))
        {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::database(e.to_string())),
        }
    }

    pub(crate) fn count(&mut self, descriptor: &'static EntityDescriptor) -> Result<i64> {
        self.flush_before_query()?;
        let sql = descriptor.count_sql();
        self.log_sql(&sql);
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::database(e.to_string()))
    }

    /// Delete every row of the entity's table. Pending saves flush first so
    /// they cannot resurrect after the delete; under `Never` flush policy
    /// they stay queued and are discarded with the scope.
    pub(crate) fn delete_all(&mut self, descriptor: &'static EntityDescriptor) -> Result<usize> {
        if self.flush_mode != FlushMode::Never {
            self.flush()?;
        }
        let sql = descriptor.delete_all_sql();
        self.log_sql(&sql);
        let deleted = self
            .conn
            .execute(&sql, [])
            .map_err(|e| Error::database(e.to_string()))?;
        self.registry
            .notify_delete_all(descriptor.entity(), descriptor.table());
        Ok(deleted)
    }

    pub(crate) fn delete_by_key(
        &mut self,
        descriptor: &'static EntityDescriptor,
        key: &Value,
    ) -> Result<bool> {
        if self.flush_mode != FlushMode::Never {
            self.flush()?;
        }
        let sql = descriptor.delete_by_key_sql();
        self.log_sql(&sql);
        let deleted = self
            .conn
            .execute(&sql, rusqlite::params![key])
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(deleted > 0)
    }

    /// End the transaction per flush policy and release the connection.
    fn finish(mut self) -> Result<()> {
        match self.flush_mode {
            FlushMode::Auto | FlushMode::Commit => {
                self.flush()?;
                self.log_sql("COMMIT");
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| Error::database(e.to_string()))
            }
            FlushMode::Never => {
                self.pending.clear();
                self.log_sql("ROLLBACK");
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(|e| Error::database(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo;
    use crate::test_fixtures::{memory_registry, Note, Tag};

    #[test]
    fn test_open_and_close() {
        let stack = ScopeStack::new(memory_registry());
        assert!(stack.current().is_none());

        let scope = stack.open().unwrap();
        assert!(scope.is_open());
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().unwrap().id(), scope.id());

        stack.close(scope).unwrap();
        assert!(stack.current().is_none());
    }

    #[test]
    fn test_close_without_open_fails() {
        let stack = ScopeStack::new(memory_registry());
        let scope = stack.open().unwrap();
        stack.close(scope.clone()).unwrap();

        let err = stack.close(scope).unwrap_err();
        assert!(matches!(err, Error::ScopeViolation(_)));
    }

    #[test]
    fn test_operation_on_closed_scope_fails() {
        let stack = ScopeStack::new(memory_registry());
        let scope = stack.open().unwrap();
        stack.close(scope.clone()).unwrap();

        let err = repo::find_all::<Note>(&scope).unwrap_err();
        assert!(matches!(err, Error::ScopeViolation(_)));
    }

    #[test]
    fn test_join_nesting_shares_unit_of_work() {
        let stack = ScopeStack::new(memory_registry());
        let outer = stack.open().unwrap();
        let inner = stack.open().unwrap();
        assert_eq!(outer.id(), inner.id());
        assert_eq!(stack.depth(), 1);

        repo::save(&inner, &Note::new(1, "from inner")).unwrap();
        stack.close(inner).unwrap();

        // The unit of work is still open; the outer handle sees the save.
        let notes: Vec<Note> = repo::find_all(&outer).unwrap();
        assert_eq!(notes.len(), 1);
        stack.close(outer).unwrap();
    }

    #[test]
    fn test_independent_nesting_gets_own_scope() {
        let source = crate::config::ConfigSource::builder()
            .group(
                "default",
                crate::config::GroupConfig::in_memory().property("show_sql", "true"),
            )
            .group("archive", crate::config::GroupConfig::in_memory())
            .nesting(NestingMode::Independent)
            .build();
        let registry = crate::test_fixtures::builder_with_fixtures()
            .initialize(source)
            .unwrap();

        let stack = ScopeStack::new(registry);
        let outer = stack.open().unwrap();
        let inner = stack.open().unwrap();
        assert_ne!(outer.id(), inner.id());
        assert_eq!(stack.depth(), 2);

        // Closing the outer scope while the inner one is open fails fast.
        let err = stack.close(outer.clone()).unwrap_err();
        assert!(matches!(err, Error::ScopeViolation(_)));

        stack.close(inner).unwrap();
        stack.close(outer).unwrap();
    }

    #[test]
    fn test_flush_override_on_join_fails() {
        let stack = ScopeStack::new(memory_registry());
        let outer = stack.open().unwrap();
        let err = stack.open_with(FlushMode::Never).unwrap_err();
        assert!(matches!(err, Error::ScopeViolation(_)));
        stack.close(outer).unwrap();
    }

    #[test]
    fn test_never_flush_discards_pending_saves() {
        let registry = memory_registry();
        let stack = ScopeStack::new(registry.clone());

        let scope = stack.open_with(FlushMode::Never).unwrap();
        repo::save(&scope, &Note::new(1, "discarded")).unwrap();
        stack.close(scope).unwrap();

        let scope = stack.open().unwrap();
        let notes: Vec<Note> = repo::find_all(&scope).unwrap();
        assert!(notes.is_empty());
        stack.close(scope).unwrap();
    }

    #[test]
    fn test_commit_flush_writes_on_close() {
        let registry = memory_registry();
        let stack = ScopeStack::new(registry.clone());

        let scope = stack.open_with(FlushMode::Commit).unwrap();
        repo::save(&scope, &Note::new(7, "kept")).unwrap();
        // Commit mode does not flush before queries.
        let visible: Vec<Note> = repo::find_all(&scope).unwrap();
        assert!(visible.is_empty());
        stack.close(scope).unwrap();

        let scope = stack.open().unwrap();
        let notes: Vec<Note> = repo::find_all(&scope).unwrap();
        assert_eq!(notes.len(), 1);
        stack.close(scope).unwrap();
    }

    #[test]
    fn test_sessions_span_groups() {
        let stack = ScopeStack::new(memory_registry());
        let scope = stack.open().unwrap();

        repo::save(&scope, &Note::new(1, "default group")).unwrap();
        repo::save(
            &scope,
            &Tag {
                name: "archive group".to_string(),
            },
        )
        .unwrap();

        assert_eq!(repo::count::<Note>(&scope).unwrap(), 1);
        assert_eq!(repo::count::<Tag>(&scope).unwrap(), 1);
        stack.close(scope).unwrap();
    }

    #[test]
    fn test_explicit_flush() {
        let stack = ScopeStack::new(memory_registry());
        let scope = stack.open_with(FlushMode::Commit).unwrap();

        repo::save(&scope, &Note::new(1, "flushed by hand")).unwrap();
        scope.flush().unwrap();
        let notes: Vec<Note> = repo::find_all(&scope).unwrap();
        assert_eq!(notes.len(), 1);
        stack.close(scope).unwrap();
    }
}
