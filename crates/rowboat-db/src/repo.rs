//! Generic persistence operations, parameterized by record type.
//!
//! Every operation resolves the entity's descriptor through the scope's
//! registry (failing with the not-registered error for unknown types),
//! obtains the session for the entity's group, and delegates to the engine.
//! This layer adds no caching, batching, or retry behavior; side effects are
//! exactly the engine's side effects.

use std::marker::PhantomData;

use rowboat_common::Result;

use crate::record::Record;
use crate::scope::SessionScope;
use crate::value::Value;

/// Queue an upsert of `record`. The write reaches storage on the next
/// flush: before the next query under `Auto`, at scope close under
/// `Commit`, never under `Never`.
pub fn save<T: Record>(scope: &SessionScope, record: &T) -> Result<()> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    let row = record.to_row();
    scope.with_session(descriptor, |session| {
        session.queue_save(descriptor, row);
        Ok(())
    })
}

/// Load every stored record of `T`, ordered by primary key.
pub fn find_all<T: Record>(scope: &SessionScope) -> Result<Vec<T>> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    scope.with_session(descriptor, |session| session.select_all::<T>(descriptor))
}

/// Load the record with the given primary key, if present.
pub fn find_by_key<T: Record>(scope: &SessionScope, key: &Value) -> Result<Option<T>> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    scope.with_session(descriptor, |session| {
        session.select_by_key::<T>(descriptor, key)
    })
}

/// Whether a record with the given primary key exists.
pub fn exists<T: Record>(scope: &SessionScope, key: &Value) -> Result<bool> {
    Ok(find_by_key::<T>(scope, key)?.is_some())
}

/// The number of stored records of `T`.
pub fn count<T: Record>(scope: &SessionScope) -> Result<i64> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    scope.with_session(descriptor, |session| session.count(descriptor))
}

/// Delete `record` by primary key. Returns whether a row was deleted.
pub fn delete<T: Record>(scope: &SessionScope, record: &T) -> Result<bool> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    let key = record.primary_key();
    scope.with_session(descriptor, |session| {
        session.delete_by_key(descriptor, &key)
    })
}

/// Delete every stored record of `T`. Returns the number of rows deleted.
pub fn delete_all<T: Record>(scope: &SessionScope) -> Result<usize> {
    let descriptor = scope.registry().descriptor_of::<T>()?;
    scope.with_session(descriptor, |session| session.delete_all(descriptor))
}

/// Type-anchored facade over the free functions, for callers that prefer
/// `Repository::<Post>::find_all(&scope)`.
pub struct Repository<T: Record>(PhantomData<T>);

impl<T: Record> Repository<T> {
    /// See [`save`].
    pub fn save(scope: &SessionScope, record: &T) -> Result<()> {
        save(scope, record)
    }

    /// See [`find_all`].
    pub fn find_all(scope: &SessionScope) -> Result<Vec<T>> {
        find_all(scope)
    }

    /// See [`find_by_key`].
    pub fn find_by_key(scope: &SessionScope, key: &Value) -> Result<Option<T>> {
        find_by_key(scope, key)
    }

    /// See [`exists`].
    pub fn exists(scope: &SessionScope, key: &Value) -> Result<bool> {
        exists::<T>(scope, key)
    }

    /// See [`count`].
    pub fn count(scope: &SessionScope) -> Result<i64> {
        count::<T>(scope)
    }

    /// See [`delete`].
    pub fn delete(scope: &SessionScope, record: &T) -> Result<bool> {
        delete(scope, record)
    }

    /// See [`delete_all`].
    pub fn delete_all(scope: &SessionScope) -> Result<usize> {
        delete_all::<T>(scope)
    }
}
