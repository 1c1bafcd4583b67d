//! Database connection pool management.
//!
//! One r2d2 pool per entity-configuration group. In-memory groups use a
//! uniquely-named shared-cache database so every pooled connection sees the
//! same data; the database lives as long as the pool holds a connection.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rowboat_common::{Error, Result};
use uuid::Uuid;

use crate::config::{GroupConfig, Storage};

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a pool for one group.
///
/// Every new connection gets `PRAGMA foreign_keys = ON`, a busy timeout, and
/// the group's `pragma.*` properties applied in order.
pub fn init_pool(config: &GroupConfig) -> Result<DbPool> {
    let manager = match config.storage() {
        Storage::Memory => {
            // A unique name per pool keeps concurrently-initialized groups
            // (and test registries) isolated from one another.
            let name = format!(
                "file:rowboat-{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            );
            SqliteConnectionManager::file(name)
        }
        Storage::File(path) => SqliteConnectionManager::file(path),
    };

    let pragmas = config.pragmas();
    let manager = manager.with_init(move |conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        for pragma in &pragmas {
            conn.execute_batch(pragma)?;
        }
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(config.pool_size_value())
        .build(manager)
        .map_err(|e| Error::pool(format!("Failed to create connection pool: {e}")))?;

    Ok(pool)
}

/// Get a connection from the pool.
///
/// Convenience wrapper around `pool.get()` that converts the r2d2 error into
/// our common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::pool(format!("Failed to get connection from pool: {e}")))
}
