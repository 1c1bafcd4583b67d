//! The trait implemented by persistable domain entities.

use crate::schema::EntityDescriptor;
use crate::value::Value;

/// A domain entity mapped to a table through a static [`EntityDescriptor`].
///
/// Implementations keep the descriptor in a `LazyLock` static so the builder
/// runs once at startup:
///
/// ```
/// use std::sync::LazyLock;
/// use rowboat_db::record::Record;
/// use rowboat_db::schema::{EntityDescriptor, SqlType};
/// use rowboat_db::value::Value;
///
/// struct Note {
///     id: i64,
///     text: String,
/// }
///
/// static NOTE: LazyLock<EntityDescriptor> = LazyLock::new(|| {
///     EntityDescriptor::builder("Note", "notes")
///         .primary_key("id", SqlType::Integer)
///         .column("text", SqlType::Text)
///         .build()
/// });
///
/// impl Record for Note {
///     fn descriptor() -> &'static EntityDescriptor {
///         &NOTE
///     }
///
///     fn primary_key(&self) -> Value {
///         Value::Integer(self.id)
///     }
///
///     fn to_row(&self) -> Vec<Value> {
///         vec![Value::Integer(self.id), Value::from(self.text.as_str())]
///     }
///
///     fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
///         Ok(Note {
///             id: row.get(0)?,
///             text: row.get(1)?,
///         })
///     }
/// }
/// ```
///
/// `to_row` yields the stored columns in descriptor declaration order;
/// `from_row` reads every column (formula columns included) in the same
/// order the descriptor declares them. A record detached from any session
/// scope is inert data.
pub trait Record: Sized + Send + 'static {
    /// The static mapping metadata for this type.
    fn descriptor() -> &'static EntityDescriptor;

    /// The value of this instance's primary key column.
    fn primary_key(&self) -> Value;

    /// The stored column values, in descriptor declaration order.
    fn to_row(&self) -> Vec<Value>;

    /// Rebuild an instance from a row selected with all descriptor columns
    /// in declaration order.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}
