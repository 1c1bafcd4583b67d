//! Entity and column descriptors, and the SQL generated from them.
//!
//! Mapping metadata is explicit and constructed at startup with a builder;
//! nothing is reflected at runtime. A descriptor names the entity, its table,
//! its entity-configuration group, and its columns, and knows how to render
//! the DDL and DML the session layer executes.

/// Declared column affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    fn ddl(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

/// How a column gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Stored in the table and written on save.
    Stored,
    /// Computed by the engine at read time from a SQL expression. Never
    /// written and absent from the table definition.
    Formula(String),
}

/// A single mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub unique: bool,
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    /// True when the column is stored (not formula-backed).
    pub fn is_stored(&self) -> bool {
        matches!(self.kind, ColumnKind::Stored)
    }
}

/// Static mapping metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    entity: &'static str,
    table: &'static str,
    group: &'static str,
    primary_key: &'static str,
    columns: Vec<ColumnDescriptor>,
}

impl EntityDescriptor {
    /// Start building a descriptor for `entity` mapped to `table`.
    pub fn builder(entity: &'static str, table: &'static str) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            entity,
            table,
            group: crate::config::DEFAULT_GROUP,
            primary_key: None,
            columns: Vec::new(),
        }
    }

    /// The entity type name, used in diagnostics and errors.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// The mapped table name.
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// The entity-configuration group this entity belongs to.
    pub fn group(&self) -> &'static str {
        self.group
    }

    /// All columns in declaration order, formula columns included.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Stored columns in declaration order; the row shape of
    /// [`crate::record::Record::to_row`].
    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_stored())
    }

    /// The primary key column.
    pub fn primary_key(&self) -> &ColumnDescriptor {
        self.columns
            .iter()
            .find(|c| c.name == self.primary_key)
            .expect("descriptor invariant: primary key column exists")
    }

    /// `CREATE TABLE IF NOT EXISTS` DDL for the stored columns.
    pub fn create_table_sql(&self) -> String {
        let cols: Vec<String> = self
            .stored_columns()
            .map(|c| {
                let mut def = format!("  \"{}\" {}", c.name, c.sql_type.ddl());
                if c.name == self.primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                if c.unique && c.name != self.primary_key {
                    def.push_str(" UNIQUE");
                }
                def
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n{}\n)",
            self.table,
            cols.join(",\n")
        )
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| match &c.kind {
                ColumnKind::Stored => format!("\"{}\"", c.name),
                ColumnKind::Formula(expr) => format!("({expr}) AS \"{}\"", c.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// SELECT of all columns ordered by primary key.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM \"{}\" ORDER BY \"{}\"",
            self.select_list(),
            self.table,
            self.primary_key
        )
    }

    /// SELECT of all columns for one primary key.
    pub fn select_by_key_sql(&self) -> String {
        format!(
            "SELECT {} FROM \"{}\" WHERE \"{}\" = ?",
            self.select_list(),
            self.table,
            self.primary_key
        )
    }

    /// Upserting INSERT for the stored columns.
    pub fn insert_sql(&self) -> String {
        let names: Vec<String> = self
            .stored_columns()
            .map(|c| format!("\"{}\"", c.name))
            .collect();
        let params: Vec<&str> = names.iter().map(|_| "?").collect();
        format!(
            "INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({})",
            self.table,
            names.join(", "),
            params.join(", ")
        )
    }

    /// DELETE of every row in the table.
    pub fn delete_all_sql(&self) -> String {
        format!("DELETE FROM \"{}\"", self.table)
    }

    /// DELETE of one row by primary key.
    pub fn delete_by_key_sql(&self) -> String {
        format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?",
            self.table, self.primary_key
        )
    }

    /// COUNT of all rows in the table.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM \"{}\"", self.table)
    }
}

/// Builder for [`EntityDescriptor`].
///
/// `build` panics on definitions that can never be valid (no primary key,
/// duplicate column names, a formula primary key); descriptors are
/// constructed in statics at startup and a malformed one is a programmer
/// error, not a runtime condition.
pub struct EntityDescriptorBuilder {
    entity: &'static str,
    table: &'static str,
    group: &'static str,
    primary_key: Option<&'static str>,
    columns: Vec<ColumnDescriptor>,
}

impl EntityDescriptorBuilder {
    /// Assign the entity to a configuration group. Defaults to `"default"`.
    pub fn group(mut self, group: &'static str) -> Self {
        self.group = group;
        self
    }

    /// Declare the primary key column.
    pub fn primary_key(mut self, name: &'static str, sql_type: SqlType) -> Self {
        self.primary_key = Some(name);
        self.columns.push(ColumnDescriptor {
            name,
            sql_type,
            nullable: false,
            unique: true,
            kind: ColumnKind::Stored,
        });
        self
    }

    /// Declare a stored column.
    pub fn column(mut self, name: &'static str, sql_type: SqlType) -> Self {
        self.columns.push(ColumnDescriptor {
            name,
            sql_type,
            nullable: false,
            unique: false,
            kind: ColumnKind::Stored,
        });
        self
    }

    /// Declare a nullable stored column.
    pub fn nullable_column(mut self, name: &'static str, sql_type: SqlType) -> Self {
        self.columns.push(ColumnDescriptor {
            name,
            sql_type,
            nullable: true,
            unique: false,
            kind: ColumnKind::Stored,
        });
        self
    }

    /// Declare a unique stored column.
    pub fn unique_column(mut self, name: &'static str, sql_type: SqlType) -> Self {
        self.columns.push(ColumnDescriptor {
            name,
            sql_type,
            nullable: false,
            unique: true,
            kind: ColumnKind::Stored,
        });
        self
    }

    /// Declare a formula column computed at read time from a SQL expression.
    pub fn formula(mut self, name: &'static str, sql_type: SqlType, expr: &str) -> Self {
        self.columns.push(ColumnDescriptor {
            name,
            sql_type,
            nullable: true,
            unique: false,
            kind: ColumnKind::Formula(expr.to_string()),
        });
        self
    }

    /// Finish the descriptor.
    ///
    /// # Panics
    ///
    /// Panics when no primary key was declared, a column name is duplicated,
    /// or the primary key is formula-backed.
    pub fn build(self) -> EntityDescriptor {
        let primary_key = self
            .primary_key
            .unwrap_or_else(|| panic!("entity '{}' has no primary key", self.entity));

        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name) {
                panic!("entity '{}' declares column '{}' twice", self.entity, col.name);
            }
            if col.name == primary_key && !col.is_stored() {
                panic!("entity '{}' primary key cannot be a formula", self.entity);
            }
        }

        EntityDescriptor {
            entity: self.entity,
            table: self.table,
            group: self.group,
            primary_key,
            columns: self.columns,
        }
    }
}
