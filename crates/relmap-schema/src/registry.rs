//! Registered record types.
//!
//! Registration is optional; it only enables [`TableRegistry::check_tables`],
//! [`TableRegistry::table`] and truncation.

use std::collections::BTreeMap;

use asupersync::{Cx, Outcome};
use relmap_core::error::{SchemaError, SchemaErrorKind};
use relmap_core::{Descriptor, Error, Executor, FieldInfo, Model, try_outcome, try_result};

use crate::introspect::{Dialect, Introspector};

/// What the registry remembers about one record type.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub type_name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldInfo],
}

impl TableEntry {
    /// Columns the record reads and writes.
    pub fn persisted_columns(&self) -> impl Iterator<Item = &'static str> {
        self.fields
            .iter()
            .filter(|f| f.is_persisted())
            .map(|f| f.column)
    }
}

/// Record types keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    introspector: Introspector,
    tables: BTreeMap<&'static str, TableEntry>,
}

fn schema_error(kind: SchemaErrorKind, table: &str, message: String) -> Error {
    Error::Schema(SchemaError {
        kind,
        table: table.to_string(),
        message,
    })
}

impl TableRegistry {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            introspector: Introspector::new(dialect),
            tables: BTreeMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.introspector.dialect()
    }

    /// Register `M` under its table name.
    ///
    /// The descriptor is validated here, so a malformed relation declaration
    /// is reported at registration instead of at first use. Registering the
    /// same type again is a no-op; a different type claiming an already
    /// registered table is an `Error::Config`.
    #[allow(clippy::result_large_err)]
    pub fn add_table<M: Model>(&mut self) -> relmap_core::Result<()> {
        let desc = Descriptor::of::<M>()?;
        if let Some(existing) = self.tables.get(desc.table) {
            if existing.type_name != desc.type_name {
                return Err(Error::config(
                    desc.type_name,
                    None,
                    format!(
                        "table {} is already registered for {}",
                        desc.table, existing.type_name
                    ),
                ));
            }
        }
        tracing::debug!(table = desc.table, model = desc.type_name, "Registered table");
        self.tables.insert(
            desc.table,
            TableEntry {
                type_name: desc.type_name,
                table: desc.table,
                fields: desc.fields,
            },
        );
        Ok(())
    }

    /// The entry registered for `name`, if any.
    pub fn table(&self, name: &str) -> Option<&TableEntry> {
        self.tables.get(name)
    }

    /// Registered table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.keys().copied()
    }

    /// Verify every persisted field of every registered type has a column.
    ///
    /// Fails on the first table that is missing or lacks a column.
    pub async fn check_tables<E: Executor>(&self, cx: &Cx, executor: &E) -> Outcome<(), Error> {
        for entry in self.tables.values() {
            try_outcome!(self.check_table(cx, executor, entry).await);
        }
        Outcome::Ok(())
    }

    async fn check_table<E: Executor>(
        &self,
        cx: &Cx,
        executor: &E,
        entry: &TableEntry,
    ) -> Outcome<(), Error> {
        let columns = try_outcome!(self.introspector.columns(cx, executor, entry.table).await);
        if columns.is_empty() {
            return Outcome::Err(schema_error(
                SchemaErrorKind::TableNotFound,
                entry.table,
                format!("table for {} has no columns", entry.type_name),
            ));
        }
        tracing::debug!(table = entry.table, columns = columns.len(), "Checking table");

        for field in entry.fields.iter().filter(|f| f.is_persisted()) {
            if !columns.iter().any(|c| c.name == field.column) {
                return Outcome::Err(schema_error(
                    SchemaErrorKind::ColumnNotFound,
                    entry.table,
                    format!(
                        "missing column {} for field {}.{}",
                        field.column, entry.type_name, field.name
                    ),
                ));
            }
        }
        Outcome::Ok(())
    }

    /// Delete every row of a registered table.
    pub async fn truncate_table<E: Executor>(
        &self,
        cx: &Cx,
        executor: &E,
        name: &str,
    ) -> Outcome<(), Error> {
        let entry = try_result!(self.table(name).ok_or_else(|| schema_error(
            SchemaErrorKind::NotRegistered,
            name,
            "table is not registered".to_string(),
        )));
        let sql = self.dialect().truncate_sql(entry.table);
        tracing::debug!(sql = %sql, "Truncating table");
        try_outcome!(executor.execute(cx, &sql, &[]).await);
        Outcome::Ok(())
    }

    /// Truncate every registered table, stopping at the first failure.
    pub async fn truncate_tables<E: Executor>(&self, cx: &Cx, executor: &E) -> Outcome<(), Error> {
        for name in self.tables.keys() {
            try_outcome!(self.truncate_table(cx, executor, name).await);
        }
        Outcome::Ok(())
    }
}
