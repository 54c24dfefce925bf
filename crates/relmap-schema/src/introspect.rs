//! Database introspection.

use asupersync::{Cx, Outcome};
use relmap_core::{Error, Executor, Row, try_outcome};
use serde::Deserialize;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite
    #[default]
    Sqlite,
    /// MySQL/MariaDB
    Mysql,
}

impl Dialect {
    /// Statement that empties `table`; SQLite has no TRUNCATE.
    pub fn truncate_sql(self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("DELETE FROM {table}"),
            Dialect::Mysql => format!("TRUNCATE TABLE `{table}`"),
        }
    }
}

/// One column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared type as written in the schema, e.g. `INTEGER` or `varchar(64)`
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Dialect-specific notes such as `auto_increment`; empty when none
    pub extra: String,
}

/// Reads table metadata through any executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Introspector {
    dialect: Dialect,
}

impl Introspector {
    /// Create a new introspector for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Columns of `table` in declaration order.
    ///
    /// A table that does not exist yields an empty list on SQLite and a
    /// driver error on MySQL.
    #[tracing::instrument(level = "debug", skip(self, cx, executor))]
    pub async fn columns<E: Executor>(
        &self,
        cx: &Cx,
        executor: &E,
        table: &str,
    ) -> Outcome<Vec<ColumnMeta>, Error> {
        let sql = match self.dialect {
            Dialect::Sqlite => format!("PRAGMA table_info({table})"),
            Dialect::Mysql => format!("SHOW FULL COLUMNS FROM `{table}`"),
        };
        let rows = try_outcome!(executor.query(cx, &sql, &[]).await);
        let columns: Vec<ColumnMeta> = match self.dialect {
            Dialect::Sqlite => rows.iter().filter_map(sqlite_column).collect(),
            Dialect::Mysql => rows.iter().filter_map(mysql_column).collect(),
        };
        tracing::trace!(count = columns.len(), "Introspected columns");
        Outcome::Ok(columns)
    }
}

fn sqlite_column(row: &Row) -> Option<ColumnMeta> {
    let name = row.get_named::<String>("name").ok()?;
    let sql_type = row.get_named::<String>("type").ok().unwrap_or_default();
    let notnull = row.get_named::<i64>("notnull").unwrap_or(0);
    let pk = row.get_named::<i64>("pk").unwrap_or(0);
    Some(ColumnMeta {
        name,
        sql_type,
        nullable: notnull == 0,
        primary_key: pk > 0,
        // PRAGMA table_info does not report AUTOINCREMENT
        extra: String::new(),
    })
}

fn mysql_column(row: &Row) -> Option<ColumnMeta> {
    let name = row.get_named::<String>("Field").ok()?;
    let sql_type = row.get_named::<String>("Type").ok()?;
    let null = row.get_named::<String>("Null").unwrap_or_default();
    let key = row.get_named::<String>("Key").unwrap_or_default();
    let extra = row.get_named::<String>("Extra").unwrap_or_default();
    Some(ColumnMeta {
        name,
        sql_type,
        nullable: null == "YES",
        primary_key: key == "PRI",
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::Value;

    #[test]
    fn test_sqlite_pragma_row() {
        let row = Row::new(
            ["cid", "name", "type", "notnull", "dflt_value", "pk"]
                .map(String::from)
                .to_vec(),
            vec![
                Value::Int(0),
                Value::from("user_id"),
                Value::from("INTEGER"),
                Value::Int(1),
                Value::Null,
                Value::Int(1),
            ],
        );
        let col = sqlite_column(&row).unwrap();
        assert_eq!(col.name, "user_id");
        assert_eq!(col.sql_type, "INTEGER");
        assert!(!col.nullable);
        assert!(col.primary_key);
        assert!(col.extra.is_empty());
    }

    #[test]
    fn test_mysql_show_columns_row() {
        let row = Row::new(
            ["Field", "Type", "Collation", "Null", "Key", "Default", "Extra", "Privileges", "Comment"]
                .map(String::from)
                .to_vec(),
            vec![
                Value::from("id"),
                Value::from("bigint(20)"),
                Value::Null,
                Value::from("NO"),
                Value::from("PRI"),
                Value::Null,
                Value::from("auto_increment"),
                Value::from("select,insert"),
                Value::from(""),
            ],
        );
        let col = mysql_column(&row).unwrap();
        assert_eq!(col.sql_type, "bigint(20)");
        assert!(col.primary_key);
        assert!(!col.nullable);
        assert_eq!(col.extra, "auto_increment");
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(Dialect::Sqlite.truncate_sql("post"), "DELETE FROM post");
        assert_eq!(Dialect::Mysql.truncate_sql("post"), "TRUNCATE TABLE `post`");
    }
}
