//! DuckDB adapter for the resolver's capability traits.
//!
//! [`DuckDbConnection`] wraps one embedded DuckDB connection and implements
//! [`SchemaIntrospector`], [`QueryExecutor`] and [`Mutator`] on it, so the
//! resolver can order, truncate and audit tables of a DuckDB database file.
//!
//! # Example
//!
//! ```ignore
//! use fk_resolver::duckdb::DuckDbConnection;
//! use fk_resolver::resolver::get_foreign_key_dependencies;
//!
//! let conn = DuckDbConnection::open("app.duckdb".as_ref()).unwrap();
//! let deps = get_foreign_key_dependencies(&conn, None).unwrap();
//! println!("{:?}", deps.ordered_tables);
//! ```

use crate::connection::{Mutator, QueryExecutor, RowSet, SchemaIntrospector, SqlValue};
use crate::schema::{qualified_table, ForeignKey};
use anyhow::{Context, Result};
use duckdb::types::ValueRef;
use duckdb::{params, Connection};
use std::path::Path;

/// Schema used when the caller does not name one
pub const DEFAULT_SCHEMA: &str = "main";

const LIST_TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_catalog = current_database() AND table_schema = ? AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

// One row per column pair; DuckDB lists are 1-indexed
const LIST_FOREIGN_KEYS_SQL: &str = "SELECT CAST(c.constraint_index AS BIGINT), c.referenced_table, \
            c.constraint_column_names[r.pos], c.referenced_column_names[r.pos] \
     FROM duckdb_constraints() c, range(1, 65) r(pos) \
     WHERE c.constraint_type = 'FOREIGN KEY' AND c.database_name = current_database() \
       AND c.schema_name = ? AND c.table_name = ? \
       AND r.pos <= len(c.constraint_column_names) \
     ORDER BY c.constraint_index, r.pos";

const PRIMARY_KEY_SQL: &str = "SELECT unnest(constraint_column_names) FROM duckdb_constraints() \
     WHERE constraint_type = 'PRIMARY KEY' AND database_name = current_database() \
       AND schema_name = ? AND table_name = ?";

/// A DuckDB connection usable by every exposed operation
pub struct DuckDbConnection {
    conn: Connection,
}

impl DuckDbConnection {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB database: {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to create in-memory DuckDB database")?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Run one or more statements that return no rows (DDL, seeding)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("Failed to execute: {}", sql))
    }

    /// Get the underlying DuckDB connection (for advanced use)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn run(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .with_context(|| format!("Failed to execute: {}", sql))
    }
}

impl SchemaIntrospector for DuckDbConnection {
    fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA);
        let mut stmt = self.conn.prepare(LIST_TABLES_SQL)?;
        let tables = stmt
            .query_map(params![schema], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to list tables in schema '{}'", schema))?;
        Ok(tables)
    }

    fn list_foreign_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKey>> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA);
        let mut stmt = self.conn.prepare(LIST_FOREIGN_KEYS_SQL)?;
        let rows = stmt
            .query_map(params![schema, table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read foreign keys of '{}'", table))?;

        // Fold column pairs back into constraints
        let mut fks: Vec<(i64, ForeignKey)> = Vec::new();
        for (index, referenced_table, column, referenced_column) in rows {
            match fks.last_mut() {
                Some((last, fk)) if *last == index => {
                    fk.columns.push(column);
                    fk.referenced_columns.push(referenced_column);
                }
                _ => fks.push((
                    index,
                    ForeignKey {
                        name: None,
                        columns: vec![column],
                        referenced_table,
                        referenced_columns: vec![referenced_column],
                    },
                )),
            }
        }

        Ok(fks.into_iter().map(|(_, fk)| fk).collect())
    }

    fn primary_key(&self, table: &str, schema: Option<&str>) -> Result<Vec<String>> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA);
        let mut stmt = self.conn.prepare(PRIMARY_KEY_SQL)?;
        let columns = stmt
            .query_map(params![schema, table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read primary key of '{}'", table))?;
        Ok(columns)
    }
}

impl QueryExecutor for DuckDbConnection {
    fn execute(&self, sql: &str) -> Result<RowSet> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;

        let mut rows_result = stmt
            .query([])
            .with_context(|| format!("Failed to execute query: {}", sql))?;

        let mut rows: Vec<Vec<SqlValue>> = Vec::new();
        let mut column_count = 0;

        while let Some(row) = rows_result.next()? {
            if column_count == 0 {
                column_count = row.as_ref().column_count();
            }
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(match row.get_ref(i) {
                    Ok(value) => to_sql_value(value),
                    Err(e) => SqlValue::Text(format!("<error: {}>", e)),
                });
            }
            rows.push(values);
        }

        // Drop the rows iterator to release the mutable borrow
        drop(rows_result);

        let columns = (0..stmt.column_count())
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();

        Ok(RowSet { columns, rows })
    }
}

impl Mutator for DuckDbConnection {
    fn truncate(&self, table: &str, schema: Option<&str>, cascade: bool) -> Result<()> {
        if cascade {
            tracing::debug!(table = %table, "DuckDB has no TRUNCATE ... CASCADE; truncating plainly");
        }
        self.run(&format!("TRUNCATE {}", qualified_table(table, schema)))?;
        Ok(())
    }

    fn delete(&self, table: &str, schema: Option<&str>) -> Result<()> {
        self.run(&format!("DELETE FROM {}", qualified_table(table, schema)))?;
        Ok(())
    }

    /// Fails when no explicit transaction is open (autocommit mode)
    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT").context("Failed to commit")
    }
}

/// Convert a DuckDB value to the driver-neutral representation
fn to_sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Boolean(b) => SqlValue::Bool(b),
        ValueRef::TinyInt(n) => SqlValue::Int(n.into()),
        ValueRef::SmallInt(n) => SqlValue::Int(n.into()),
        ValueRef::Int(n) => SqlValue::Int(n.into()),
        ValueRef::BigInt(n) => SqlValue::Int(n),
        ValueRef::UTinyInt(n) => SqlValue::Int(n.into()),
        ValueRef::USmallInt(n) => SqlValue::Int(n.into()),
        ValueRef::UInt(n) => SqlValue::Int(n.into()),
        ValueRef::HugeInt(n) => i64::try_from(n)
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(n.to_string())),
        ValueRef::UBigInt(n) => i64::try_from(n)
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(n.to_string())),
        ValueRef::Float(f) => SqlValue::Float(f.into()),
        ValueRef::Double(f) => SqlValue::Float(f),
        ValueRef::Decimal(d) => SqlValue::Text(d.to_string()),
        ValueRef::Text(s) => SqlValue::Text(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => SqlValue::Text(format!("<blob {} bytes>", b.len())),
        ValueRef::Timestamp(_, ts) => {
            // Microseconds since epoch
            let secs = ts.div_euclid(1_000_000);
            let nanos = (ts.rem_euclid(1_000_000) * 1000) as u32;
            match chrono::DateTime::from_timestamp(secs, nanos) {
                Some(dt) => SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => SqlValue::Int(ts),
            }
        }
        ValueRef::Date32(days) => {
            // 719163 = days from 0001-01-01 to 1970-01-01
            match 719_163i32
                .checked_add(days)
                .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
            {
                Some(date) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
                None => SqlValue::Int(days.into()),
            }
        }
        other => SqlValue::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date32_conversion() {
        assert_eq!(
            to_sql_value(ValueRef::Date32(0)),
            SqlValue::Text("1970-01-01".to_string())
        );
        assert_eq!(
            to_sql_value(ValueRef::Date32(19_723)),
            SqlValue::Text("2024-01-01".to_string())
        );
    }

    #[test]
    fn test_out_of_range_date32_falls_back_to_day_count() {
        assert_eq!(
            to_sql_value(ValueRef::Date32(i32::MAX)),
            SqlValue::Int(i64::from(i32::MAX))
        );
        assert_eq!(
            to_sql_value(ValueRef::Date32(i32::MIN)),
            SqlValue::Int(i64::from(i32::MIN))
        );
    }
}
