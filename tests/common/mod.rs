//! Shared fakes for integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use fk_resolver::connection::{Mutator, QueryExecutor, RowSet, SchemaIntrospector};
use fk_resolver::duckdb::DuckDbConnection;
use fk_resolver::schema::ForeignKey;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

/// Introspection data declared in code
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    pub tables: Vec<String>,
    pub foreign_keys: BTreeMap<String, Vec<ForeignKey>>,
    pub primary_keys: BTreeMap<String, Vec<String>>,
    pub introspection_calls: Cell<usize>,
    pub fail_listing: bool,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str) -> Self {
        self.tables.push(name.to_string());
        self
    }

    pub fn fk(mut self, table: &str, column: &str, parent: &str, parent_column: &str) -> Self {
        self.foreign_keys
            .entry(table.to_string())
            .or_default()
            .push(ForeignKey::new(&[column], parent, &[parent_column]));
        self
    }

    pub fn pk(mut self, table: &str, column: &str) -> Self {
        self.primary_keys
            .insert(table.to_string(), vec![column.to_string()]);
        self
    }
}

impl SchemaIntrospector for StaticSchema {
    fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<String>> {
        self.introspection_calls.set(self.introspection_calls.get() + 1);
        if self.fail_listing {
            bail!("connection reset");
        }
        Ok(self.tables.clone())
    }

    fn list_foreign_keys(&self, table: &str, _schema: Option<&str>) -> Result<Vec<ForeignKey>> {
        self.introspection_calls.set(self.introspection_calls.get() + 1);
        Ok(self.foreign_keys.get(table).cloned().unwrap_or_default())
    }

    fn primary_key(&self, table: &str, _schema: Option<&str>) -> Result<Vec<String>> {
        Ok(self.primary_keys.get(table).cloned().unwrap_or_default())
    }
}

/// `StaticSchema` plus a mutator that records statements and fails on demand
#[derive(Debug, Default)]
pub struct FakeDatabase {
    pub schema: StaticSchema,
    /// Tables whose TRUNCATE fails (DELETE still works)
    pub fail_truncate: BTreeSet<String>,
    /// Tables where both TRUNCATE and DELETE fail
    pub fail_all: BTreeSet<String>,
    pub fail_commit: bool,
    pub statements: RefCell<Vec<String>>,
}

impl FakeDatabase {
    pub fn new(schema: StaticSchema) -> Self {
        Self {
            schema,
            ..Default::default()
        }
    }

    pub fn failing_truncate(mut self, table: &str) -> Self {
        self.fail_truncate.insert(table.to_string());
        self
    }

    pub fn failing(mut self, table: &str) -> Self {
        self.fail_all.insert(table.to_string());
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }

    fn check_exists(&self, table: &str) -> Result<()> {
        if self.schema.tables.iter().any(|t| t == table) {
            Ok(())
        } else {
            Err(anyhow!("no such table: {}", table))
        }
    }
}

impl SchemaIntrospector for FakeDatabase {
    fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        self.schema.list_tables(schema)
    }

    fn list_foreign_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKey>> {
        self.schema.list_foreign_keys(table, schema)
    }
}

impl Mutator for FakeDatabase {
    fn truncate(&self, table: &str, _schema: Option<&str>, cascade: bool) -> Result<()> {
        let suffix = if cascade { " CASCADE" } else { "" };
        self.statements
            .borrow_mut()
            .push(format!("TRUNCATE {}{}", table, suffix));
        self.check_exists(table)?;
        if self.fail_truncate.contains(table) || self.fail_all.contains(table) {
            bail!("truncate not permitted on {}", table);
        }
        Ok(())
    }

    fn delete(&self, table: &str, _schema: Option<&str>) -> Result<()> {
        self.statements
            .borrow_mut()
            .push(format!("DELETE FROM {}", table));
        self.check_exists(table)?;
        if self.fail_all.contains(table) {
            bail!("permission denied for table {}", table);
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.statements.borrow_mut().push("COMMIT".to_string());
        if self.fail_commit {
            bail!("cannot commit - no transaction is active");
        }
        Ok(())
    }
}

/// FKs declared in code, data held in DuckDB tables that carry no
/// constraints, so orphaned rows can be seeded
pub struct AuditHarness {
    pub schema: StaticSchema,
    pub db: DuckDbConnection,
}

impl AuditHarness {
    pub fn new(schema: StaticSchema, ddl: &str) -> Self {
        let db = DuckDbConnection::open_in_memory().unwrap();
        db.execute_batch(ddl).unwrap();
        Self { schema, db }
    }
}

impl SchemaIntrospector for AuditHarness {
    fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        self.schema.list_tables(schema)
    }

    fn list_foreign_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKey>> {
        self.schema.list_foreign_keys(table, schema)
    }

    fn primary_key(&self, table: &str, schema: Option<&str>) -> Result<Vec<String>> {
        self.schema.primary_key(table, schema)
    }
}

impl QueryExecutor for AuditHarness {
    fn execute(&self, sql: &str) -> Result<RowSet> {
        self.db.execute(sql)
    }
}

/// departments <- employees <- projects
pub fn linear_chain() -> StaticSchema {
    StaticSchema::new()
        .table("departments")
        .table("employees")
        .table("projects")
        .fk("employees", "dept_id", "departments", "id")
        .fk("projects", "emp_id", "employees", "id")
}

/// node_a <-> node_b
pub fn two_node_cycle() -> StaticSchema {
    StaticSchema::new()
        .table("node_a")
        .table("node_b")
        .fk("node_a", "b_id", "node_b", "id")
        .fk("node_b", "a_id", "node_a", "id")
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
