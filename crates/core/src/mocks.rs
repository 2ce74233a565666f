//! In-memory mock connector for orchestrator and pipeline tests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{SinkError, SinkResult};
use crate::traits::SinkConnector;
use crate::typemap::merge_sql_types;
use crate::types::{ColumnSpec, Record, StagingTable, TableName, TableSpec};

/// One simulated destination table.
#[derive(Clone, Debug)]
pub struct MockTable {
    /// Live column set, reconciled the same way the real provisioner does.
    pub columns: Vec<ColumnSpec>,
    /// Current rows, in insertion order.
    pub rows: Vec<Record>,
}

/// Mock [`SinkConnector`] that models tables, staging, and merge semantics in
/// memory.
///
/// Structural changes are recorded in a DDL log so tests can assert
/// idempotence, and each phase can be made to fail for error-path tests.
#[derive(Default)]
pub struct MockSinkConnector {
    tables: HashMap<String, MockTable>,
    staged: HashMap<String, Vec<Record>>,
    ddl_log: Vec<String>,
    /// When set, `stage` fails with a `Load` error.
    pub fail_stage: bool,
    /// When set, `merge_and_close` fails with a `Merge` error and leaves the
    /// staging table in place.
    pub fail_merge: bool,
}

impl MockSinkConnector {
    /// Empty mock with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently in a destination table.
    pub fn table_rows(&self, table: &TableName) -> Option<&Vec<Record>> {
        self.tables.get(&table.to_string()).map(|t| &t.rows)
    }

    /// Live columns of a destination table.
    pub fn table_columns(&self, table: &TableName) -> Option<&Vec<ColumnSpec>> {
        self.tables.get(&table.to_string()).map(|t| &t.columns)
    }

    /// Names of staging tables still alive.
    pub fn staging_tables(&self) -> Vec<&str> {
        self.staged.keys().map(String::as_str).collect()
    }

    /// Structural changes applied so far, one entry per DDL-equivalent.
    pub fn ddl_log(&self) -> &[String] {
        &self.ddl_log
    }

    fn reconcile_column(live: &mut Vec<ColumnSpec>, desired: &ColumnSpec, log: &mut Vec<String>, table: &str) {
        match live.iter_mut().find(|c| c.name == desired.name) {
            None => {
                log.push(format!("add column {}.{}", table, desired.name));
                live.push(desired.clone());
            }
            Some(existing) => {
                if existing.sql_type != desired.sql_type {
                    let merged = merge_sql_types(&existing.sql_type, &desired.sql_type);
                    if merged != existing.sql_type {
                        log.push(format!("alter column {}.{}", table, desired.name));
                        existing.sql_type = merged;
                    }
                }
            }
        }
    }

    fn key_of(record: &Record, join_keys: &[String]) -> Vec<serde_json::Value> {
        join_keys
            .iter()
            .map(|key| record.get(key).cloned().unwrap_or(serde_json::Value::Null))
            .collect()
    }
}

#[async_trait]
impl SinkConnector for MockSinkConnector {
    async fn ensure_table(&mut self, spec: &TableSpec) -> SinkResult<()> {
        let key = spec.name.to_string();
        match self.tables.entry(key.clone()) {
            Entry::Vacant(slot) => {
                self.ddl_log.push(format!("create table {}", key));
                slot.insert(MockTable {
                    columns: spec.columns.clone(),
                    rows: Vec::new(),
                });
            }
            Entry::Occupied(slot) => {
                let table = slot.into_mut();
                for desired in &spec.columns {
                    Self::reconcile_column(&mut table.columns, desired, &mut self.ddl_log, &key);
                }
            }
        }
        Ok(())
    }

    async fn ensure_column(&mut self, table: &TableName, column: &ColumnSpec) -> SinkResult<()> {
        let key = table.to_string();
        let entry = self
            .tables
            .get_mut(&key)
            .ok_or_else(|| SinkError::ddl(table, "table does not exist"))?;
        Self::reconcile_column(&mut entry.columns, column, &mut self.ddl_log, &key);
        Ok(())
    }

    async fn stage(&mut self, spec: &TableSpec, records: &[Record]) -> SinkResult<StagingTable> {
        if self.fail_stage {
            return Err(SinkError::load(&spec.name, "injected staging failure"));
        }
        // Normalize records to the declared column set, writing explicit
        // nulls for absent fields, the way the real staging insert does.
        let rows: Vec<Record> = records
            .iter()
            .map(|record| {
                spec.columns
                    .iter()
                    .map(|column| {
                        let value = record
                            .get(&column.name)
                            .cloned()
                            .unwrap_or(serde_json::Value::Null);
                        (column.name.clone(), value)
                    })
                    .collect()
            })
            .collect();

        let staging = spec.name.staging();
        let count = rows.len() as u64;
        self.staged.insert(staging.to_string(), rows);
        Ok(StagingTable {
            name: staging,
            rows: count,
        })
    }

    async fn merge_and_close(
        &mut self,
        staging: &StagingTable,
        target: &TableSpec,
        join_keys: &[String],
    ) -> SinkResult<u64> {
        if self.fail_merge {
            return Err(SinkError::merge(
                &target.name,
                &staging.name,
                "injected merge failure",
            ));
        }
        let rows = self
            .staged
            .remove(&staging.name.to_string())
            .ok_or_else(|| {
                SinkError::merge(&target.name, &staging.name, "staging table does not exist")
            })?;
        let table = self
            .tables
            .get_mut(&target.name.to_string())
            .ok_or_else(|| {
                SinkError::merge(&target.name, &staging.name, "target table does not exist")
            })?;

        let mut affected = 0u64;
        for staged in rows {
            let position = if join_keys.is_empty() {
                None
            } else {
                let key = Self::key_of(&staged, join_keys);
                table
                    .rows
                    .iter()
                    .position(|row| Self::key_of(row, join_keys) == key)
            };
            match position {
                Some(index) => {
                    let existing = &mut table.rows[index];
                    for (name, value) in &staged {
                        if !join_keys.contains(name) {
                            existing.insert(name.clone(), value.clone());
                        }
                    }
                }
                None => table.rows.push(staged),
            }
            affected += 1;
        }
        Ok(affected)
    }
}
