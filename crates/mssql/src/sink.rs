//! The SQL Server implementation of the sink capability set.

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use batchsink_core::traits::{SinkConnector, SqlExecutor};
use batchsink_core::{
    merge_sql_types, ColumnSpec, Record, ScalarValue, SinkError, SinkPolicy, SinkResult, SqlType,
    StagingTable, TableName, TableSpec,
};

use crate::ddl::{
    build_add_column, build_alter_column, build_create_table, qualify, type_from_catalog,
    IDENTITY_COLUMN_SQL, LIVE_COLUMNS_SQL, TABLE_EXISTS_SQL,
};
use crate::merge::{build_append_statement, build_drop_table, build_merge_statement};
use crate::staging::{
    build_drop_if_exists, build_identity_toggle, build_insert_chunk, build_select_into,
    coerce_record, MAX_STATEMENT_PARAMS,
};

/// SQL Server sink: owns one executor (one live connection) and applies the
/// provision, stage, and merge operations against it.
pub struct MssqlSink<E> {
    executor: E,
    policy: SinkPolicy,
    default_schema: String,
}

impl<E: SqlExecutor> MssqlSink<E> {
    /// Wrap an executor with the given policy and default schema.
    pub fn new(executor: E, policy: SinkPolicy, default_schema: impl Into<String>) -> Self {
        MssqlSink {
            executor,
            policy,
            default_schema: default_schema.into(),
        }
    }

    /// Recover the executor, e.g. to inspect a test double.
    pub fn into_executor(self) -> E {
        self.executor
    }

    fn qualify(&self, table: &TableName) -> String {
        qualify(table, &self.default_schema)
    }

    fn schema_of<'a>(&'a self, table: &'a TableName) -> &'a str {
        table.schema.as_deref().unwrap_or(&self.default_schema)
    }

    async fn table_exists(&mut self, table: &TableName) -> SinkResult<bool> {
        let params = [
            ScalarValue::Text(self.schema_of(table).to_string()),
            ScalarValue::Text(table.table.clone()),
        ];
        let rows = self
            .executor
            .query_rows(TABLE_EXISTS_SQL, &params)
            .await
            .map_err(|err| {
                SinkError::Connection(format!("checking existence of '{}': {}", table, err))
            })?;
        Ok(!rows.is_empty())
    }

    async fn live_columns(&mut self, table: &TableName) -> SinkResult<Vec<(String, SqlType)>> {
        let params = [
            ScalarValue::Text(self.schema_of(table).to_string()),
            ScalarValue::Text(table.table.clone()),
        ];
        let rows = self
            .executor
            .query_rows(LIVE_COLUMNS_SQL, &params)
            .await
            .map_err(|err| {
                SinkError::Connection(format!("reading columns of '{}': {}", table, err))
            })?;

        rows.into_iter()
            .map(|row| {
                let name = row
                    .first()
                    .and_then(ScalarValue::as_text)
                    .ok_or_else(|| {
                        SinkError::Connection(format!("catalog row for '{}' missing COLUMN_NAME", table))
                    })?
                    .to_string();
                let data_type = row.get(1).and_then(ScalarValue::as_text).unwrap_or_default();
                let sql_type = type_from_catalog(
                    data_type,
                    row.get(2).and_then(ScalarValue::as_int),
                    row.get(3).and_then(ScalarValue::as_int),
                    row.get(4).and_then(ScalarValue::as_int),
                );
                Ok((name, sql_type))
            })
            .collect()
    }

    async fn identity_column(&mut self, table: &TableName) -> SinkResult<Option<String>> {
        let params = [
            ScalarValue::Text(self.schema_of(table).to_string()),
            ScalarValue::Text(table.table.clone()),
        ];
        let rows = self
            .executor
            .query_rows(IDENTITY_COLUMN_SQL, &params)
            .await
            .map_err(|err| {
                SinkError::Connection(format!("reading identity column of '{}': {}", table, err))
            })?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(ScalarValue::as_text)
            .map(str::to_string))
    }

    async fn ensure_column_against(
        &mut self,
        table: &TableName,
        column: &ColumnSpec,
        live: &[(String, SqlType)],
    ) -> SinkResult<()> {
        let table_q = self.qualify(table);
        let existing = live
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&column.name));

        match existing {
            None => {
                if !self.policy.allow_column_add {
                    return Err(SinkError::unsupported("adding columns", table));
                }
                let sql = build_add_column(&table_q, column);
                info!(table = %table, column = %column.name, "adding missing column");
                self.executor.execute(&sql, &[]).await.map_err(|err| {
                    SinkError::ddl_column(table, &column.name, err.to_string())
                })?;
            }
            Some((_, live_type)) => {
                if *live_type == column.sql_type {
                    trace!(table = %table, column = %column.name, "column already up to date");
                    return Ok(());
                }
                let merged = merge_sql_types(live_type, &column.sql_type);
                if merged == *live_type {
                    debug!(
                        table = %table,
                        column = %column.name,
                        "type already compatible, no DDL issued"
                    );
                    return Ok(());
                }
                if !self.policy.allow_column_alter {
                    return Err(SinkError::unsupported("altering columns", table));
                }
                let sql = build_alter_column(&table_q, &column.name, &merged);
                info!(
                    table = %table,
                    column = %column.name,
                    from = %live_type,
                    to = %merged,
                    "widening column"
                );
                self.executor.execute(&sql, &[]).await.map_err(|err| {
                    SinkError::ddl_column(table, &column.name, err.to_string())
                })?;
            }
        }
        Ok(())
    }

    /// Create the staging table and load every coerced row into it. Cleanup
    /// on failure is handled by the caller.
    async fn load_into_staging(
        &mut self,
        spec: &TableSpec,
        records: &[Record],
        staging: &TableName,
    ) -> SinkResult<u64> {
        let staging_q = self.qualify(staging);
        let target_q = self.qualify(&spec.name);

        // A staging table abandoned by an earlier failed merge would collide
        // with the SELECT INTO.
        self.executor
            .execute(&build_drop_if_exists(&staging_q), &[])
            .await
            .map_err(|err| SinkError::ddl(staging, err.to_string()))?;
        self.executor
            .execute(&build_select_into(&staging_q, &target_q), &[])
            .await
            .map_err(|err| SinkError::ddl(staging, err.to_string()))?;

        let mut rows: Vec<Vec<ScalarValue>> = Vec::with_capacity(records.len());
        for record in records {
            rows.push(coerce_record(record, spec)?);
        }
        if rows.is_empty() {
            return Ok(0);
        }

        // Explicit identity values need the insert-mode override, scoped to
        // this load and restored on every exit path.
        let identity = self.identity_column(&spec.name).await?;
        let override_identity = identity
            .map(|column| {
                spec.columns
                    .iter()
                    .position(|spec_column| spec_column.name.eq_ignore_ascii_case(&column))
                    .is_some_and(|index| rows.iter().any(|row| !row[index].is_null()))
            })
            .unwrap_or(false);

        if override_identity {
            debug!(staging = %staging, "enabling explicit identity insertion");
            self.executor
                .execute(&build_identity_toggle(&staging_q, true), &[])
                .await
                .map_err(|err| SinkError::load(&spec.name, err.to_string()))?;
        }

        let insert_result = self.insert_rows(&staging_q, spec, &rows).await;

        if override_identity {
            if let Err(restore_err) = self
                .executor
                .execute(&build_identity_toggle(&staging_q, false), &[])
                .await
            {
                match &insert_result {
                    Ok(()) => {
                        return Err(SinkError::load(
                            &spec.name,
                            format!("restoring identity insert mode: {}", restore_err),
                        ))
                    }
                    Err(_) => warn!(
                        staging = %staging,
                        error = %restore_err,
                        "failed to restore identity insert mode after failed load"
                    ),
                }
            }
        }

        insert_result?;
        Ok(rows.len() as u64)
    }

    async fn insert_rows(
        &mut self,
        staging_q: &str,
        spec: &TableSpec,
        rows: &[Vec<ScalarValue>],
    ) -> SinkResult<()> {
        let columns = spec.column_names();
        let rows_per_chunk = (MAX_STATEMENT_PARAMS / columns.len().max(1)).max(1);
        for chunk in rows.chunks(rows_per_chunk) {
            let sql = build_insert_chunk(staging_q, &columns, chunk.len());
            let params: Vec<ScalarValue> = chunk.iter().flatten().cloned().collect();
            self.executor
                .execute(&sql, &params)
                .await
                .map_err(|err| SinkError::load(&spec.name, err.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl<E: SqlExecutor> SinkConnector for MssqlSink<E> {
    async fn ensure_table(&mut self, spec: &TableSpec) -> SinkResult<()> {
        if !self.table_exists(&spec.name).await? {
            let sql = build_create_table(spec, &self.default_schema);
            info!(table = %spec.name, columns = spec.columns.len(), "creating table");
            self.executor
                .execute(&sql, &[])
                .await
                .map_err(|err| SinkError::ddl(&spec.name, err.to_string()))?;
            return Ok(());
        }

        let live = self.live_columns(&spec.name).await?;
        for column in &spec.columns {
            self.ensure_column_against(&spec.name, column, &live).await?;
        }
        Ok(())
    }

    async fn ensure_column(&mut self, table: &TableName, column: &ColumnSpec) -> SinkResult<()> {
        let live = self.live_columns(table).await?;
        self.ensure_column_against(table, column, &live).await
    }

    async fn stage(&mut self, spec: &TableSpec, records: &[Record]) -> SinkResult<StagingTable> {
        if !self.policy.allow_temp_tables {
            return Err(SinkError::unsupported("staging table creation", &spec.name));
        }
        let staging = spec.name.staging();

        match self.load_into_staging(spec, records, &staging).await {
            Ok(rows) => Ok(StagingTable {
                name: staging,
                rows,
            }),
            Err(err) => {
                // No partial staging: the staging table never outlives a
                // failed load.
                let staging_q = self.qualify(&staging);
                if let Err(drop_err) = self
                    .executor
                    .execute(&build_drop_if_exists(&staging_q), &[])
                    .await
                {
                    warn!(
                        staging = %staging,
                        error = %drop_err,
                        "failed to drop staging table after failed load"
                    );
                }
                Err(err)
            }
        }
    }

    async fn merge_and_close(
        &mut self,
        staging: &StagingTable,
        target: &TableSpec,
        join_keys: &[String],
    ) -> SinkResult<u64> {
        let target_q = self.qualify(&target.name);
        let staging_q = self.qualify(&staging.name);
        let columns = target.column_names();

        let use_merge = !join_keys.is_empty() && self.policy.allow_merge_upsert;
        if !join_keys.is_empty() && !self.policy.allow_merge_upsert {
            debug!(table = %target.name, "merge upsert disabled by policy, applying append-only");
        }
        let sql = if use_merge {
            build_merge_statement(&target_q, &staging_q, &columns, join_keys)
        } else {
            build_append_statement(&target_q, &staging_q, &columns)
        };

        let affected = self
            .executor
            .execute(&sql, &[])
            .await
            .map_err(|err| SinkError::merge(&target.name, &staging.name, err.to_string()))?;

        // The staging table only goes away after the merge landed; a failed
        // merge leaves it behind for inspection.
        self.executor
            .execute(&build_drop_table(&staging_q), &[])
            .await
            .map_err(|err| SinkError::ddl(&staging.name, err.to_string()))?;

        debug!(table = %target.name, affected, "merge applied and staging dropped");
        Ok(affected)
    }
}
