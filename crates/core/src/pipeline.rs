//! Per-batch load orchestration.

use tracing::{debug, info, info_span, warn};

use crate::conform::conform;
use crate::error::{SinkError, SinkResult};
use crate::traits::SinkConnector;
use crate::types::{Batch, BatchStats};

/// Phase of a batch load.
///
/// A batch moves `Idle → Provisioning → Staging → Merging → Done`, or lands
/// in `Failed` from any non-terminal phase. No phase is re-entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPhase {
    /// No batch accepted yet.
    Idle,
    /// Reconciling the destination table with the batch schema.
    Provisioning,
    /// Writing records into the staging table.
    Staging,
    /// Applying staged rows to the target.
    Merging,
    /// Batch fully applied; staging table gone.
    Done,
    /// Batch rejected; retry requires a fresh orchestrator.
    Failed,
}

impl LoadPhase {
    /// True once the orchestrator can accept no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadPhase::Done | LoadPhase::Failed)
    }

    /// Phase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPhase::Idle => "idle",
            LoadPhase::Provisioning => "provisioning",
            LoadPhase::Staging => "staging",
            LoadPhase::Merging => "merging",
            LoadPhase::Done => "done",
            LoadPhase::Failed => "failed",
        }
    }
}

/// Sequences provision, stage, merge, and cleanup for one batch.
///
/// The orchestrator exclusively owns its connector (and therefore the
/// underlying connection) for the batch's lifetime. A failed batch is retried
/// by constructing a fresh instance, never by resuming this one.
pub struct LoadOrchestrator<C> {
    connector: C,
    phase: LoadPhase,
}

impl<C: SinkConnector> LoadOrchestrator<C> {
    /// Wrap a connector, starting in `Idle`.
    pub fn new(connector: C) -> Self {
        LoadOrchestrator {
            connector,
            phase: LoadPhase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Recover the connector, e.g. to hand it to a fresh orchestrator.
    pub fn into_inner(self) -> C {
        self.connector
    }

    /// Process one batch to completion or failure.
    ///
    /// The destination is reconciled with the batch schema before any data
    /// movement, so staging never lags behind the target. On success the
    /// staging table is gone; on a merge failure it is left for inspection.
    pub async fn run(&mut self, batch: &Batch) -> SinkResult<BatchStats> {
        if self.phase != LoadPhase::Idle {
            return Err(SinkError::InvalidState(format!(
                "orchestrator already ran (phase '{}'); retry with a fresh instance",
                self.phase.as_str()
            )));
        }

        let span = info_span!("load_batch", table = %batch.table, records = batch.records.len());
        let _guard = span.enter();

        let spec = match conform(&batch.schema, &batch.table, &batch.primary_keys) {
            Ok(spec) => spec,
            Err(err) => return self.fail(err),
        };

        self.phase = LoadPhase::Provisioning;
        debug!(table = %batch.table, columns = spec.columns.len(), "provisioning destination");
        if let Err(err) = self.connector.ensure_table(&spec).await {
            return self.fail(err);
        }

        self.phase = LoadPhase::Staging;
        let staging = match self.connector.stage(&spec, &batch.records).await {
            Ok(staging) => staging,
            Err(err) => return self.fail(err),
        };
        debug!(staging = %staging.name, rows = staging.rows, "batch staged");

        self.phase = LoadPhase::Merging;
        let rows_affected = match self
            .connector
            .merge_and_close(&staging, &spec, &batch.primary_keys)
            .await
        {
            Ok(affected) => affected,
            Err(err) => {
                warn!(staging = %staging.name, "merge failed; staging table kept for inspection");
                return self.fail(err);
            }
        };

        self.phase = LoadPhase::Done;
        let stats = BatchStats {
            rows_staged: staging.rows,
            rows_affected,
        };
        info!(table = %batch.table, "{}", stats.summary());
        Ok(stats)
    }

    fn fail<T>(&mut self, err: SinkError) -> SinkResult<T> {
        self.phase = LoadPhase::Failed;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockSinkConnector;
    use crate::types::{Batch, SchemaSpec, TableName};
    use serde_json::json;

    fn batch(records: Vec<serde_json::Value>) -> Batch {
        let schema = SchemaSpec::from_value(json!({
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            }
        }))
        .unwrap();
        Batch {
            table: TableName::new("dbo", "users"),
            schema,
            primary_keys: vec!["id".to_string()],
            records: records
                .into_iter()
                .map(|value| value.as_object().unwrap().clone())
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_orchestrator_is_single_shot() {
        let mut orchestrator = LoadOrchestrator::new(MockSinkConnector::new());
        let batch = batch(vec![json!({"id": 1, "name": "a"})]);
        orchestrator.run(&batch).await.unwrap();
        assert_eq!(orchestrator.phase(), LoadPhase::Done);

        let err = orchestrator.run(&batch).await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_schema_error_fails_before_any_side_effect() {
        let mut orchestrator = LoadOrchestrator::new(MockSinkConnector::new());
        let empty = Batch {
            table: TableName::bare("t"),
            schema: SchemaSpec::default(),
            primary_keys: vec![],
            records: vec![],
        };
        let err = orchestrator.run(&empty).await.unwrap_err();
        assert!(matches!(err, SinkError::Schema { .. }));
        assert_eq!(orchestrator.phase(), LoadPhase::Failed);
        assert!(orchestrator.into_inner().ddl_log().is_empty());
    }
}
