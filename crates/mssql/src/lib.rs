//! batchsink-mssql
//!
//! SQL Server dialect for the batchsink load pipeline: DDL provisioning,
//! staged bulk loading with identity-insert handling, and merge upsert, all
//! driven over one tiberius connection.

#![warn(missing_docs)]

mod connection;
mod ddl;
mod merge;
mod sink;
mod staging;

pub use connection::MssqlExecutor;
pub use sink::MssqlSink;

use batchsink_core::{LoadOrchestrator, SinkPolicy, SinkResult, TargetConfig};

/// Connect to the target and wrap the connection in a sink.
pub async fn connect(
    config: &TargetConfig,
    policy: SinkPolicy,
) -> SinkResult<MssqlSink<MssqlExecutor>> {
    let executor = MssqlExecutor::connect(config).await?;
    Ok(MssqlSink::new(executor, policy, config.default_schema.clone()))
}

/// Connect and build a ready-to-run orchestrator for one batch.
pub async fn orchestrator(
    config: &TargetConfig,
    policy: SinkPolicy,
) -> SinkResult<LoadOrchestrator<MssqlSink<MssqlExecutor>>> {
    Ok(LoadOrchestrator::new(connect(config, policy).await?))
}
