//! Error types for batch loading operations.

use thiserror::Error;

use crate::types::TableName;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Raw failure surfaced by a SQL executor.
///
/// Driver errors are reduced to their message at the executor boundary;
/// components re-wrap them with operation, table, and column context before
/// they reach a caller.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

/// Errors that can occur while loading a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The upstream schema declares no property map; the batch is rejected
    /// and the stream is invalid.
    #[error("schema for '{table}' does not declare any properties")]
    Schema {
        /// Destination table the schema was for.
        table: String,
    },

    /// A required DDL operation is disabled by target policy.
    #[error("{operation} on '{table}' is disabled by target policy")]
    Unsupported {
        /// The policy-gated operation.
        operation: &'static str,
        /// Table the operation targeted.
        table: String,
    },

    /// The target rejected a structurally valid DDL statement.
    #[error("DDL against '{table}' failed: {message}")]
    Ddl {
        /// Table the statement targeted.
        table: String,
        /// Column involved, when the statement was column-scoped.
        column: Option<String>,
        /// Driver message.
        message: String,
    },

    /// The staging insert rejected a row; the whole batch is rejected.
    #[error("staging load for '{table}' failed: {message}")]
    Load {
        /// Target table the batch was destined for.
        table: String,
        /// Column the failing value belonged to, when known.
        column: Option<String>,
        /// Failure detail.
        message: String,
    },

    /// The merge statement failed; the staging table is preserved for
    /// inspection.
    #[error("merge from '{staging}' into '{table}' failed: {message}")]
    Merge {
        /// Target table.
        table: String,
        /// Staging table left in place.
        staging: String,
        /// Driver message.
        message: String,
    },

    /// Connecting to or talking to the target failed outside any statement
    /// context.
    #[error("database connection error: {0}")]
    Connection(String),

    /// The orchestrator was driven through an invalid transition.
    #[error("invalid load state: {0}")]
    InvalidState(String),
}

impl SinkError {
    /// Schema error for a table.
    pub fn schema(table: &TableName) -> Self {
        SinkError::Schema {
            table: table.to_string(),
        }
    }

    /// Policy-disabled operation.
    pub fn unsupported(operation: &'static str, table: &TableName) -> Self {
        SinkError::Unsupported {
            operation,
            table: table.to_string(),
        }
    }

    /// Rejected DDL with table context.
    pub fn ddl(table: &TableName, message: impl Into<String>) -> Self {
        SinkError::Ddl {
            table: table.to_string(),
            column: None,
            message: message.into(),
        }
    }

    /// Rejected DDL with table and column context.
    pub fn ddl_column(table: &TableName, column: &str, message: impl Into<String>) -> Self {
        SinkError::Ddl {
            table: table.to_string(),
            column: Some(column.to_string()),
            message: message.into(),
        }
    }

    /// Staging failure with table context.
    pub fn load(table: &TableName, message: impl Into<String>) -> Self {
        SinkError::Load {
            table: table.to_string(),
            column: None,
            message: message.into(),
        }
    }

    /// Staging failure with table and column context.
    pub fn load_column(table: &TableName, column: &str, message: impl Into<String>) -> Self {
        SinkError::Load {
            table: table.to_string(),
            column: Some(column.to_string()),
            message: message.into(),
        }
    }

    /// Merge failure naming both tables.
    pub fn merge(table: &TableName, staging: &TableName, message: impl Into<String>) -> Self {
        SinkError::Merge {
            table: table.to_string(),
            staging: staging.to_string(),
            message: message.into(),
        }
    }
}
