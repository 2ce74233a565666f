//! Live SQL Server connection behind the executor seam.

use async_trait::async_trait;
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::trace;

use batchsink_core::traits::SqlExecutor;
use batchsink_core::{DriverError, NullKind, ScalarValue, SinkError, SinkResult, TargetConfig};

/// One live TDS connection implementing [`SqlExecutor`].
///
/// The connection is exclusively owned by its sink for the duration of a
/// batch; there is no pooling at this layer.
pub struct MssqlExecutor {
    client: Client<Compat<TcpStream>>,
}

impl MssqlExecutor {
    /// Open a connection described by the target configuration.
    pub async fn connect(config: &TargetConfig) -> SinkResult<Self> {
        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(config.port);
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        tds.trust_cert();

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|err| SinkError::Connection(err.to_string()))?;

        Ok(MssqlExecutor { client })
    }
}

/// Adapter binding a [`ScalarValue`] as a statement parameter.
#[derive(Debug)]
struct SqlParam<'a>(&'a ScalarValue);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self.0 {
            ScalarValue::Null(kind) => match kind {
                NullKind::Text => ColumnData::String(None),
                NullKind::Int => ColumnData::I64(None),
                NullKind::Float => ColumnData::F64(None),
                NullKind::Bool => ColumnData::Bit(None),
                NullKind::Date => ColumnData::Date(None),
                NullKind::Time => ColumnData::Time(None),
                NullKind::DateTime => ColumnData::DateTime2(None),
            },
            ScalarValue::Bool(value) => ColumnData::Bit(Some(*value)),
            ScalarValue::Int(value) => ColumnData::I64(Some(*value)),
            ScalarValue::Float(value) => ColumnData::F64(Some(*value)),
            ScalarValue::Text(value) => ColumnData::String(Some(Cow::Borrowed(value))),
            ScalarValue::Date(value) => value.to_sql(),
            ScalarValue::Time(value) => value.to_sql(),
            ScalarValue::DateTime(value) => value.to_sql(),
        }
    }
}

/// Reduce a result cell to the scalar domain.
///
/// Only the shapes the sink actually queries (catalog strings and numbers)
/// are mapped faithfully; anything else degrades to a text NULL.
fn scalar_from_column(data: ColumnData<'_>) -> ScalarValue {
    match data {
        ColumnData::Bit(value) => value
            .map(ScalarValue::Bool)
            .unwrap_or(ScalarValue::Null(NullKind::Bool)),
        ColumnData::U8(value) => value
            .map(|v| ScalarValue::Int(i64::from(v)))
            .unwrap_or(ScalarValue::Null(NullKind::Int)),
        ColumnData::I16(value) => value
            .map(|v| ScalarValue::Int(i64::from(v)))
            .unwrap_or(ScalarValue::Null(NullKind::Int)),
        ColumnData::I32(value) => value
            .map(|v| ScalarValue::Int(i64::from(v)))
            .unwrap_or(ScalarValue::Null(NullKind::Int)),
        ColumnData::I64(value) => value
            .map(ScalarValue::Int)
            .unwrap_or(ScalarValue::Null(NullKind::Int)),
        ColumnData::F32(value) => value
            .map(|v| ScalarValue::Float(f64::from(v)))
            .unwrap_or(ScalarValue::Null(NullKind::Float)),
        ColumnData::F64(value) => value
            .map(ScalarValue::Float)
            .unwrap_or(ScalarValue::Null(NullKind::Float)),
        ColumnData::String(value) => value
            .map(|text| ScalarValue::Text(text.into_owned()))
            .unwrap_or(ScalarValue::Null(NullKind::Text)),
        ColumnData::Numeric(value) => value
            .map(|numeric| {
                let scale = 10f64.powi(i32::from(numeric.scale()));
                ScalarValue::Float(numeric.value() as f64 / scale)
            })
            .unwrap_or(ScalarValue::Null(NullKind::Float)),
        ColumnData::Guid(value) => value
            .map(|guid| ScalarValue::Text(guid.to_string()))
            .unwrap_or(ScalarValue::Null(NullKind::Text)),
        other => {
            trace!(?other, "unmapped result column type");
            ScalarValue::Null(NullKind::Text)
        }
    }
}

#[async_trait]
impl SqlExecutor for MssqlExecutor {
    async fn execute(&mut self, sql: &str, params: &[ScalarValue]) -> Result<u64, DriverError> {
        let wrapped: Vec<SqlParam<'_>> = params.iter().map(SqlParam).collect();
        let refs: Vec<&dyn ToSql> = wrapped.iter().map(|param| param as &dyn ToSql).collect();
        let result = self
            .client
            .execute(sql, &refs)
            .await
            .map_err(|err| DriverError(err.to_string()))?;
        Ok(result.total())
    }

    async fn query_rows(
        &mut self,
        sql: &str,
        params: &[ScalarValue],
    ) -> Result<Vec<Vec<ScalarValue>>, DriverError> {
        let wrapped: Vec<SqlParam<'_>> = params.iter().map(SqlParam).collect();
        let refs: Vec<&dyn ToSql> = wrapped.iter().map(|param| param as &dyn ToSql).collect();
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|err| DriverError(err.to_string()))?
            .into_first_result()
            .await
            .map_err(|err| DriverError(err.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(scalar_from_column).collect())
            .collect())
    }
}
