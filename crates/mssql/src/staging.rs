//! Staging table creation, record coercion, and the bulk insert path.

use batchsink_core::{
    NullKind, Record, ScalarValue, SinkError, SinkResult, SqlType, TableName, TableSpec,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::ddl::quote_ident;

/// The target caps one statement at 2100 bound parameters; chunks stay under
/// that with room for rounding.
pub(crate) const MAX_STATEMENT_PARAMS: usize = 2000;

/// Copy-structure-zero-rows DDL: an empty table shaped like the target.
pub(crate) fn build_select_into(staging_q: &str, target_q: &str) -> String {
    format!("SELECT TOP 0 * INTO {} FROM {}", staging_q, target_q)
}

/// Drop a staging table, tolerating its absence.
pub(crate) fn build_drop_if_exists(table_q: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table_q)
}

/// Toggle explicit identity-value insertion for a table.
pub(crate) fn build_identity_toggle(table_q: &str, on: bool) -> String {
    format!(
        "SET IDENTITY_INSERT {} {}",
        table_q,
        if on { "ON" } else { "OFF" }
    )
}

/// Positional multi-row INSERT with `@P`-numbered placeholders.
pub(crate) fn build_insert_chunk(staging_q: &str, columns: &[&str], row_count: usize) -> String {
    let col_list: Vec<String> = columns.iter().map(|name| quote_ident(name)).collect();
    let mut param = 0usize;
    let rows: Vec<String> = (0..row_count)
        .map(|_| {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|_| {
                    param += 1;
                    format!("@P{}", param)
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        staging_q,
        col_list.join(", "),
        rows.join(", ")
    )
}

/// The typed NULL a column binds when a record omits its field.
pub(crate) fn null_kind(sql_type: &SqlType) -> NullKind {
    match sql_type {
        SqlType::Text { .. } | SqlType::BoolText => NullKind::Text,
        SqlType::Integer => NullKind::Int,
        SqlType::Decimal { .. } => NullKind::Float,
        SqlType::Date => NullKind::Date,
        SqlType::Time => NullKind::Time,
        SqlType::Timestamp => NullKind::DateTime,
    }
}

fn load_err(table: &TableName, column: &str, message: String) -> SinkError {
    SinkError::load_column(table, column, message)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Coerce one record field into the bound-parameter domain of its column.
///
/// A value that does not fit the column's type or width rejects the whole
/// batch, so the message names the offending column.
pub(crate) fn coerce_value(
    value: Option<&Value>,
    sql_type: &SqlType,
    table: &TableName,
    column: &str,
) -> SinkResult<ScalarValue> {
    let value = match value {
        None | Some(Value::Null) => return Ok(ScalarValue::Null(null_kind(sql_type))),
        Some(value) => value,
    };

    match sql_type {
        SqlType::Integer => match value {
            Value::Number(number) => number.as_i64().map(ScalarValue::Int).ok_or_else(|| {
                load_err(table, column, format!("integer out of range: {}", number))
            }),
            other => Err(load_err(
                table,
                column,
                format!("expected integer, got {}", json_kind(other)),
            )),
        },
        SqlType::Decimal { .. } => match value {
            Value::Number(number) => number.as_f64().map(ScalarValue::Float).ok_or_else(|| {
                load_err(table, column, format!("number out of range: {}", number))
            }),
            other => Err(load_err(
                table,
                column,
                format!("expected number, got {}", json_kind(other)),
            )),
        },
        SqlType::Text { max_chars } => {
            let text = match value {
                Value::String(text) => text.clone(),
                // Objects and arrays land serialized; scalars as their
                // canonical text form.
                other => other.to_string(),
            };
            let chars = text.chars().count();
            if chars > *max_chars as usize {
                return Err(load_err(
                    table,
                    column,
                    format!("value of {} characters exceeds column width {}", chars, max_chars),
                ));
            }
            Ok(ScalarValue::Text(text))
        }
        SqlType::BoolText => match value {
            Value::Bool(flag) => Ok(ScalarValue::Text(
                if *flag { "true" } else { "false" }.to_string(),
            )),
            Value::String(text) => Ok(ScalarValue::Text(text.clone())),
            other => Err(load_err(
                table,
                column,
                format!("expected boolean, got {}", json_kind(other)),
            )),
        },
        SqlType::Date => match value {
            Value::String(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(ScalarValue::Date)
                .map_err(|err| load_err(table, column, format!("invalid date '{}': {}", text, err))),
            other => Err(load_err(
                table,
                column,
                format!("expected date string, got {}", json_kind(other)),
            )),
        },
        SqlType::Time => match value {
            Value::String(text) => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .map(ScalarValue::Time)
                .map_err(|err| load_err(table, column, format!("invalid time '{}': {}", text, err))),
            other => Err(load_err(
                table,
                column,
                format!("expected time string, got {}", json_kind(other)),
            )),
        },
        SqlType::Timestamp => match value {
            Value::String(text) => parse_timestamp(text).map(ScalarValue::DateTime).ok_or_else(|| {
                load_err(table, column, format!("invalid timestamp '{}'", text))
            }),
            other => Err(load_err(
                table,
                column,
                format!("expected timestamp string, got {}", json_kind(other)),
            )),
        },
    }
}

/// Coerce a full record positionally against the table spec.
pub(crate) fn coerce_record(record: &Record, spec: &TableSpec) -> SinkResult<Vec<ScalarValue>> {
    spec.columns
        .iter()
        .map(|column| coerce_value(record.get(&column.name), &column.sql_type, &spec.name, &column.name))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
