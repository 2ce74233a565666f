//! Schema conformance: turn a JSON schema into an ordered column list.

use tracing::debug;

use crate::error::{SinkError, SinkResult};
use crate::typemap::{map_type, SqlType, KEY_TEXT_CHARS};
use crate::types::{ColumnSpec, SchemaSpec, TableName, TableSpec};

/// Normalize a schema's property set into the desired table shape.
///
/// Properties are walked in their declared order, one column per property.
/// A column is marked primary when its name appears in `primary_keys`, and a
/// primary-key text column is narrowed to [`KEY_TEXT_CHARS`] because the
/// target rejects wide keys in an index.
pub fn conform(
    schema: &SchemaSpec,
    table: &TableName,
    primary_keys: &[String],
) -> SinkResult<TableSpec> {
    if schema.properties.is_empty() {
        return Err(SinkError::schema(table));
    }

    let columns = schema
        .properties
        .iter()
        .map(|(name, property)| {
            let primary = primary_keys.iter().any(|key| key == name);
            let mut sql_type = map_type(property);
            if primary {
                if let SqlType::Text { max_chars } = sql_type {
                    if max_chars > KEY_TEXT_CHARS {
                        debug!(
                            table = %table,
                            column = %name,
                            "narrowing key text column to {} chars", KEY_TEXT_CHARS
                        );
                        sql_type = SqlType::Text {
                            max_chars: KEY_TEXT_CHARS,
                        };
                    }
                }
            }
            ColumnSpec {
                name: name.clone(),
                sql_type,
                primary,
            }
        })
        .collect();

    Ok(TableSpec {
        name: table.clone(),
        columns,
    })
}
