//! Core domain types for batch loading into a relational target.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::typemap::SqlType;

/// A single record as received from the upstream stream: a mapping from
/// property name to a JSON scalar (or `null` for unset optional fields).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Type tag of a JSON-Schema property, either a single primitive name or a
/// list of alternatives (the list form is how upstream expresses nullability,
/// e.g. `["string", "null"]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeTag {
    /// A single type name, e.g. `"string"`.
    One(String),
    /// A list of alternative type names, e.g. `["string", "null"]`.
    Many(Vec<String>),
}

impl TypeTag {
    /// True if any of `wanted` appears in this tag.
    pub fn includes_any(&self, wanted: &[&str]) -> bool {
        match self {
            TypeTag::One(name) => wanted.contains(&name.as_str()),
            TypeTag::Many(names) => names.iter().any(|name| wanted.contains(&name.as_str())),
        }
    }
}

/// A named field description from the upstream JSON schema.
///
/// Only the keys that drive type mapping are retained; everything else in the
/// property object is ignored on deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertySchema {
    /// Primitive type tag (string/integer/number/boolean/object/array).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<TypeTag>,
    /// Optional format hint (`date`, `date-time`, `time`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Optional declared maximum length for string properties.
    #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// Union of alternative property schemas.
    #[serde(default, rename = "anyOf", skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<PropertySchema>,
}

impl PropertySchema {
    /// True if this property supports any of the `wanted` primitive types,
    /// either directly in its type tag or through an `anyOf` alternative.
    pub fn supports_type(&self, wanted: &[&str]) -> bool {
        if let Some(tag) = &self.type_tag {
            if tag.includes_any(wanted) {
                return true;
            }
        }
        self.any_of.iter().any(|alt| alt.supports_type(wanted))
    }

    /// The date-like format hint for this property, if one is declared on the
    /// property itself or on one of its `anyOf` alternatives.
    pub fn datelike_format(&self) -> Option<&str> {
        const DATELIKE: [&str; 3] = ["date-time", "time", "date"];
        if let Some(format) = self.format.as_deref() {
            if DATELIKE.contains(&format) {
                return Some(format);
            }
        }
        self.any_of.iter().find_map(|alt| alt.datelike_format())
    }
}

/// The JSON-Schema object describing one stream's record shape.
///
/// Property order is preserved from the wire representation; column order in
/// generated DDL and DML follows it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Ordered property map. Empty when the upstream schema declares none.
    #[serde(default)]
    pub properties: IndexMap<String, PropertySchema>,
}

impl SchemaSpec {
    /// Parse a schema from its JSON representation.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A destination table name, optionally schema-qualified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    /// Schema (namespace) the table lives in; the target default applies when absent.
    pub schema: Option<String>,
    /// Unqualified table name.
    pub table: String,
}

impl TableName {
    /// A schema-qualified table name.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        TableName {
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// A table name in the target's default schema.
    pub fn bare(table: impl Into<String>) -> Self {
        TableName {
            schema: None,
            table: table.into(),
        }
    }

    /// The staging table name paired with this target table.
    ///
    /// The suffix is deliberately process-visible so external tooling can
    /// identify staging tables orphaned by a failed merge.
    pub fn staging(&self) -> TableName {
        TableName {
            schema: self.schema.clone(),
            table: format!("{}_tmp", self.table),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// One destination column derived from a property schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name (the property name, verbatim).
    pub name: String,
    /// Mapped SQL type.
    pub sql_type: SqlType,
    /// Whether the column participates in the primary key.
    pub primary: bool,
}

/// Desired state of a destination table for one schema version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Fully qualified destination table.
    pub name: TableName,
    /// Ordered column list; order matters for positional DDL/DML generation.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Names of the primary-key columns, in declaration order.
    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.primary)
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// One unit of records sharing a target table and schema version, processed
/// atomically through provision, stage, and merge.
#[derive(Clone, Debug)]
pub struct Batch {
    /// Destination table.
    pub table: TableName,
    /// Schema version the records conform to.
    pub schema: SchemaSpec,
    /// Declared key properties; empty means append-only.
    pub primary_keys: Vec<String>,
    /// Records in arrival order.
    pub records: Vec<Record>,
}

/// Handle to a staging table holding one batch's rows before merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingTable {
    /// Name of the staging table.
    pub name: TableName,
    /// Number of rows staged into it.
    pub rows: u64,
}

/// Outcome of one batch load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Rows written to the staging table.
    pub rows_staged: u64,
    /// Rows the merge statement reported as affected.
    pub rows_affected: u64,
}

impl BatchStats {
    /// Human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "staged {} rows, merge affected {} rows",
            self.rows_staged, self.rows_affected
        )
    }
}

/// Type discriminant for a typed SQL NULL.
///
/// The wire driver needs a concrete type to bind a NULL parameter against, so
/// nulls carry the kind of the column they are destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullKind {
    /// Text-family column.
    Text,
    /// Integer column.
    Int,
    /// Floating/decimal column.
    Float,
    /// Native boolean (query results only; booleans are stored as text).
    Bool,
    /// Calendar date column.
    Date,
    /// Time-of-day column.
    Time,
    /// Timestamp column.
    DateTime,
}

/// A typed scalar crossing the driver seam, either as a bound statement
/// parameter or as a query result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// SQL NULL with the type it binds as.
    Null(NullKind),
    /// Boolean (query results only).
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit float; decimal-typed columns are bound this way and converted
    /// by the target.
    Float(f64),
    /// Unicode text.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Timestamp without offset.
    DateTime(NaiveDateTime),
}

impl ScalarValue {
    /// The text content, if this value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// The integer content, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// True for any NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_tag_single_and_list() {
        let single: PropertySchema = serde_json::from_value(json!({"type": "string"})).unwrap();
        assert!(single.supports_type(&["string"]));
        assert!(!single.supports_type(&["integer"]));

        let nullable: PropertySchema =
            serde_json::from_value(json!({"type": ["string", "null"]})).unwrap();
        assert!(nullable.supports_type(&["string"]));
        assert!(!nullable.supports_type(&["integer"]));
    }

    #[test]
    fn test_any_of_is_inspected_for_types() {
        let property: PropertySchema = serde_json::from_value(json!({
            "anyOf": [
                {"type": "integer"},
                {"type": "null"}
            ]
        }))
        .unwrap();
        assert!(property.supports_type(&["integer"]));
        assert!(!property.supports_type(&["string"]));
    }

    #[test]
    fn test_datelike_format_on_any_of_branch() {
        let property: PropertySchema = serde_json::from_value(json!({
            "anyOf": [
                {"type": "string", "format": "date-time"},
                {"type": "null"}
            ]
        }))
        .unwrap();
        assert_eq!(property.datelike_format(), Some("date-time"));
    }

    #[test]
    fn test_unknown_schema_keys_are_ignored() {
        let property: PropertySchema = serde_json::from_value(json!({
            "type": "string",
            "maxLength": 64,
            "description": "free-form",
            "examples": ["a"]
        }))
        .unwrap();
        assert_eq!(property.max_length, Some(64));
    }

    #[test]
    fn test_schema_property_order_is_preserved() {
        let schema = SchemaSpec::from_value(json!({
            "properties": {
                "zulu": {"type": "integer"},
                "alpha": {"type": "string"},
                "mike": {"type": "boolean"}
            }
        }))
        .unwrap();
        let names: Vec<&String> = schema.properties.keys().collect();
        assert_eq!(names, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_staging_name_keeps_schema() {
        let table = TableName::new("dbo", "orders");
        let staging = table.staging();
        assert_eq!(staging.schema.as_deref(), Some("dbo"));
        assert_eq!(staging.table, "orders_tmp");
        assert_eq!(staging.to_string(), "dbo.orders_tmp");
    }
}
