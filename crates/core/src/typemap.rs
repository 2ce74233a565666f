//! JSON-Schema property to SQL column type mapping.
//!
//! `map_type` is total and deterministic: every property description maps to
//! exactly one [`SqlType`], falling back to wide text when nothing more
//! specific applies. `merge_sql_types` defines the compatibility order used
//! to reconcile schema drift against live columns.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::PropertySchema;

/// Character capacity used for wide text columns. Generous on purpose: the
/// mapping favors never truncating over exact sizing and ignores any declared
/// `maxLength`.
pub const WIDE_TEXT_CHARS: u32 = 2000;

/// Character capacity for text columns participating in a primary key. The
/// target rejects wide keys in an index, so key text is narrowed to this.
pub const KEY_TEXT_CHARS: u32 = 255;

/// Precision of the decimal type used for JSON numbers.
pub const DECIMAL_PRECISION: u8 = 22;

/// Scale of the decimal type used for JSON numbers.
pub const DECIMAL_SCALE: u8 = 16;

/// The closed set of destination column types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    /// Variable-length unicode text with a maximum character count.
    Text {
        /// Maximum number of characters.
        max_chars: u32,
    },
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without offset.
    Timestamp,
    /// Platform integer.
    Integer,
    /// High-precision fixed-point decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Boolean stored as bounded text for dialect portability.
    BoolText,
}

impl SqlType {
    /// The default wide text type.
    pub fn wide_text() -> Self {
        SqlType::Text {
            max_chars: WIDE_TEXT_CHARS,
        }
    }

    /// The default high-precision decimal type.
    pub fn decimal() -> Self {
        SqlType::Decimal {
            precision: DECIMAL_PRECISION,
            scale: DECIMAL_SCALE,
        }
    }

    /// True for types stored as character data.
    pub fn is_text(&self) -> bool {
        matches!(self, SqlType::Text { .. } | SqlType::BoolText)
    }

    /// The character capacity of a text-family type.
    pub fn text_chars(&self) -> Option<u32> {
        match self {
            SqlType::Text { max_chars } => Some(*max_chars),
            SqlType::BoolText => Some(WIDE_TEXT_CHARS),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Text { max_chars } => write!(f, "text({})", max_chars),
            SqlType::Date => write!(f, "date"),
            SqlType::Time => write!(f, "time"),
            SqlType::Timestamp => write!(f, "timestamp"),
            SqlType::Integer => write!(f, "integer"),
            SqlType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            SqlType::BoolText => write!(f, "boolean-text"),
        }
    }
}

/// Map a JSON-Schema property description to a SQL column type.
///
/// First match wins:
/// 1. string with a date-like format hint
/// 2. string
/// 3. integer
/// 4. number
/// 5. boolean
/// 6. object or array (serialized by the staging loader)
/// 7. anything else falls back to wide text
pub fn map_type(property: &PropertySchema) -> SqlType {
    if property.supports_type(&["string"]) {
        if let Some(format) = property.datelike_format() {
            match format {
                "date-time" => return SqlType::Timestamp,
                "time" => return SqlType::Time,
                "date" => return SqlType::Date,
                _ => {}
            }
        }
        return SqlType::wide_text();
    }
    if property.supports_type(&["integer"]) {
        return SqlType::Integer;
    }
    if property.supports_type(&["number"]) {
        return SqlType::decimal();
    }
    if property.supports_type(&["boolean"]) {
        return SqlType::BoolText;
    }
    if property.supports_type(&["object"]) || property.supports_type(&["array"]) {
        return SqlType::wide_text();
    }
    SqlType::wide_text()
}

/// Least common supertype of two column types.
///
/// The compatibility order is a partial order: equal types merge to
/// themselves, a wider text absorbs a narrower one, decimal absorbs integer,
/// timestamp absorbs date, and anything else widens to text. The result is
/// never narrower than either input, so reconciliation can alter a live
/// column to the merged type without losing data.
pub fn merge_sql_types(left: &SqlType, right: &SqlType) -> SqlType {
    use SqlType::*;

    if left == right {
        return left.clone();
    }
    match (left, right) {
        (Text { max_chars: a }, Text { max_chars: b }) => Text {
            max_chars: (*a).max(*b),
        },
        (Integer, Decimal { .. }) | (Decimal { .. }, Integer) => SqlType::decimal(),
        (
            Decimal {
                precision: a_precision,
                scale: a_scale,
            },
            Decimal {
                precision: b_precision,
                scale: b_scale,
            },
        ) => Decimal {
            precision: (*a_precision).max(*b_precision),
            scale: (*a_scale).max(*b_scale),
        },
        (Date, Timestamp) | (Timestamp, Date) => Timestamp,
        (a, b) => {
            let floor = WIDE_TEXT_CHARS
                .max(a.text_chars().unwrap_or(0))
                .max(b.text_chars().unwrap_or(0));
            Text { max_chars: floor }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(value: serde_json::Value) -> PropertySchema {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_string_maps_to_wide_text() {
        assert_eq!(
            map_type(&property(json!({"type": "string"}))),
            SqlType::Text { max_chars: 2000 }
        );
    }

    #[test]
    fn test_nullable_string_maps_like_plain_string() {
        let plain = map_type(&property(json!({"type": "string"})));
        let nullable = map_type(&property(json!({"type": ["string", "null"]})));
        assert_eq!(plain, nullable);
    }

    #[test]
    fn test_max_length_is_ignored() {
        assert_eq!(
            map_type(&property(json!({"type": "string", "maxLength": 10}))),
            SqlType::Text { max_chars: 2000 }
        );
    }

    #[test]
    fn test_date_like_formats() {
        assert_eq!(
            map_type(&property(json!({"type": "string", "format": "date-time"}))),
            SqlType::Timestamp
        );
        assert_eq!(
            map_type(&property(json!({"type": "string", "format": "time"}))),
            SqlType::Time
        );
        assert_eq!(
            map_type(&property(json!({"type": "string", "format": "date"}))),
            SqlType::Date
        );
    }

    #[test]
    fn test_numeric_and_boolean_mappings() {
        assert_eq!(map_type(&property(json!({"type": "integer"}))), SqlType::Integer);
        assert_eq!(
            map_type(&property(json!({"type": "number"}))),
            SqlType::Decimal {
                precision: 22,
                scale: 16
            }
        );
        assert_eq!(map_type(&property(json!({"type": "boolean"}))), SqlType::BoolText);
    }

    #[test]
    fn test_object_array_and_unknown_fall_back_to_text() {
        assert_eq!(map_type(&property(json!({"type": "object"}))), SqlType::wide_text());
        assert_eq!(map_type(&property(json!({"type": "array"}))), SqlType::wide_text());
        assert_eq!(map_type(&property(json!({}))), SqlType::wide_text());
        assert_eq!(
            map_type(&property(json!({"type": "null"}))),
            SqlType::wide_text()
        );
    }

    #[test]
    fn test_any_of_union_resolves_through_branches() {
        let prop = property(json!({
            "anyOf": [
                {"type": "null"},
                {"type": "integer"}
            ]
        }));
        assert_eq!(map_type(&prop), SqlType::Integer);
    }

    #[test]
    fn test_map_type_is_deterministic() {
        let prop = property(json!({"type": ["number", "null"]}));
        let first = map_type(&prop);
        for _ in 0..10 {
            assert_eq!(map_type(&prop), first);
        }
    }

    #[test]
    fn test_merge_equal_types() {
        assert_eq!(
            merge_sql_types(&SqlType::Integer, &SqlType::Integer),
            SqlType::Integer
        );
    }

    #[test]
    fn test_merge_text_widths() {
        let narrow = SqlType::Text { max_chars: 255 };
        let wide = SqlType::Text { max_chars: 2000 };
        assert_eq!(merge_sql_types(&narrow, &wide), wide);
        assert_eq!(merge_sql_types(&wide, &narrow), wide);
    }

    #[test]
    fn test_decimal_absorbs_integer() {
        assert_eq!(
            merge_sql_types(&SqlType::Integer, &SqlType::decimal()),
            SqlType::decimal()
        );
    }

    #[test]
    fn test_wider_decimal_absorbs_narrower() {
        let narrow = SqlType::Decimal {
            precision: 10,
            scale: 2,
        };
        assert_eq!(
            merge_sql_types(&narrow, &SqlType::decimal()),
            SqlType::Decimal {
                precision: 22,
                scale: 16
            }
        );
    }

    #[test]
    fn test_timestamp_absorbs_date() {
        assert_eq!(
            merge_sql_types(&SqlType::Date, &SqlType::Timestamp),
            SqlType::Timestamp
        );
    }

    #[test]
    fn test_everything_widens_to_text() {
        assert_eq!(
            merge_sql_types(&SqlType::Integer, &SqlType::wide_text()),
            SqlType::wide_text()
        );
        assert_eq!(
            merge_sql_types(&SqlType::Timestamp, &SqlType::Time),
            SqlType::wide_text()
        );
        // A text column wider than the default keeps its width.
        let extra_wide = SqlType::Text { max_chars: 4000 };
        assert_eq!(merge_sql_types(&extra_wide, &SqlType::Integer), extra_wide);
    }
}
