//! DDL generation and catalog introspection for the SQL Server target.

use batchsink_core::{ColumnSpec, SqlType, TableName, TableSpec, WIDE_TEXT_CHARS};

/// Existence probe for a table in the live catalog.
pub(crate) const TABLE_EXISTS_SQL: &str =
    "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2";

/// Live column set of a table, in ordinal order.
pub(crate) const LIVE_COLUMNS_SQL: &str = "SELECT COLUMN_NAME, DATA_TYPE, \
     CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, NUMERIC_SCALE \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
     ORDER BY ORDINAL_POSITION";

/// Identity column of a table, if it declares one.
pub(crate) const IDENTITY_COLUMN_SQL: &str = "SELECT c.name FROM sys.identity_columns c \
     JOIN sys.objects o ON c.object_id = o.object_id \
     JOIN sys.schemas s ON o.schema_id = s.schema_id \
     WHERE s.name = @P1 AND o.name = @P2";

/// Bracket-quote an identifier, doubling any closing bracket it contains.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Schema-qualified, quoted rendering of a table name.
pub(crate) fn qualify(table: &TableName, default_schema: &str) -> String {
    let schema = table.schema.as_deref().unwrap_or(default_schema);
    format!("{}.{}", quote_ident(schema), quote_ident(&table.table))
}

/// Render a column type in the target dialect.
pub(crate) fn render_type(sql_type: &SqlType) -> String {
    match sql_type {
        SqlType::Text { max_chars } => format!("nvarchar({})", max_chars),
        SqlType::Date => "date".to_string(),
        SqlType::Time => "time".to_string(),
        SqlType::Timestamp => "datetime".to_string(),
        SqlType::Integer => "int".to_string(),
        SqlType::Decimal { precision, scale } => format!("numeric({},{})", precision, scale),
        SqlType::BoolText => format!("varchar({})", WIDE_TEXT_CHARS),
    }
}

/// CREATE TABLE statement for a full table spec, primary key constraint
/// included, all in one statement.
pub(crate) fn build_create_table(spec: &TableSpec, default_schema: &str) -> String {
    let mut parts: Vec<String> = spec
        .columns
        .iter()
        .map(|column| {
            format!(
                "{} {} {}",
                quote_ident(&column.name),
                render_type(&column.sql_type),
                if column.primary { "NOT NULL" } else { "NULL" }
            )
        })
        .collect();

    let keys = spec.primary_keys();
    if !keys.is_empty() {
        let key_list: Vec<String> = keys.iter().map(|key| quote_ident(key)).collect();
        parts.push(format!("PRIMARY KEY ({})", key_list.join(", ")));
    }

    format!(
        "CREATE TABLE {} ({})",
        qualify(&spec.name, default_schema),
        parts.join(", ")
    )
}

/// ALTER TABLE ... ADD for a missing column.
pub(crate) fn build_add_column(table_q: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD {} {}",
        table_q,
        quote_ident(&column.name),
        render_type(&column.sql_type)
    )
}

/// ALTER TABLE ... ALTER COLUMN to a (wider) type.
pub(crate) fn build_alter_column(table_q: &str, column: &str, sql_type: &SqlType) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {}",
        table_q,
        quote_ident(column),
        render_type(sql_type)
    )
}

/// Map a live catalog column description back into the closed type set.
///
/// Unknown catalog types widen to text, which keeps reconciliation safe: the
/// merged type can only ever be text, never a lossy narrowing.
pub(crate) fn type_from_catalog(
    data_type: &str,
    char_len: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> SqlType {
    match data_type.to_ascii_lowercase().as_str() {
        "nvarchar" | "nchar" | "varchar" | "char" | "text" | "ntext" => {
            let max_chars = match char_len {
                Some(len) if len > 0 => len as u32,
                // -1 is the catalog's marker for max-width columns.
                _ => WIDE_TEXT_CHARS,
            };
            SqlType::Text { max_chars }
        }
        "int" | "bigint" | "smallint" | "tinyint" => SqlType::Integer,
        "numeric" | "decimal" | "float" | "real" | "money" => SqlType::Decimal {
            precision: precision.unwrap_or(i64::from(batchsink_core::DECIMAL_PRECISION)) as u8,
            scale: scale.unwrap_or(i64::from(batchsink_core::DECIMAL_SCALE)) as u8,
        },
        "date" => SqlType::Date,
        "time" => SqlType::Time,
        "datetime" | "datetime2" | "smalldatetime" => SqlType::Timestamp,
        "bit" => SqlType::BoolText,
        _ => SqlType::wide_text(),
    }
}
