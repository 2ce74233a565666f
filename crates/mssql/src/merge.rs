//! Merge statement generation for applying staged rows to the target.

use crate::ddl::quote_ident;

/// One conditional merge: update matched rows, insert unmatched ones.
///
/// The join condition equates every key column between target and staging;
/// matched rows have every non-key column updated; unmatched staging rows are
/// inserted wholesale. Column projection follows the declared column order so
/// the statement is reproducible. A table whose columns are all keys has
/// nothing to update, so the matched clause is omitted.
pub(crate) fn build_merge_statement(
    target_q: &str,
    staging_q: &str,
    columns: &[&str],
    join_keys: &[String],
) -> String {
    let join_condition: Vec<String> = join_keys
        .iter()
        .map(|key| {
            format!(
                "target.{} = temp.{}",
                quote_ident(key),
                quote_ident(key)
            )
        })
        .collect();

    let updates: Vec<String> = columns
        .iter()
        .filter(|name| !join_keys.iter().any(|key| key == *name))
        .map(|name| {
            format!(
                "target.{} = temp.{}",
                quote_ident(name),
                quote_ident(name)
            )
        })
        .collect();

    let insert_cols: Vec<String> = columns.iter().map(|name| quote_ident(name)).collect();
    let insert_vals: Vec<String> = columns
        .iter()
        .map(|name| format!("temp.{}", quote_ident(name)))
        .collect();

    let matched_clause = if updates.is_empty() {
        String::new()
    } else {
        format!("WHEN MATCHED THEN UPDATE SET {} ", updates.join(", "))
    };

    format!(
        "MERGE INTO {} AS target USING {} AS temp ON ({}) {}WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
        target_q,
        staging_q,
        join_condition.join(" AND "),
        matched_clause,
        insert_cols.join(", "),
        insert_vals.join(", ")
    )
}

/// Append-only application: every staged row becomes an insert.
pub(crate) fn build_append_statement(target_q: &str, staging_q: &str, columns: &[&str]) -> String {
    let col_list: Vec<String> = columns.iter().map(|name| quote_ident(name)).collect();
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        target_q,
        col_list.join(", "),
        col_list.join(", "),
        staging_q
    )
}

/// Unconditional drop once a merge has succeeded.
pub(crate) fn build_drop_table(table_q: &str) -> String {
    format!("DROP TABLE {}", table_q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_updates_non_key_columns_only() {
        let sql = build_merge_statement(
            "[dbo].[users]",
            "[dbo].[users_tmp]",
            &["id", "name", "email"],
            &["id".to_string()],
        );
        assert_eq!(
            sql,
            "MERGE INTO [dbo].[users] AS target USING [dbo].[users_tmp] AS temp \
             ON (target.[id] = temp.[id]) \
             WHEN MATCHED THEN UPDATE SET target.[name] = temp.[name], target.[email] = temp.[email] \
             WHEN NOT MATCHED THEN INSERT ([id], [name], [email]) \
             VALUES (temp.[id], temp.[name], temp.[email]);"
        );
    }

    #[test]
    fn test_merge_with_composite_key_ands_the_join() {
        let sql = build_merge_statement(
            "[dbo].[t]",
            "[dbo].[t_tmp]",
            &["a", "b", "v"],
            &["a".to_string(), "b".to_string()],
        );
        assert!(sql.contains("ON (target.[a] = temp.[a] AND target.[b] = temp.[b])"));
        assert!(sql.contains("UPDATE SET target.[v] = temp.[v]"));
    }

    #[test]
    fn test_key_only_table_omits_matched_clause() {
        let sql = build_merge_statement(
            "[dbo].[t]",
            "[dbo].[t_tmp]",
            &["id"],
            &["id".to_string()],
        );
        assert!(!sql.contains("WHEN MATCHED"));
        assert!(sql.contains("WHEN NOT MATCHED THEN INSERT ([id]) VALUES (temp.[id]);"));
    }

    #[test]
    fn test_append_statement_projects_in_declared_order() {
        assert_eq!(
            build_append_statement("[dbo].[users]", "[dbo].[users_tmp]", &["id", "name"]),
            "INSERT INTO [dbo].[users] ([id], [name]) SELECT [id], [name] FROM [dbo].[users_tmp]"
        );
    }
}
