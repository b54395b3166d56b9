//! T-SQL text handed to the database client.

use crate::drivers::sqlcmd::quote_ident;

/// Rebuilds approximate `CREATE TABLE` statements from `INFORMATION_SCHEMA`,
/// one row per table.
pub fn schema_export(database: &str) -> String {
    format!(
        r#"USE {db};

SELECT
    'CREATE TABLE [' + TABLE_SCHEMA + '].[' + TABLE_NAME + '] (' +
    STUFF((
        SELECT ', [' + COLUMN_NAME + '] ' + DATA_TYPE +
               CASE
                   WHEN CHARACTER_MAXIMUM_LENGTH IS NOT NULL
                   THEN '(' + CAST(CHARACTER_MAXIMUM_LENGTH AS VARCHAR(10)) + ')'
                   ELSE ''
               END +
               CASE WHEN IS_NULLABLE = 'NO' THEN ' NOT NULL' ELSE '' END
        FROM INFORMATION_SCHEMA.COLUMNS c2
        WHERE c2.TABLE_NAME = c1.TABLE_NAME
        AND c2.TABLE_SCHEMA = c1.TABLE_SCHEMA
        FOR XML PATH(''), TYPE).value('.', 'NVARCHAR(MAX)'), 1, 2, '') + ');'
FROM INFORMATION_SCHEMA.COLUMNS c1
GROUP BY TABLE_SCHEMA, TABLE_NAME;
"#,
        db = quote_ident(database)
    )
}

/// Row counts of base tables and views. Only the exit status is judged.
pub fn smoke_test(database: &str) -> String {
    format!(
        "USE {}; \
         SELECT COUNT(*) AS TableCount FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'; \
         SELECT COUNT(*) AS ViewCount FROM INFORMATION_SCHEMA.VIEWS;",
        quote_ident(database)
    )
}

/// Executed by the staging rollback stub. Restores nothing.
pub const PLACEHOLDER_ROLLBACK: &str = "PRINT 'Rollback completed';";
