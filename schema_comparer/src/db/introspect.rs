//! Live database introspection
//!
//! [`DatabaseIntrospector`] answers [`MetadataSource`] queries from the
//! system catalogs of a connected database. Every query is issued on demand;
//! caching is left to [`DatabaseTable`](crate::table::DatabaseTable).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{FromRow, MySql, Pool, Postgres, Row, Sqlite};

use crate::db::connection::DatabaseConnection;
use crate::db::source::{MetadataSource, TableInfo};
use crate::error::Result;
use crate::schema::constraints::{CheckConstraintRow, ConstraintRow, IndexRow};
use crate::schema::types::{Column, ConstraintKind, Engine, Procedure, Trigger, View};
use crate::utils::naming::quote_identifier;

static VIEW_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:TEMP(?:ORARY)?\s+)?VIEW\s+.*?\bAS\s+(.*)$").expect("valid view regex")
});

static TRIGGER_EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\b(BEFORE|AFTER|INSTEAD\s+OF)\s+(INSERT|DELETE|UPDATE(?:\s+OF\s+[^\n]*?)?)\s+ON\b")
        .expect("valid trigger regex")
});

static TRIGGER_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bBEGIN\b.*$").expect("valid trigger regex"));

static INDEX_KEYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bON\s+\S+?\s*\((.*)\)\s*(?:WHERE\b.*)?$").expect("valid index regex")
});

#[derive(FromRow)]
struct NameRow {
    name: String,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
    generation_expression: Option<String>,
    is_identity: Option<String>,
    remarks: Option<String>,
}

#[derive(FromRow)]
struct ConstraintColumnRow {
    constraint_name: String,
    constraint_type: String,
    table_name: String,
    column_name: String,
    referenced_catalog: Option<String>,
    referenced_schema: Option<String>,
    referenced_table: Option<String>,
    referenced_column: Option<String>,
    update_rule: Option<String>,
    delete_rule: Option<String>,
}

#[derive(FromRow)]
struct CheckRow {
    name: String,
    table_name: String,
    source: Option<String>,
}

#[derive(FromRow)]
struct TableInfoRow {
    catalog: Option<String>,
    schema_name: Option<String>,
    remarks: Option<String>,
}

#[derive(FromRow)]
struct IndexColumnRow {
    index_name: String,
    table_name: String,
    non_unique: bool,
    column_name: Option<String>,
    expression: Option<String>,
    descending: bool,
    constraint_type: Option<String>,
}

#[derive(FromRow)]
struct ViewRow {
    name: String,
    source: Option<String>,
    column_list: Option<String>,
}

#[derive(FromRow)]
struct ProcedureRow {
    name: String,
    arguments: Option<String>,
    body: Option<String>,
    language: Option<String>,
}

#[derive(FromRow)]
struct TriggerRow {
    name: String,
    table_name: Option<String>,
    event: Option<String>,
    position: Option<i64>,
    source: Option<String>,
}

impl From<ColumnRow> for Column {
    fn from(row: ColumnRow) -> Self {
        let computed_by = row.generation_expression.filter(|e| !e.trim().is_empty());
        Column {
            name: row.column_name,
            data_type: row.data_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            default: row.column_default.filter(|_| computed_by.is_none()),
            computed_by,
            identity: row
                .is_identity
                .map(|i| i.eq_ignore_ascii_case("YES") || i.contains("auto_increment"))
                .unwrap_or(false),
            remarks: row.remarks.filter(|r| !r.is_empty()),
        }
    }
}

impl ConstraintColumnRow {
    fn into_row(self) -> Option<ConstraintRow> {
        let kind = ConstraintKind::from_type_name(&self.constraint_type)?;
        Some(ConstraintRow {
            name: self.constraint_name,
            kind,
            table_name: self.table_name,
            column_name: self.column_name,
            referenced_table: self.referenced_table,
            referenced_catalog: self.referenced_catalog,
            referenced_schema: self.referenced_schema,
            referenced_column: self.referenced_column,
            update_rule: self.update_rule,
            delete_rule: self.delete_rule,
        })
    }
}

impl From<CheckRow> for CheckConstraintRow {
    fn from(row: CheckRow) -> Self {
        CheckConstraintRow {
            name: row.name,
            table_name: row.table_name,
            source: row.source,
        }
    }
}

impl From<IndexColumnRow> for IndexRow {
    fn from(row: IndexColumnRow) -> Self {
        IndexRow {
            name: row.index_name,
            table_name: row.table_name,
            non_unique: row.non_unique,
            column_name: row.column_name,
            expression: row.expression,
            descending: row.descending,
            constraint_type: row
                .constraint_type
                .as_deref()
                .and_then(ConstraintKind::from_type_name),
        }
    }
}

impl From<ViewRow> for View {
    fn from(row: ViewRow) -> Self {
        View {
            name: row.name,
            columns: split_list(row.column_list.as_deref()),
            source: row.source.unwrap_or_default().trim().to_string(),
        }
    }
}

impl From<TriggerRow> for Trigger {
    fn from(row: TriggerRow) -> Self {
        Trigger {
            name: row.name,
            table_name: row.table_name,
            event: row.event.unwrap_or_default(),
            position: row.position.and_then(|p| i32::try_from(p).ok()).unwrap_or(0),
            active: true,
            source: row.source.unwrap_or_default().trim().to_string(),
        }
    }
}

fn split_list(list: Option<&str>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Metadata source backed by a live connection
pub struct DatabaseIntrospector {
    connection: DatabaseConnection,
    schema: Option<String>,
    engine: Engine,
}

impl DatabaseIntrospector {
    /// Create an introspector for `schema`, or the connection's default schema.
    ///
    /// `major_version` is the server version used for engine feature checks.
    pub fn new(connection: DatabaseConnection, schema: Option<String>, major_version: u32) -> Self {
        let engine = Engine::new(connection.engine_kind(), major_version);
        Self {
            connection,
            schema: schema.filter(|s| !s.trim().is_empty()),
            engine,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    fn pg_schema(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

#[async_trait]
impl MetadataSource for DatabaseIntrospector {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT table_name::text AS name
                    FROM information_schema.tables
                    WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                    ORDER BY table_name
                "#;
                sqlx::query_as::<_, NameRow>(sql)
                    .bind(self.pg_schema())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT CAST(table_name AS CHAR) AS name
                    FROM information_schema.tables
                    WHERE table_schema = COALESCE(?, DATABASE()) AND table_type = 'BASE TABLE'
                    ORDER BY table_name
                "#;
                sqlx::query_as::<_, NameRow>(sql)
                    .bind(self.schema.as_deref())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(pool) => {
                let sql = r#"
                    SELECT name FROM sqlite_master
                    WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                    ORDER BY rowid
                "#;
                sqlx::query_as::<_, NameRow>(sql).fetch_all(pool).await?
            }
        };
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => postgres_columns(pool, self.pg_schema(), table).await?,
            DatabaseConnection::MySql(pool) => mysql_columns(pool, self.schema.as_deref(), table).await?,
            DatabaseConnection::Sqlite(pool) => return sqlite_columns(pool, table).await,
        };
        Ok(rows.into_iter().map(Column::from).collect())
    }

    async fn constraint_rows(&self, table: &str) -> Result<Vec<ConstraintRow>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        tc.constraint_name::text AS constraint_name,
                        tc.constraint_type::text AS constraint_type,
                        tc.table_name::text AS table_name,
                        kcu.column_name::text AS column_name,
                        rk.table_catalog::text AS referenced_catalog,
                        rk.table_schema::text AS referenced_schema,
                        rk.table_name::text AS referenced_table,
                        rk.column_name::text AS referenced_column,
                        rc.update_rule::text AS update_rule,
                        rc.delete_rule::text AS delete_rule
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON kcu.constraint_schema = tc.constraint_schema
                        AND kcu.constraint_name = tc.constraint_name
                        AND kcu.table_name = tc.table_name
                    LEFT JOIN information_schema.referential_constraints rc
                        ON rc.constraint_schema = tc.constraint_schema
                        AND rc.constraint_name = tc.constraint_name
                    LEFT JOIN information_schema.key_column_usage rk
                        ON rk.constraint_schema = rc.unique_constraint_schema
                        AND rk.constraint_name = rc.unique_constraint_name
                        AND rk.ordinal_position = kcu.position_in_unique_constraint
                    WHERE tc.table_schema = $1 AND tc.table_name = $2
                        AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
                    ORDER BY tc.constraint_name, kcu.ordinal_position
                "#;
                sqlx::query_as::<_, ConstraintColumnRow>(sql)
                    .bind(self.pg_schema())
                    .bind(table)
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(tc.constraint_name AS CHAR) AS constraint_name,
                        CAST(tc.constraint_type AS CHAR) AS constraint_type,
                        CAST(tc.table_name AS CHAR) AS table_name,
                        CAST(kcu.column_name AS CHAR) AS column_name,
                        CAST(NULL AS CHAR) AS referenced_catalog,
                        CAST(kcu.referenced_table_schema AS CHAR) AS referenced_schema,
                        CAST(kcu.referenced_table_name AS CHAR) AS referenced_table,
                        CAST(kcu.referenced_column_name AS CHAR) AS referenced_column,
                        CAST(rc.update_rule AS CHAR) AS update_rule,
                        CAST(rc.delete_rule AS CHAR) AS delete_rule
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON kcu.constraint_schema = tc.constraint_schema
                        AND kcu.constraint_name = tc.constraint_name
                        AND kcu.table_name = tc.table_name
                    LEFT JOIN information_schema.referential_constraints rc
                        ON rc.constraint_schema = tc.constraint_schema
                        AND rc.constraint_name = tc.constraint_name
                    WHERE tc.table_schema = COALESCE(?, DATABASE()) AND tc.table_name = ?
                        AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
                    ORDER BY tc.constraint_name, kcu.ordinal_position
                "#;
                sqlx::query_as::<_, ConstraintColumnRow>(sql)
                    .bind(self.schema.as_deref())
                    .bind(table)
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(pool) => return sqlite_constraint_rows(pool, table).await,
        };
        Ok(rows.into_iter().filter_map(ConstraintColumnRow::into_row).collect())
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let (row, checks) = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        current_database()::text AS catalog,
                        n.nspname::text AS schema_name,
                        obj_description(c.oid, 'pg_class') AS remarks
                    FROM pg_class c
                    JOIN pg_namespace n ON n.oid = c.relnamespace
                    WHERE n.nspname = $1 AND c.relname = $2
                "#;
                let row = sqlx::query_as::<_, TableInfoRow>(sql)
                    .bind(self.pg_schema())
                    .bind(table)
                    .fetch_optional(pool)
                    .await?;

                let sql = r#"
                    SELECT
                        con.conname::text AS name,
                        rel.relname::text AS table_name,
                        pg_get_constraintdef(con.oid) AS source
                    FROM pg_constraint con
                    JOIN pg_class rel ON rel.oid = con.conrelid
                    JOIN pg_namespace n ON n.oid = rel.relnamespace
                    WHERE con.contype = 'c' AND n.nspname = $1 AND rel.relname = $2
                    ORDER BY con.conname
                "#;
                let checks = sqlx::query_as::<_, CheckRow>(sql)
                    .bind(self.pg_schema())
                    .bind(table)
                    .fetch_all(pool)
                    .await?;
                (row, checks)
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(table_catalog AS CHAR) AS catalog,
                        CAST(table_schema AS CHAR) AS schema_name,
                        CAST(table_comment AS CHAR) AS remarks
                    FROM information_schema.tables
                    WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?
                "#;
                let row = sqlx::query_as::<_, TableInfoRow>(sql)
                    .bind(self.schema.as_deref())
                    .bind(table)
                    .fetch_optional(pool)
                    .await?;

                let sql = r#"
                    SELECT
                        CAST(tc.constraint_name AS CHAR) AS name,
                        CAST(tc.table_name AS CHAR) AS table_name,
                        CAST(cc.check_clause AS CHAR) AS source
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.check_constraints cc
                        ON cc.constraint_schema = tc.constraint_schema
                        AND cc.constraint_name = tc.constraint_name
                    WHERE tc.constraint_type = 'CHECK'
                        AND tc.table_schema = COALESCE(?, DATABASE()) AND tc.table_name = ?
                    ORDER BY tc.constraint_name
                "#;
                let checks = sqlx::query_as::<_, CheckRow>(sql)
                    .bind(self.schema.as_deref())
                    .bind(table)
                    .fetch_all(pool)
                    .await?;
                (row, checks)
            }
            // SQLite keeps check constraints only inside the CREATE TABLE text
            DatabaseConnection::Sqlite(_) => (None, Vec::new()),
        };

        let (catalog, schema, remarks) = row
            .map(|r| (r.catalog, r.schema_name, r.remarks.filter(|s| !s.is_empty())))
            .unwrap_or_default();

        Ok(TableInfo {
            catalog,
            schema,
            remarks,
            checks: checks.into_iter().map(CheckConstraintRow::from).collect(),
            ..TableInfo::default()
        })
    }

    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        i.relname::text AS index_name,
                        t.relname::text AS table_name,
                        NOT ix.indisunique AS non_unique,
                        a.attname::text AS column_name,
                        CASE WHEN k.attnum = 0
                            THEN pg_get_indexdef(ix.indexrelid, k.ord::int, true)
                        END AS expression,
                        (ix.indoption[(k.ord - 1)::int]::int & 1) = 1 AS descending,
                        con.contype::text AS constraint_type
                    FROM pg_index ix
                    JOIN pg_class t ON t.oid = ix.indrelid
                    JOIN pg_class i ON i.oid = ix.indexrelid
                    JOIN pg_namespace n ON n.oid = t.relnamespace
                    CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                    LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                    LEFT JOIN pg_constraint con
                        ON con.conindid = ix.indexrelid AND con.contype IN ('p', 'u')
                    WHERE n.nspname = $1 AND t.relname = $2
                    ORDER BY i.relname, k.ord
                "#;
                sqlx::query_as::<_, IndexColumnRow>(sql)
                    .bind(self.pg_schema())
                    .bind(table)
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(s.index_name AS CHAR) AS index_name,
                        CAST(s.table_name AS CHAR) AS table_name,
                        s.non_unique <> 0 AS non_unique,
                        CAST(s.column_name AS CHAR) AS column_name,
                        CAST(s.expression AS CHAR) AS expression,
                        COALESCE(s.collation = 'D', FALSE) AS descending,
                        CASE WHEN s.index_name = 'PRIMARY' THEN 'PRIMARY KEY'
                            ELSE CAST(tc.constraint_type AS CHAR)
                        END AS constraint_type
                    FROM information_schema.statistics s
                    LEFT JOIN information_schema.table_constraints tc
                        ON tc.table_schema = s.table_schema
                        AND tc.table_name = s.table_name
                        AND tc.constraint_name = s.index_name
                    WHERE s.table_schema = COALESCE(?, DATABASE()) AND s.table_name = ?
                    ORDER BY s.index_name, s.seq_in_index
                "#;
                sqlx::query_as::<_, IndexColumnRow>(sql)
                    .bind(self.schema.as_deref())
                    .bind(table)
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(pool) => return sqlite_index_rows(pool, table).await,
        };
        Ok(rows.into_iter().map(IndexRow::from).collect())
    }

    async fn table_triggers(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .triggers()
            .await?
            .into_iter()
            .filter(|t| t.table_name.as_deref() == Some(table))
            .map(|t| t.name)
            .collect())
    }

    async fn views(&self) -> Result<Vec<View>> {
        match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        v.table_name::text AS name,
                        v.view_definition::text AS source,
                        (SELECT string_agg(c.column_name::text, ',' ORDER BY c.ordinal_position)
                            FROM information_schema.columns c
                            WHERE c.table_schema = v.table_schema AND c.table_name = v.table_name
                        ) AS column_list
                    FROM information_schema.views v
                    WHERE v.table_schema = $1
                    ORDER BY v.table_name
                "#;
                let rows = sqlx::query_as::<_, ViewRow>(sql)
                    .bind(self.pg_schema())
                    .fetch_all(pool)
                    .await?;
                Ok(rows.into_iter().map(View::from).collect())
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(v.table_name AS CHAR) AS name,
                        CAST(v.view_definition AS CHAR) AS source,
                        (SELECT CAST(GROUP_CONCAT(c.column_name ORDER BY c.ordinal_position) AS CHAR)
                            FROM information_schema.columns c
                            WHERE c.table_schema = v.table_schema AND c.table_name = v.table_name
                        ) AS column_list
                    FROM information_schema.views v
                    WHERE v.table_schema = COALESCE(?, DATABASE())
                    ORDER BY v.table_name
                "#;
                let rows = sqlx::query_as::<_, ViewRow>(sql)
                    .bind(self.schema.as_deref())
                    .fetch_all(pool)
                    .await?;
                Ok(rows.into_iter().map(View::from).collect())
            }
            DatabaseConnection::Sqlite(pool) => sqlite_views(pool).await,
        }
    }

    async fn procedures(&self) -> Result<Vec<Procedure>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        p.proname::text AS name,
                        pg_get_function_arguments(p.oid) AS arguments,
                        p.prosrc AS body,
                        l.lanname::text AS language
                    FROM pg_proc p
                    JOIN pg_namespace n ON n.oid = p.pronamespace
                    JOIN pg_language l ON l.oid = p.prolang
                    WHERE n.nspname = $1 AND p.prokind = 'p'
                    ORDER BY p.proname
                "#;
                sqlx::query_as::<_, ProcedureRow>(sql)
                    .bind(self.pg_schema())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(r.routine_name AS CHAR) AS name,
                        (SELECT CAST(GROUP_CONCAT(
                                CONCAT_WS(' ', p.parameter_mode, p.parameter_name, p.dtd_identifier)
                                ORDER BY p.ordinal_position SEPARATOR ', ') AS CHAR)
                            FROM information_schema.parameters p
                            WHERE p.specific_schema = r.routine_schema
                                AND p.specific_name = r.specific_name
                                AND p.ordinal_position > 0
                        ) AS arguments,
                        CAST(r.routine_definition AS CHAR) AS body,
                        CAST(NULL AS CHAR) AS language
                    FROM information_schema.routines r
                    WHERE r.routine_schema = COALESCE(?, DATABASE()) AND r.routine_type = 'PROCEDURE'
                    ORDER BY r.routine_name
                "#;
                sqlx::query_as::<_, ProcedureRow>(sql)
                    .bind(self.schema.as_deref())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(_) => Vec::new(),
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let arguments = row.arguments.unwrap_or_default();
                let body = row.body.unwrap_or_default();
                let source = match row.language {
                    Some(language) => format!("({}) LANGUAGE {} AS $${}$$", arguments, language, body),
                    None => format!("({}) {}", arguments, body.trim()),
                };
                Procedure { name: row.name, source }
            })
            .collect())
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        let rows = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = r#"
                    SELECT
                        trigger_name::text AS name,
                        event_object_table::text AS table_name,
                        action_timing::text || ' '
                            || string_agg(event_manipulation::text, ' OR ' ORDER BY event_manipulation) AS event,
                        MIN(action_order)::int8 AS position,
                        action_statement::text AS source
                    FROM information_schema.triggers
                    WHERE trigger_schema = $1
                    GROUP BY trigger_name, event_object_table, action_timing, action_statement
                    ORDER BY trigger_name
                "#;
                sqlx::query_as::<_, TriggerRow>(sql)
                    .bind(self.pg_schema())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = r#"
                    SELECT
                        CAST(trigger_name AS CHAR) AS name,
                        CAST(event_object_table AS CHAR) AS table_name,
                        CAST(CONCAT(action_timing, ' ', event_manipulation) AS CHAR) AS event,
                        CAST(action_order AS SIGNED) AS position,
                        CAST(action_statement AS CHAR) AS source
                    FROM information_schema.triggers
                    WHERE trigger_schema = COALESCE(?, DATABASE())
                    ORDER BY trigger_name
                "#;
                sqlx::query_as::<_, TriggerRow>(sql)
                    .bind(self.schema.as_deref())
                    .fetch_all(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(pool) => return sqlite_triggers(pool).await,
        };
        Ok(rows.into_iter().map(Trigger::from).collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            quote_identifier(table, &self.engine)
        );
        let count: i64 = match &self.connection {
            DatabaseConnection::Postgres(pool) => sqlx::query_scalar(&sql).fetch_one(pool).await?,
            DatabaseConnection::MySql(pool) => sqlx::query_scalar(&sql).fetch_one(pool).await?,
            DatabaseConnection::Sqlite(pool) => sqlx::query_scalar(&sql).fetch_one(pool).await?,
        };
        Ok(count.max(0) as u64)
    }
}

async fn postgres_columns(pool: &Pool<Postgres>, schema: &str, table: &str) -> Result<Vec<ColumnRow>> {
    let sql = r#"
        SELECT
            a.attname::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS data_type,
            CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable,
            CASE WHEN a.attgenerated = '' THEN pg_get_expr(d.adbin, d.adrelid) END AS column_default,
            CASE WHEN a.attgenerated <> '' THEN pg_get_expr(d.adbin, d.adrelid) END AS generation_expression,
            CASE WHEN a.attidentity <> '' THEN 'YES' ELSE 'NO' END AS is_identity,
            col_description(c.oid, a.attnum) AS remarks
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
        WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
        ORDER BY a.attnum
    "#;
    Ok(sqlx::query_as::<_, ColumnRow>(sql)
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await?)
}

async fn mysql_columns(pool: &Pool<MySql>, schema: Option<&str>, table: &str) -> Result<Vec<ColumnRow>> {
    let sql = r#"
        SELECT
            CAST(column_name AS CHAR) AS column_name,
            CAST(column_type AS CHAR) AS data_type,
            CAST(is_nullable AS CHAR) AS is_nullable,
            CAST(column_default AS CHAR) AS column_default,
            CAST(NULLIF(generation_expression, '') AS CHAR) AS generation_expression,
            CAST(extra AS CHAR) AS is_identity,
            CAST(column_comment AS CHAR) AS remarks
        FROM information_schema.columns
        WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?
        ORDER BY ordinal_position
    "#;
    Ok(sqlx::query_as::<_, ColumnRow>(sql)
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await?)
}

async fn sqlite_columns(pool: &Pool<Sqlite>, table: &str) -> Result<Vec<Column>> {
    let sql = r#"SELECT name, type, "notnull", dflt_value, pk, hidden FROM pragma_table_xinfo(?) ORDER BY cid"#;
    let rows = sqlx::query(sql).bind(table).fetch_all(pool).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name")?;
        let data_type: String = row.try_get("type")?;
        let notnull: i64 = row.try_get("notnull")?;
        let default: Option<String> = row.try_get("dflt_value")?;
        let pk: i64 = row.try_get("pk")?;
        let hidden: i64 = row.try_get("hidden")?;

        // hidden 1 marks virtual table columns, 2 and 3 generated ones
        if hidden == 1 {
            continue;
        }
        let identity = pk > 0 && data_type.eq_ignore_ascii_case("INTEGER");
        columns.push(Column {
            name,
            data_type,
            nullable: notnull == 0 && pk == 0,
            default,
            computed_by: None,
            identity,
            remarks: None,
        });
    }
    Ok(columns)
}

async fn sqlite_constraint_rows(pool: &Pool<Sqlite>, table: &str) -> Result<Vec<ConstraintRow>> {
    let mut rows = Vec::new();

    let sql = r#"SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk"#;
    for row in sqlx::query(sql).bind(table).fetch_all(pool).await? {
        rows.push(ConstraintRow {
            name: format!("{}_pk", table),
            kind: ConstraintKind::Primary,
            table_name: table.to_string(),
            column_name: row.try_get("name")?,
            referenced_table: None,
            referenced_catalog: None,
            referenced_schema: None,
            referenced_column: None,
            update_rule: None,
            delete_rule: None,
        });
    }

    let sql = r#"
        SELECT il.name AS index_name, ii.name AS column_name
        FROM pragma_index_list(?) il
        JOIN pragma_index_info(il.name) ii
        WHERE il.origin = 'u'
        ORDER BY il.name, ii.seqno
    "#;
    for row in sqlx::query(sql).bind(table).fetch_all(pool).await? {
        let column: Option<String> = row.try_get("column_name")?;
        let Some(column_name) = column else { continue };
        rows.push(ConstraintRow {
            name: row.try_get("index_name")?,
            kind: ConstraintKind::Unique,
            table_name: table.to_string(),
            column_name,
            referenced_table: None,
            referenced_catalog: None,
            referenced_schema: None,
            referenced_column: None,
            update_rule: None,
            delete_rule: None,
        });
    }

    let sql = r#"
        SELECT id, "table", "from", "to", on_update, on_delete
        FROM pragma_foreign_key_list(?)
        ORDER BY id, seq
    "#;
    for row in sqlx::query(sql).bind(table).fetch_all(pool).await? {
        let id: i64 = row.try_get("id")?;
        rows.push(ConstraintRow {
            name: format!("{}_fk_{}", table, id),
            kind: ConstraintKind::Foreign,
            table_name: table.to_string(),
            column_name: row.try_get("from")?,
            referenced_table: row.try_get("table")?,
            referenced_catalog: None,
            referenced_schema: None,
            referenced_column: row.try_get("to")?,
            update_rule: row.try_get("on_update")?,
            delete_rule: row.try_get("on_delete")?,
        });
    }

    Ok(rows)
}

async fn sqlite_index_rows(pool: &Pool<Sqlite>, table: &str) -> Result<Vec<IndexRow>> {
    let sql = r#"
        SELECT il.name AS index_name, il."unique" AS is_unique, il.origin AS origin,
            ii.name AS column_name, ii."desc" AS is_desc, m.sql AS definition
        FROM pragma_index_list(?) il
        JOIN pragma_index_xinfo(il.name) ii
        LEFT JOIN sqlite_master m ON m.type = 'index' AND m.name = il.name
        WHERE ii."key" = 1
        ORDER BY il.name, ii.seqno
    "#;
    let mut rows: Vec<IndexRow> = Vec::new();
    for row in sqlx::query(sql).bind(table).fetch_all(pool).await? {
        let name: String = row.try_get("index_name")?;
        let is_unique: i64 = row.try_get("is_unique")?;
        let is_desc: i64 = row.try_get("is_desc")?;
        let origin: String = row.try_get("origin")?;
        let column_name: Option<String> = row.try_get("column_name")?;
        let definition: Option<String> = row.try_get("definition")?;

        // Expression keys come without a column name; the whole key list of
        // the CREATE INDEX text then becomes the index expression
        if column_name.is_none() {
            let keys = definition
                .as_deref()
                .and_then(|d| INDEX_KEYS.captures(d))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());
            rows.retain(|r| r.name != name);
            rows.push(IndexRow {
                name,
                table_name: table.to_string(),
                non_unique: is_unique == 0,
                column_name: None,
                expression: keys,
                descending: false,
                constraint_type: None,
            });
            continue;
        }
        if rows.iter().any(|r| r.name == name && r.expression.is_some()) {
            continue;
        }

        rows.push(IndexRow {
            name,
            table_name: table.to_string(),
            non_unique: is_unique == 0,
            column_name,
            expression: None,
            descending: is_desc != 0,
            constraint_type: match origin.as_str() {
                "pk" => Some(ConstraintKind::Primary),
                "u" => Some(ConstraintKind::Unique),
                _ => None,
            },
        });
    }
    Ok(rows)
}

async fn sqlite_views(pool: &Pool<Sqlite>) -> Result<Vec<View>> {
    let sql = r#"SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name"#;
    let rows = sqlx::query(sql).fetch_all(pool).await?;

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name")?;
        let definition: Option<String> = row.try_get("sql")?;
        let definition = definition.unwrap_or_default();
        let source = VIEW_BODY
            .captures(&definition)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or(definition);

        let columns = sqlx::query(r#"SELECT name FROM pragma_table_info(?) ORDER BY cid"#)
            .bind(&name)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|c| c.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        views.push(View { name, columns, source });
    }
    Ok(views)
}

async fn sqlite_triggers(pool: &Pool<Sqlite>) -> Result<Vec<Trigger>> {
    let sql = r#"SELECT name, tbl_name, sql FROM sqlite_master WHERE type = 'trigger' ORDER BY name"#;
    let rows = sqlx::query(sql).fetch_all(pool).await?;

    let mut triggers = Vec::with_capacity(rows.len());
    for row in rows {
        let definition: Option<String> = row.try_get("sql")?;
        let definition = definition.unwrap_or_default();
        let event = TRIGGER_EVENT
            .captures(&definition)
            .map(|c| {
                let moment = c.get(1).map(|m| m.as_str()).unwrap_or_default();
                let action = c.get(2).map(|m| m.as_str()).unwrap_or_default();
                format!("{} {}", moment.to_uppercase(), action.trim())
            })
            .unwrap_or_default();
        let source = TRIGGER_BODY
            .find(&definition)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        triggers.push(Trigger {
            name: row.try_get("name")?,
            table_name: row.try_get("tbl_name")?,
            event,
            position: 0,
            active: true,
            source,
        });
    }
    Ok(triggers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_column_has_no_default() {
        let column = Column::from(ColumnRow {
            column_name: "TOTAL".to_string(),
            data_type: "numeric(18,2)".to_string(),
            is_nullable: "YES".to_string(),
            column_default: Some("price * qty".to_string()),
            generation_expression: Some("price * qty".to_string()),
            is_identity: Some("NO".to_string()),
            remarks: Some(String::new()),
        });
        assert_eq!(column.computed_by.as_deref(), Some("price * qty"));
        assert_eq!(column.default, None);
        assert_eq!(column.remarks, None);
        assert!(column.nullable);
    }

    #[test]
    fn test_unknown_constraint_types_are_skipped() {
        let row = ConstraintColumnRow {
            constraint_name: "X".to_string(),
            constraint_type: "EXCLUDE".to_string(),
            table_name: "T".to_string(),
            column_name: "A".to_string(),
            referenced_catalog: None,
            referenced_schema: None,
            referenced_table: None,
            referenced_column: None,
            update_rule: None,
            delete_rule: None,
        };
        assert!(row.into_row().is_none());
    }

    #[test]
    fn test_view_columns_are_split() {
        let view = View::from(ViewRow {
            name: "V".to_string(),
            source: Some(" SELECT a, b FROM t ".to_string()),
            column_list: Some("A,B".to_string()),
        });
        assert_eq!(view.columns, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(view.source, "SELECT a, b FROM t");
    }

    #[test]
    fn test_sqlite_definitions_are_parsed() {
        let view = "CREATE VIEW v_active AS SELECT * FROM users WHERE active = 1";
        let body = VIEW_BODY.captures(view).and_then(|c| c.get(1)).map(|m| m.as_str());
        assert_eq!(body, Some("SELECT * FROM users WHERE active = 1"));

        let trigger = "CREATE TRIGGER trg AFTER INSERT ON users BEGIN UPDATE t SET n = n + 1; END";
        let captures = TRIGGER_EVENT.captures(trigger).map(|c| (c[1].to_string(), c[2].to_string()));
        assert_eq!(captures, Some(("AFTER".to_string(), "INSERT".to_string())));
        assert_eq!(
            TRIGGER_BODY.find(trigger).map(|m| m.as_str()),
            Some("BEGIN UPDATE t SET n = n + 1; END")
        );

        let index = "CREATE INDEX idx_lower ON users (lower(email))";
        let keys = INDEX_KEYS.captures(index).and_then(|c| c.get(1)).map(|m| m.as_str());
        assert_eq!(keys, Some("lower(email)"));
    }
}
