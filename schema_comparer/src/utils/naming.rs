//! Naming utilities for the schema comparer
//!
//! Every identifier written into generated SQL goes through [`quote_identifier`].

use inflector::Inflector;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::types::{Engine, EngineKind};

/// Identifiers the Firebird family accepts without quotes
static FIREBIRD_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_$]*$").expect("valid identifier regex"));

/// Identifiers Postgres folds to the same lower-case name
static POSTGRES_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("valid identifier regex"));

/// Identifiers MySQL and SQLite accept without quotes
static GENERIC_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Check if a name is a reserved SQL keyword
pub fn is_sql_keyword(name: &str) -> bool {
    // Reserved across the supported engines, Firebird's list first
    const SQL_KEYWORDS: &[&str] = &[
        "add", "admin", "all", "alter", "and", "any", "as", "at", "avg", "begin", "between",
        "bigint", "bit_length", "blob", "boolean", "both", "by", "case", "cast", "char",
        "character", "check", "close", "collate", "column", "commit", "connect", "constraint",
        "count", "create", "cross", "current", "current_date", "current_time",
        "current_timestamp", "current_user", "cursor", "date", "day", "dec", "decimal",
        "declare", "default", "delete", "deleting", "desc", "disconnect", "distinct", "double",
        "drop", "else", "end", "escape", "execute", "exists", "external", "extract", "false",
        "fetch", "filter", "float", "for", "foreign", "from", "full", "function", "gdscode",
        "global", "grant", "group", "having", "hour", "in", "index", "inner", "insert",
        "inserting", "int", "integer", "intersect", "into", "is", "join", "key", "leading",
        "left", "like", "limit", "max", "merge", "min", "minute", "month", "natural", "not",
        "null", "numeric", "of", "offset", "on", "only", "open", "or", "order", "outer",
        "parameter", "plan", "position", "post_event", "precision", "primary", "procedure",
        "record_version", "references", "release", "returns", "revoke", "right", "rollback",
        "row_count", "rows", "savepoint", "second", "select", "sensitive", "set", "similar",
        "smallint", "some", "sqlcode", "sqlstate", "start", "sum", "table", "then", "time",
        "timestamp", "to", "top", "trailing", "trigger", "trim", "true", "union", "unique",
        "unknown", "update", "updating", "user", "using", "value", "values", "varchar",
        "variable", "varying", "view", "when", "where", "while", "with", "year",
    ];

    SQL_KEYWORDS.contains(&name.to_lowercase().as_str())
}

/// Whether `name` can be written without quotes on `engine`
pub fn is_plain_identifier(name: &str, engine: &Engine) -> bool {
    let pattern: &Regex = match engine.kind {
        EngineKind::Firebird | EngineKind::RedDatabase => &FIREBIRD_PLAIN,
        EngineKind::Postgres => &POSTGRES_PLAIN,
        EngineKind::MySql | EngineKind::Sqlite => &GENERIC_PLAIN,
    };

    pattern.is_match(name) && !is_sql_keyword(name)
}

/// Format SQL identifier according to engine style, quoting only when needed
pub fn quote_identifier(name: &str, engine: &Engine) -> String {
    if is_plain_identifier(name, engine) {
        return name.to_string();
    }

    match engine.kind {
        EngineKind::MySql => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// Quote a list of identifiers and join them with `, `
pub fn quote_list<S: AsRef<str>>(names: &[S], engine: &Engine) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name.as_ref(), engine))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape a value as a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Named parameter used in statement templates, e.g. `ORDER_DATE` becomes `:orderDate`
pub fn parameter_name(column_name: &str) -> String {
    format!(":{}", column_name.to_lowercase().to_camel_case())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn firebird() -> Engine {
        Engine::new(EngineKind::Firebird, 4)
    }

    #[test]
    fn test_is_sql_keyword() {
        assert!(is_sql_keyword("SELECT"));
        assert!(is_sql_keyword("position"));
        assert!(is_sql_keyword("Value"));
        assert!(!is_sql_keyword("customer"));
    }

    #[rstest]
    #[case("CUSTOMERS", "CUSTOMERS")]
    #[case("ORDER_LINES$1", "ORDER_LINES$1")]
    #[case("Customers", "\"Customers\"")]
    #[case("ORDER", "\"ORDER\"")]
    #[case("1ST_TABLE", "\"1ST_TABLE\"")]
    #[case("MY \"TABLE\"", "\"MY \"\"TABLE\"\"\"")]
    fn test_firebird_quoting(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(quote_identifier(name, &firebird()), expected);
    }

    #[rstest]
    #[case(EngineKind::Postgres, "orders", "orders")]
    #[case(EngineKind::Postgres, "Orders", "\"Orders\"")]
    #[case(EngineKind::MySql, "from", "`from`")]
    #[case(EngineKind::MySql, "Orders", "Orders")]
    #[case(EngineKind::Sqlite, "order items", "\"order items\"")]
    fn test_other_engine_quoting(#[case] kind: EngineKind, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(quote_identifier(name, &Engine::new(kind, 1)), expected);
    }

    #[test]
    fn test_quote_literal_and_parameters() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(parameter_name("ORDER_DATE"), ":orderDate");
        assert_eq!(parameter_name("id"), ":id");
    }
}
