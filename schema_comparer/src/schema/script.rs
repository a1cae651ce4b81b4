//! Generated scripts and statement splitting

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// `SET TERM <new> <current>` client directive
static SET_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^SET\s+TERM\s+(\S+)\s+(\S+)").expect("valid SET TERM regex"));

/// MySQL client `DELIMITER <new>` directive
static DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^DELIMITER[ \t]+(\S+)").expect("valid DELIMITER regex"));

/// Opening tag of a Postgres dollar-quoted string, `$$` or `$tag$`
static DOLLAR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_]*)?\$").expect("valid dollar quote regex"));

/// A titled block of statements, such as "Foreign keys"
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSection {
    pub title: String,
    pub statements: Vec<String>,
}

/// An ordered script assembled from sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    sections: Vec<ScriptSection>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section; blank statements are dropped and an empty section is skipped
    pub fn push_section<I, S>(&mut self, title: &str, statements: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statements: Vec<String> = statements
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.trim().is_empty())
            .collect();
        if statements.is_empty() {
            return;
        }
        tracing::debug!(section = title, count = statements.len(), "Script section produced");
        self.sections.push(ScriptSection {
            title: title.to_string(),
            statements,
        });
    }

    /// Append all sections of another script
    pub fn extend(&mut self, other: Script) {
        self.sections.extend(other.sections);
    }

    pub fn sections(&self) -> &[ScriptSection] {
        &self.sections
    }

    /// Rendered statements in order, as generated (PSQL blocks keep their `SET TERM`)
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|section| section.statements.iter().map(String::as_str))
    }

    /// Statements ready to send to a driver one by one
    pub fn executable_statements(&self) -> Vec<String> {
        split_statements(&self.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            writeln!(f, "-- {}", section.title)?;
            f.write_str(&section.statements.join("\n\n"))?;
        }
        if !self.sections.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Split script text into statements.
///
/// Terminators inside string literals, quoted identifiers and comments are
/// ignored, including Postgres dollar-quoted bodies. `SET TERM` and MySQL
/// `DELIMITER` directives switch the terminator and are not returned.
/// Statements are trimmed, lose their terminator, and comment-only fragments
/// are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut terminator = String::from(";");
    let mut current = String::new();
    let mut has_code = false;
    let mut rest = script;

    while let Some(c) = rest.chars().next() {
        if !has_code {
            if let Some(captures) = SET_TERM.captures(rest) {
                if &captures[2] == terminator {
                    terminator = captures[1].to_string();
                    rest = &rest[captures[0].len()..];
                    current.clear();
                    continue;
                }
            }
            if let Some(captures) = DELIMITER.captures(rest) {
                terminator = captures[1].to_string();
                rest = &rest[captures[0].len()..];
                current.clear();
                continue;
            }
        }

        let consumed = if rest.starts_with("--") {
            rest.find('\n').map_or(rest.len(), |i| i + 1)
        } else if rest.starts_with("/*") {
            rest[2..].find("*/").map_or(rest.len(), |i| i + 4)
        } else if c == '\'' || c == '"' {
            has_code = true;
            quoted_len(rest, c)
        } else if c == '$' && !current.ends_with(is_identifier_char) && DOLLAR_TAG.is_match(rest) {
            has_code = true;
            dollar_quoted_len(rest)
        } else if rest.starts_with(terminator.as_str()) {
            push_statement(&mut statements, &current, has_code);
            current.clear();
            has_code = false;
            rest = &rest[terminator.len()..];
            continue;
        } else {
            if !c.is_whitespace() {
                has_code = true;
            }
            c.len_utf8()
        };

        current.push_str(&rest[..consumed]);
        rest = &rest[consumed..];
    }

    push_statement(&mut statements, &current, has_code);
    statements
}

/// Length of the quoted token at the start of `text`, doubled quotes included
fn quoted_len(text: &str, quote: char) -> usize {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            match chars.peek() {
                Some((_, next)) if *next == quote => {
                    chars.next();
                }
                _ => return i + c.len_utf8(),
            }
        }
    }
    text.len()
}

/// Length of the dollar-quoted string at the start of `text`, both tags included
fn dollar_quoted_len(text: &str) -> usize {
    let tag = DOLLAR_TAG.find(text).map_or("$$", |m| m.as_str());
    text[tag.len()..]
        .find(tag)
        .map_or(text.len(), |i| 2 * tag.len() + i)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn push_statement(statements: &mut Vec<String>, text: &str, has_code: bool) {
    let text = text.trim();
    if has_code && !text.is_empty() {
        statements.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_respects_literals_and_comments() {
        let sql = "INSERT INTO T VALUES ('a;b', \"x;y\");\n-- comment; still comment\n/* block ; */\nDELETE FROM T;";

        assert_eq!(
            split_statements(sql),
            vec![
                "INSERT INTO T VALUES ('a;b', \"x;y\")".to_string(),
                "-- comment; still comment\n/* block ; */\nDELETE FROM T".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_handles_set_term() {
        let sql = "CREATE TABLE T (ID INTEGER);\nSET TERM ^ ;\nCREATE OR ALTER PROCEDURE P AS\nBEGIN\n  DELETE FROM T;\nEND^\nSET TERM ; ^\nDROP TABLE U;";

        assert_eq!(
            split_statements(sql),
            vec![
                "CREATE TABLE T (ID INTEGER)".to_string(),
                "CREATE OR ALTER PROCEDURE P AS\nBEGIN\n  DELETE FROM T;\nEND".to_string(),
                "DROP TABLE U".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_doubled_quotes_and_blank_input() {
        assert_eq!(
            split_statements("SELECT 'it''s; fine' FROM RDB$DATABASE"),
            vec!["SELECT 'it''s; fine' FROM RDB$DATABASE".to_string()]
        );
        assert!(split_statements(" ;\n -- only a comment\n").is_empty());
    }

    #[test]
    fn test_split_keeps_dollar_quoted_bodies() {
        let sql = "CREATE PROCEDURE p() LANGUAGE plpgsql AS $$BEGIN DELETE FROM t; END$$;\n\
                   CREATE FUNCTION f() RETURNS int LANGUAGE plpgsql AS $body$BEGIN RETURN 1; END$body$;\n\
                   SELECT price$ FROM RDB$DATABASE;";

        assert_eq!(
            split_statements(sql),
            vec![
                "CREATE PROCEDURE p() LANGUAGE plpgsql AS $$BEGIN DELETE FROM t; END$$".to_string(),
                "CREATE FUNCTION f() RETURNS int LANGUAGE plpgsql AS $body$BEGIN RETURN 1; END$body$".to_string(),
                "SELECT price$ FROM RDB$DATABASE".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_handles_mysql_delimiter() {
        let sql = "DELIMITER //\nCREATE PROCEDURE purge()\nBEGIN\n  DELETE FROM t;\nEND//\nDELIMITER ;\nDROP TABLE u;";

        assert_eq!(
            split_statements(sql),
            vec![
                "CREATE PROCEDURE purge()\nBEGIN\n  DELETE FROM t;\nEND".to_string(),
                "DROP TABLE u".to_string(),
            ]
        );
    }

    #[test]
    fn test_script_display_separates_sections() {
        let mut script = Script::new();
        script.push_section("Tables", vec!["CREATE TABLE T (ID INTEGER);"]);
        script.push_section("Empty", Vec::<String>::new());
        script.push_section("Primary keys", vec!["ALTER TABLE T ADD CONSTRAINT PK_T PRIMARY KEY (ID);"]);

        assert_eq!(script.sections().len(), 2);
        assert_eq!(
            script.to_string(),
            "-- Tables\nCREATE TABLE T (ID INTEGER);\n\n-- Primary keys\nALTER TABLE T ADD CONSTRAINT PK_T PRIMARY KEY (ID);\n"
        );
        assert_eq!(script.executable_statements().len(), 2);
    }
}
