//! Statement inspection and rewriting.
//!
//! A small lexer finds words, parenthesis depth and `$n` placeholders while
//! skipping string literals, quoted identifiers, dollar-quoted bodies and
//! comments. That is enough to tell whether a statement returns rows and to
//! rewrite it without touching quoted text.

use serde_json::Value;
use toolport_core::{Error, Result};

/// Name of the relation row-returning statements are read through.
const ROWS_ALIAS: &str = "toolport_rows";

const READ_KEYWORDS: &[&str] = &["select", "values", "table"];
const WRITE_KEYWORDS: &[&str] = &["insert", "update", "delete", "merge"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    /// Lowercased keyword or identifier
    Word(String),
    /// `$n` placeholder
    Param(usize),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    depth: usize,
    start: usize,
    end: usize,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// End of a quoted section starting at `start`; doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Index of the closing `$` of a dollar-quote tag opening at `start`.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    (bytes.get(i) == Some(&b'$')).then_some(i)
}

fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i, bytes[i]),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'$' => {
                let start = i;
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits > 0 {
                    i += 1 + digits;
                    if let Ok(n) = sql[start + 1..i].parse() {
                        tokens.push(Token {
                            kind: TokenKind::Param(n),
                            depth,
                            start,
                            end: i,
                        });
                    }
                } else if let Some(tag_end) = dollar_tag_end(bytes, i) {
                    let tag = &sql[start..=tag_end];
                    i = sql[tag_end + 1..]
                        .find(tag)
                        .map_or(bytes.len(), |n| tag_end + 1 + n + tag.len());
                } else {
                    i += 1;
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Word(sql[start..i].to_ascii_lowercase()),
                    depth,
                    start,
                    end: i,
                });
            }
            _ => i += 1,
        }
    }
    tokens
}

fn word(token: &Token) -> Option<&str> {
    match &token.kind {
        TokenKind::Word(w) => Some(w),
        TokenKind::Param(_) => None,
    }
}

/// Strip whitespace and trailing semicolons.
pub fn normalize(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// First keyword of a statement, lowercased, skipping comments and
/// opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<String> {
    tokenize(sql).iter().find_map(word).map(String::from)
}

/// How a statement is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Rewritten so each row arrives as one JSON object in a `row` column,
    /// with columns in select order
    Rows(String),
    /// Run as written; only the affected row count comes back
    Command(String),
}

/// Decide how to run a statement.
///
/// Queries, `VALUES` and `TABLE` return rows, and so do `INSERT`, `UPDATE`,
/// `DELETE` and `MERGE` with a `RETURNING` clause. Statements with a `WITH`
/// clause are judged by their main statement. Data-modifying statements are
/// only allowed in a top-level `WITH`, so those are read through one more
/// common table expression instead of a subquery.
pub fn plan(sql: &str) -> Plan {
    let statement = normalize(sql);
    let tokens = tokenize(statement);
    let Some(first) = tokens.iter().find(|t| word(t).is_some()) else {
        return Plan::Command(statement.to_string());
    };
    let top = first.depth;
    let with_clause = word(first) == Some("with");

    let main = if with_clause {
        tokens.iter().find(|t| {
            t.depth == top
                && word(t).is_some_and(|w| READ_KEYWORDS.contains(&w) || WRITE_KEYWORDS.contains(&w))
        })
    } else {
        Some(first)
    };
    let Some(main) = main else {
        return Plan::Command(statement.to_string());
    };
    let keyword = word(main).unwrap_or_default();

    let writes = WRITE_KEYWORDS.contains(&keyword);
    let returns_rows = READ_KEYWORDS.contains(&keyword)
        || (writes
            && tokens
                .iter()
                .any(|t| t.start > main.start && t.depth == top && word(t) == Some("returning")));
    if !returns_rows {
        return Plan::Command(statement.to_string());
    }

    if top > 0 || (!with_clause && !writes) {
        return Plan::Rows(format!(
            "SELECT to_json(q) AS row FROM ({}) AS q",
            statement
        ));
    }

    let head = if with_clause {
        format!("{}, ", statement[..main.start].trim_end())
    } else {
        "WITH ".to_string()
    };
    Plan::Rows(format!(
        "{head}{alias} AS ({body}) SELECT to_json({alias}) AS row FROM {alias}",
        head = head,
        alias = ROWS_ALIAS,
        body = &statement[main.start..],
    ))
}

/// Whether the statement returns rows.
pub fn returns_rows(sql: &str) -> bool {
    matches!(plan(sql), Plan::Rows(_))
}

/// Escape-string constant, safe whatever `standard_conforming_strings` says.
fn string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 3);
    literal.push_str("E'");
    for c in text.chars() {
        match c {
            '\'' => literal.push_str("''"),
            '\\' => literal.push_str("\\\\"),
            c => literal.push(c),
        }
    }
    literal.push('\'');
    literal
}

/// SQL text standing in for one parameter value.
///
/// Strings, `null` and JSON documents become untyped constants, so the
/// server gives them the type their position calls for (a timestamp
/// column, a `uuid` comparison, a `jsonb` column) exactly as it would for
/// a quoted literal in the statement.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        // Parenthesized so a negative number never forms a `--` comment
        Value::Number(n) => format!("({})", n),
        Value::String(s) => string_literal(s),
        other => string_literal(&other.to_string()),
    }
}

/// Substitute `$n` placeholders with parameter literals.
///
/// Placeholders inside quoted text and comments are left alone.
pub fn bind_inline(sql: &str, params: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for token in tokenize(sql) {
        let TokenKind::Param(n) = token.kind else {
            continue;
        };
        let value = n
            .checked_sub(1)
            .and_then(|index| params.get(index))
            .ok_or_else(|| {
                Error::validation(
                    "params",
                    format!(
                        "statement references ${} but {} parameters were given",
                        n,
                        params.len()
                    ),
                )
            })?;
        out.push_str(&sql[last..token.start]);
        out.push_str(&literal(value));
        last = token.end;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  SELECT 1").as_deref(), Some("select"));
        assert_eq!(
            leading_keyword("-- count users\nselect count(*) from users").as_deref(),
            Some("select")
        );
        assert_eq!(
            leading_keyword("/* cte */ WITH x AS (select 1) select * from x").as_deref(),
            Some("with")
        );
        assert_eq!(leading_keyword("((select 1))").as_deref(), Some("select"));
        assert_eq!(leading_keyword("   "), None);
        assert_eq!(leading_keyword("-- only a comment"), None);
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("select * from users"));
        assert!(returns_rows("VALUES (1), (2)"));
        assert!(returns_rows("table users"));
        assert!(!returns_rows("UPDATE users SET active = false"));
        assert!(!returns_rows("insert into t values (1)"));
        assert!(!returns_rows("SHOW search_path"));
        assert!(!returns_rows("selectivity"));
    }

    #[test]
    fn test_plain_query_wrapped_as_subquery() {
        assert_eq!(
            plan("select id from users;;  "),
            Plan::Rows("SELECT to_json(q) AS row FROM (select id from users) AS q".to_string())
        );
        assert_eq!(
            plan("WITH x AS (select 1 AS n) select n from x"),
            Plan::Rows(
                "WITH x AS (select 1 AS n), toolport_rows AS (select n from x) \
                 SELECT to_json(toolport_rows) AS row FROM toolport_rows"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_returning_reads_rows() {
        assert_eq!(
            plan("INSERT INTO customers (email) VALUES ($1) RETURNING id"),
            Plan::Rows(
                "WITH toolport_rows AS (INSERT INTO customers (email) VALUES ($1) RETURNING id) \
                 SELECT to_json(toolport_rows) AS row FROM toolport_rows"
                    .to_string()
            )
        );
        assert!(returns_rows("delete from orders where id = $1 returning *"));
        // A RETURNING inside a subquery or a literal does not count
        assert!(!returns_rows(
            "update t set note = 'returning' where id in (select id from s)"
        ));
    }

    #[test]
    fn test_data_modifying_cte_stays_top_level() {
        let statement =
            "WITH moved AS (DELETE FROM orders WHERE id = $1 RETURNING *) SELECT count(*) FROM moved";
        assert_eq!(
            plan(statement),
            Plan::Rows(
                "WITH moved AS (DELETE FROM orders WHERE id = $1 RETURNING *), \
                 toolport_rows AS (SELECT count(*) FROM moved) \
                 SELECT to_json(toolport_rows) AS row FROM toolport_rows"
                    .to_string()
            )
        );

        let archived = "WITH gone AS (DELETE FROM orders RETURNING *) \
                        INSERT INTO archive SELECT * FROM gone";
        assert_eq!(plan(archived), Plan::Command(archived.to_string()));
    }

    #[test]
    fn test_literals_leave_server_to_infer_types() {
        assert_eq!(literal(&json!("2024-01-01")), "E'2024-01-01'");
        assert_eq!(literal(&json!(null)), "NULL");
        assert_eq!(literal(&json!(true)), "true");
        assert_eq!(literal(&json!(-5)), "(-5)");
        assert_eq!(literal(&json!(2.5)), "(2.5)");
        assert_eq!(literal(&json!({"tier": "gold"})), r#"E'{"tier":"gold"}'"#);
        assert_eq!(literal(&json!(r"it's C:\tmp")), r"E'it''s C:\\tmp'");
    }

    #[test]
    fn test_bind_inline() {
        let sql = bind_inline(
            "select * from t where ts > $1 and id = $2 and deleted_at is not distinct from $3",
            &[json!("2024-01-01"), json!(7), json!(null)],
        )
        .unwrap();
        assert_eq!(
            sql,
            "select * from t where ts > E'2024-01-01' and id = (7) and deleted_at is not distinct from NULL"
        );

        let sql = bind_inline(
            "select '$1', \"$1\", $$ $1 $$ -- $1\n, $1",
            &[json!("x")],
        )
        .unwrap();
        assert_eq!(sql, "select '$1', \"$1\", $$ $1 $$ -- $1\n, E'x'");
    }

    #[test]
    fn test_bind_inline_missing_param() {
        let err = bind_inline("select $2", &[json!(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'params': statement references $2 but 1 parameters were given"
        );
    }
}
