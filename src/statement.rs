//! Placeholder substitution for readable statements.
//!
//! Scans the SQL text left to right, tracking whether the cursor sits inside a
//! single-quoted literal, and fills placeholders outside any literal. This is
//! not a SQL parser: quoted identifiers, comments and dollar quoting are not
//! understood.

use std::ops::Range;

use sea_orm::DbBackend;

use crate::binding::{Binding, BindingKey};
use crate::driver::QueryConnection;
use crate::error::RecordError;
use crate::render::render;

/// Placeholder and literal conventions of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// `?` placeholders, backslash escapes in literals.
    MySql,
    /// `$1`, `$2`, ... placeholders, backslash escapes only in `E'...'`.
    Postgres,
    /// `?` placeholders, no backslash escapes.
    Sqlite,
    /// `?` placeholders, backslash escapes in literals.
    Generic,
}

impl From<DbBackend> for SqlDialect {
    fn from(backend: DbBackend) -> Self {
        match backend {
            DbBackend::MySql => SqlDialect::MySql,
            DbBackend::Postgres => SqlDialect::Postgres,
            DbBackend::Sqlite => SqlDialect::Sqlite,
        }
    }
}

impl SqlDialect {
    fn placeholder<'a>(&self, key: &'a BindingKey) -> Placeholder<'a> {
        match (self, key) {
            (SqlDialect::Postgres, BindingKey::Position(index)) => Placeholder::Numbered(index + 1),
            (_, BindingKey::Position(_)) => Placeholder::QuestionMark,
            (_, BindingKey::Name(name)) => Placeholder::Named(name),
        }
    }

    fn backslash_escapes(&self) -> bool {
        matches!(self, SqlDialect::MySql | SqlDialect::Generic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder<'a> {
    QuestionMark,
    Numbered(usize),
    Named(&'a str),
}

impl Placeholder<'_> {
    /// `$n` names one parameter wherever it appears; `?` and `:name` are
    /// consumed one occurrence per binding.
    fn replaces_all(&self) -> bool {
        matches!(self, Placeholder::Numbered(_))
    }

    /// Length of the placeholder if one starts at `at`.
    fn match_at(&self, bytes: &[u8], at: usize) -> Option<usize> {
        match *self {
            Placeholder::QuestionMark => (bytes[at] == b'?').then_some(1),
            Placeholder::Numbered(number) => {
                if bytes[at] != b'$' || (at > 0 && is_ident(bytes[at - 1])) {
                    return None;
                }
                let digits = bytes[at + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                let text = std::str::from_utf8(&bytes[at + 1..at + 1 + digits]).ok()?;
                (digits > 0 && text.parse::<usize>().ok()? == number).then_some(1 + digits)
            }
            Placeholder::Named(name) => {
                if name.is_empty() || bytes[at] != b':' || (at > 0 && bytes[at - 1] == b':') {
                    return None;
                }
                let end = at + 1 + name.len();
                let matches = bytes[at + 1..].starts_with(name.as_bytes())
                    && !bytes.get(end).copied().is_some_and(is_ident);
                matches.then_some(1 + name.len())
            }
        }
    }
}

fn is_ident(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80
}

/// Find the first placeholder outside string literals, scanning from `from`.
/// `from` must not lie inside a literal.
fn find_placeholder(
    sql: &str,
    from: usize,
    placeholder: Placeholder<'_>,
    dialect: SqlDialect,
) -> Option<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            let backslash = dialect.backslash_escapes()
                || (dialect == SqlDialect::Postgres && is_escape_string_prefix(bytes, i));
            i = skip_literal(bytes, i, backslash);
            continue;
        }
        if let Some(len) = placeholder.match_at(bytes, i) {
            return Some(i..i + len);
        }
        i += 1;
    }
    None
}

/// `E'...'` opens a PostgreSQL escape string.
fn is_escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    quote > 0
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote < 2 || !is_ident(bytes[quote - 2]))
}

/// Index just past the literal opened at `open`. An unterminated literal
/// runs to the end of the text.
fn skip_literal(bytes: &[u8], open: usize, backslash: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Inline each binding into `sql`, in order, one placeholder per binding.
/// A PostgreSQL `$n` binding fills every `$n` outside literals.
///
/// Bindings without a remaining placeholder are skipped and surplus
/// placeholders are left as they are.
pub fn substitute<C>(
    sql: &str,
    bindings: &[Binding],
    connection: &C,
) -> Result<String, RecordError>
where
    C: QueryConnection + ?Sized,
{
    let dialect = connection.dialect();
    let mut sql = sql.to_string();

    for binding in bindings {
        let rendered = render(&binding.value, connection).map_err(|source| RecordError::Quote {
            driver: connection.driver_name().to_string(),
            key: binding.key.clone(),
            source,
        })?;

        let placeholder = dialect.placeholder(&binding.key);
        let mut from = 0;
        while let Some(range) = find_placeholder(&sql, from, placeholder, dialect) {
            from = range.start + rendered.len();
            sql.replace_range(range, &rendered);
            if !placeholder.replaces_all() {
                break;
            }
        }
    }

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingValue;
    use crate::render::tests::StubConnection;

    fn generic() -> StubConnection {
        StubConnection::unsupported()
    }

    fn dialect(dialect: SqlDialect) -> StubConnection {
        StubConnection {
            dialect,
            ..StubConnection::unsupported()
        }
    }

    fn ints(values: &[i64]) -> Vec<Binding> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Binding::positional(i, BindingValue::Int(*v)))
            .collect()
    }

    #[test]
    fn test_positional_in_order() {
        let sql = substitute(
            "insert into t values (?, ?, ?)",
            &ints(&[1, 2, 3]),
            &generic(),
        )
        .unwrap();
        assert_eq!(sql, "insert into t values (1, 2, 3)");
    }

    #[test]
    fn test_skips_placeholder_in_literal() {
        let sql = substitute("select '?' , ?", &ints(&[5]), &generic()).unwrap();
        assert_eq!(sql, "select '?' , 5");
    }

    #[test]
    fn test_doubled_quote_stays_in_literal() {
        let conn = dialect(SqlDialect::Sqlite);
        let sql = substitute("select 'it''s ?', ?", &ints(&[1]), &conn).unwrap();
        assert_eq!(sql, "select 'it''s ?', 1");
    }

    #[test]
    fn test_backslash_escaped_quote_stays_in_literal() {
        let conn = dialect(SqlDialect::MySql);
        let sql = substitute(r"select 'a\'?', ?", &ints(&[1]), &conn).unwrap();
        assert_eq!(sql, r"select 'a\'?', 1");
    }

    #[test]
    fn test_unterminated_literal_is_opaque() {
        let sql = substitute("select 'abc ?", &ints(&[1]), &generic()).unwrap();
        assert_eq!(sql, "select 'abc ?");
    }

    #[test]
    fn test_repeated_named_bind_in_order() {
        let bindings = vec![
            Binding::named("x", BindingValue::Int(1)),
            Binding::named("x", BindingValue::Int(2)),
        ];
        let sql = substitute("where a = :x and b = :x", &bindings, &generic()).unwrap();
        assert_eq!(sql, "where a = 1 and b = 2");
    }

    #[test]
    fn test_named_respects_word_boundary_and_casts() {
        let bindings = vec![
            Binding::named("id", BindingValue::Int(1)),
            Binding::named("text", BindingValue::Int(2)),
        ];
        let sql = substitute(
            "where a::text = :text and b = :identifier and c = :id",
            &bindings,
            &generic(),
        )
        .unwrap();
        assert_eq!(sql, "where a::text = 2 and b = :identifier and c = 1");
    }

    #[test]
    fn test_more_placeholders_than_bindings() {
        let sql = substitute("select ?, ?, ?", &ints(&[1]), &generic()).unwrap();
        assert_eq!(sql, "select 1, ?, ?");
    }

    #[test]
    fn test_binding_without_placeholder_is_dropped() {
        let bindings = vec![
            Binding::named("missing", BindingValue::Int(9)),
            Binding::positional(0, BindingValue::Int(1)),
        ];
        let sql = substitute("select ?", &bindings, &generic()).unwrap();
        assert_eq!(sql, "select 1");
    }

    #[test]
    fn test_rendered_value_is_not_rescanned() {
        let bindings = vec![
            Binding::positional(0, BindingValue::Text("a?b".into())),
            Binding::positional(1, BindingValue::Text("O'Brien".into())),
            Binding::positional(2, BindingValue::Int(3)),
        ];
        let sql = substitute("values (?, ?, ?)", &bindings, &generic()).unwrap();
        assert_eq!(sql, r"values ('a?b', 'O\'Brien', 3)");
    }

    #[test]
    fn test_postgres_numbered() {
        let conn = dialect(SqlDialect::Postgres);
        let sql = substitute(
            "where a = $2 and b = $1 or c = $10",
            &ints(&[1, 2]),
            &conn,
        )
        .unwrap();
        assert_eq!(sql, "where a = 2 and b = 1 or c = $10");
    }

    #[test]
    fn test_postgres_repeated_number_fills_every_occurrence() {
        let conn = dialect(SqlDialect::Postgres);
        let sql = substitute("where a = $1 or b = $1", &ints(&[5]), &conn).unwrap();
        assert_eq!(sql, "where a = 5 or b = 5");

        let sql = substitute("select '$1', $1, $2, $1", &ints(&[7, 8]), &conn).unwrap();
        assert_eq!(sql, "select '$1', 7, 8, 7");
    }

    #[test]
    fn test_postgres_repeated_number_skips_inserted_text() {
        let conn = dialect(SqlDialect::Postgres);
        let bindings = vec![Binding::positional(0, BindingValue::Text("$1".into()))];
        let sql = substitute("where a = $1 or b = $1", &bindings, &conn).unwrap();
        assert_eq!(sql, "where a = '$1' or b = '$1'");
    }

    #[test]
    fn test_postgres_escape_string() {
        let conn = dialect(SqlDialect::Postgres);
        let sql = substitute(r"select E'\'$1', $1", &ints(&[5]), &conn).unwrap();
        assert_eq!(sql, r"select E'\'$1', 5");
    }

    #[test]
    fn test_quote_failure_reports_binding() {
        let bindings = vec![
            Binding::positional(0, BindingValue::Int(1)),
            Binding::named("n", BindingValue::Text("x".into())),
        ];
        let conn = StubConnection::failing();
        let err = substitute("select ?, :n", &bindings, &conn).unwrap_err();
        match err {
            RecordError::Quote { driver, key, .. } => {
                assert_eq!(driver, "stub");
                assert_eq!(key, BindingKey::Name("n".to_string()));
            }
        }
    }
}
