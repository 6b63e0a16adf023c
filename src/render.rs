//! Rendering binding values as SQL literals.

use sea_orm::DbErr;

use crate::binding::BindingValue;
use crate::driver::{QueryConnection, Quoted};

/// Render one normalized value as the text that replaces its placeholder.
///
/// `Null` renders as `null`, numbers as their plain decimal text, and text
/// goes through [`quote_string`].
pub fn render<C>(value: &BindingValue, connection: &C) -> Result<String, DbErr>
where
    C: QueryConnection + ?Sized,
{
    match value {
        BindingValue::Null => Ok("null".to_string()),
        BindingValue::Int(n) => Ok(n.to_string()),
        BindingValue::UInt(n) => Ok(n.to_string()),
        BindingValue::Float(f) => Ok(f.to_string()),
        BindingValue::Text(s) => quote_string(connection, s),
    }
}

/// Quote a string with the connection's native quoting, falling back to
/// [`fallback_quote`] only when the driver reports it has none.
pub fn quote_string<C>(connection: &C, raw: &str) -> Result<String, DbErr>
where
    C: QueryConnection + ?Sized,
{
    match connection.quote(raw)? {
        Quoted::Native(literal) => Ok(literal),
        Quoted::Unsupported => {
            tracing::debug!(
                driver = connection.driver_name(),
                "Native quoting unsupported, using fallback escaper"
            );
            Ok(fallback_quote(raw))
        }
    }
}

/// Backslash-escape a string and wrap it in single quotes.
///
/// Only meant for display. It is not a safe escaper for execution.
pub fn fallback_quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    for c in raw.chars() {
        match c {
            '\u{1a}' => quoted.push_str("\\Z"),
            '\u{08}' => quoted.push_str("\\b"),
            '"' => quoted.push_str("\\\""),
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}
