use std::fmt;

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Number, Value};

/// A leaf value in a canonical or mapped row.
///
/// Nested objects never reach this type; they are flattened first. Arrays are
/// carried as an opaque `List` leaf and never expanded into extra columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Value>),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    /// Converts a flattened leaf, applying the empty-string default for nulls.
    pub fn from_leaf(value: &Value) -> Self {
        match value {
            Value::Null => Cell::empty(),
            other => Cell::from(other),
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }

    /// Null, `false`, zero and empty text never match a search term.
    pub fn is_falsy(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Bool(b) => !b,
            Cell::Number(n) => n.as_f64() == Some(0.0),
            Cell::Text(s) => s.is_empty(),
            Cell::List(_) => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => format_number(n),
            Cell::Text(s) => s.clone(),
            Cell::List(items) => items.iter().map(display_list_item).join(","),
        }
    }

    /// Renders the cell as a SQL literal for `INSERT` statements.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Bool(true) => "TRUE".to_string(),
            Cell::Bool(false) => "FALSE".to_string(),
            Cell::Number(n) => n.to_string(),
            other => quote_sql_string(&other.as_display()),
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(whole_float_as_integer(n)),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(items) => Cell::List(items.clone()),
            Value::Object(_) => Cell::Text(value.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(Number::from(value))
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// `30.0` becomes `30` so every output format renders it the same way.
fn whole_float_as_integer(n: &Number) -> Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => Number::from(f as i64),
        _ => n.clone(),
    }
}

fn format_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn display_list_item(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_list_item).join(","),
        Value::Object(_) => value.to_string(),
        other => Cell::from(other).as_display(),
    }
}

pub fn quote_sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn quote_sql_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// Lowercases and replaces every non-alphanumeric character with `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn sanitize_table_name(name: Option<&str>) -> String {
    match name.map(normalize_column_name) {
        Some(sanitized) if !sanitized.is_empty() => sanitized,
        _ => "exported_data".to_string(),
    }
}
