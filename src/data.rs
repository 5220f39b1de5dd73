use std::fmt;

use serde::{Deserialize, Serialize};

/// Tokens that spreadsheets and exports use for "no value".
const NULL_PLACEHOLDERS: &[&str] = &["na", "n/a", "nan", "null", "none", "#n/a"];

/// A single non-null spreadsheet cell. Missing cells are `None` in a
/// [`Cell`], never a variant here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

pub type Cell = Option<Value>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// True for values that carry no data: blank or whitespace-only text,
    /// placeholder tokens such as `N/A`, and NaN floats.
    pub fn is_null_equivalent(&self) -> bool {
        match self {
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || is_placeholder_token(&trimmed.to_ascii_lowercase())
            }
            Value::Float(f) => f.is_nan(),
            Value::Integer(_) | Value::Boolean(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

fn is_placeholder_token(lowered: &str) -> bool {
    NULL_PLACEHOLDERS.contains(&lowered)
}

/// Text cells read from delimited files: empty fields become null, anything
/// else is kept verbatim so a load/write round trip does not reformat data.
pub fn parse_text_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        None
    } else {
        Some(Value::String(raw.to_string()))
    }
}

/// Collapses every null-equivalent value into an explicit `None`.
/// Returns whether the cell is null afterwards.
pub fn normalize_cell(cell: &mut Cell) -> bool {
    if cell.as_ref().is_some_and(Value::is_null_equivalent) {
        *cell = None;
    }
    cell.is_none()
}

pub fn render_cell(cell: &Cell) -> String {
    cell.as_ref().map(Value::as_display).unwrap_or_default()
}
