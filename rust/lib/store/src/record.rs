use serde::de::DeserializeOwned;
use serde::Serialize;

use labtrack_sql::Value;

/// SQL type of an extracted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

impl ColumnKind {
    fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

/// A record field copied out of the JSON document into its own column.
///
/// `name` is the snake_case column name; the value is read from the
/// camelCase key of the serialized record.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub unique: bool,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Text, unique: false }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Integer, unique: false }
    }

    pub const fn real(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Real, unique: false }
    }

    pub const fn unique(self) -> Self {
        Self { unique: true, ..self }
    }

    pub(crate) fn ddl(&self) -> String {
        let mut def = format!("\"{}\" {}", self.name, self.kind.sql_type());
        if self.unique {
            def.push_str(" UNIQUE");
        }
        def
    }

    /// Pull this column's value out of a serialized record.
    pub(crate) fn extract(&self, json: &serde_json::Value) -> Value {
        let v = json
            .get(to_camel_case(self.name))
            .or_else(|| json.get(self.name));
        match v {
            None | Some(serde_json::Value::Null) => Value::Null,
            Some(serde_json::Value::String(s)) => Value::Text(s.clone()),
            Some(serde_json::Value::Bool(b)) => Value::Integer(*b as i64),
            Some(serde_json::Value::Number(n)) => match self.kind {
                ColumnKind::Real => Value::Real(n.as_f64().unwrap_or(0.0)),
                _ => n
                    .as_i64()
                    .map(Value::Integer)
                    .unwrap_or_else(|| Value::Real(n.as_f64().unwrap_or(0.0))),
            },
            Some(other) => Value::Text(other.to_string()),
        }
    }
}

/// A model persisted by [`crate::Table`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name in SQL.
    const TABLE: &'static str;

    /// Extracted columns, in addition to `id` and `data`.
    const COLUMNS: &'static [Column];

    /// Primary key.
    fn id(&self) -> &str;

    /// Look up a declared column (or `id`) by snake_case name.
    fn has_column(name: &str) -> bool {
        name == "id" || Self::COLUMNS.iter().any(|c| c.name == name)
    }
}

pub(crate) fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

pub(crate) fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for ch in s.chars() {
        if ch.is_ascii_uppercase() {
            result.push('_');
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
