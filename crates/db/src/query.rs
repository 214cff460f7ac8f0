//! Query building blocks shared by all backends.

use std::fmt;

/// Ordering applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Row filter. Rendered into the service's formula language on the wire and
/// evaluated directly by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    /// Exact match of a text field.
    FieldEquals { field: String, value: String },
}

impl Formula {
    pub fn field_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Formula::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::FieldEquals { field, value } => {
                write!(f, "{{{}}}='{}'", field, escape_literal(value))
            }
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch == '\'' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parameters for a list call. The default lists every row in storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub max_records: Option<u32>,
    pub sort: Vec<Sort>,
    pub formula: Option<Formula>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_records(mut self, max: u32) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }
}
