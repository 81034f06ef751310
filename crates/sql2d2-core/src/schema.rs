//! Relational schema model
//!
//! Both extraction paths (live introspection and DDL parsing) produce this
//! model, and the diagram builders consume it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A constraint attached to a single column
///
/// Closed set of variants. Tags that are not understood are kept as
/// `Unknown` rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Column rejects NULL
    NotNull,

    /// Raw default expression, uninterpreted
    Default { value: String },

    /// Column is (part of) the primary key
    PrimaryKey,

    /// Column references another table's column
    ///
    /// The target is never checked against the schema.
    ForeignKey {
        to_table: String,
        to_column: String,
    },

    /// Column values are unique
    Unique,

    /// Unrecognized constraint tag, kept verbatim
    Unknown { name: String },
}

impl Constraint {
    /// Create a default constraint
    pub fn default_value(value: impl Into<String>) -> Self {
        Self::Default { value: value.into() }
    }

    /// Create a foreign key constraint
    pub fn foreign_key(to_table: impl Into<String>, to_column: impl Into<String>) -> Self {
        Self::ForeignKey {
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }

    /// Create an unknown constraint
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::Unknown { name: name.into() }
    }

    /// Human-readable label used in diagram annotations
    pub fn label(&self) -> String {
        match self {
            Self::PrimaryKey => "Primary Key".to_string(),
            Self::ForeignKey { to_table, to_column } => {
                format!("Foreign Key to {}.{}", to_table, to_column)
            }
            Self::Unique => "Unique".to_string(),
            Self::NotNull => "Not Null".to_string(),
            Self::Default { value } => format!("Default: {}", value),
            Self::Unknown { name } => name.clone(),
        }
    }
}

/// Short tag form, as printed in the schema listing
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKey => write!(f, "PK"),
            Self::ForeignKey { to_table, to_column } => write!(f, "FK->{}.{}", to_table, to_column),
            Self::Unique => write!(f, "UNIQUE"),
            Self::NotNull => write!(f, "NOT NULL"),
            Self::Default { value } => write!(f, "DEFAULT({})", value),
            Self::Unknown { name } => write!(f, "{}", name),
        }
    }
}

/// A column in a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Declared type name as reported by the source
    pub data_type: String,

    /// Constraints in discovery order
    pub constraints: Vec<Constraint>,
}

impl Column {
    /// Create a new column with no constraints
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            constraints: Vec::new(),
        }
    }

    /// Set constraints
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Append a single constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn has_constraint(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }
}

/// A table with its columns in ordinal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within a schema
    pub name: String,

    /// Ordered list of columns
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Create a table from columns
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a column by name, mutably
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A foreign key relationship between two columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyRef<'a> {
    pub from_table: &'a str,
    pub from_column: &'a str,
    pub to_table: &'a str,
    pub to_column: &'a str,
}

/// An ordered collection of tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Tables in first-discovery order
    pub tables: Vec<Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from tables
    pub fn from_tables(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    /// Find a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Get table names
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Every foreign key, walking tables then columns in schema order
    ///
    /// Duplicates and dangling targets are yielded as-is.
    pub fn foreign_keys(&self) -> impl Iterator<Item = ForeignKeyRef<'_>> {
        self.tables.iter().flat_map(|table| {
            table.columns.iter().flat_map(move |column| {
                column.constraints.iter().filter_map(move |constraint| match constraint {
                    Constraint::ForeignKey { to_table, to_column } => Some(ForeignKeyRef {
                        from_table: &table.name,
                        from_column: &column.name,
                        to_table,
                        to_column,
                    }),
                    Constraint::NotNull
                    | Constraint::Default { .. }
                    | Constraint::PrimaryKey
                    | Constraint::Unique
                    | Constraint::Unknown { .. } => None,
                })
            })
        })
    }

    /// Serialize to a pretty JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
