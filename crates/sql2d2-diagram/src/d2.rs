//! D2 rendering
//!
//! Every table becomes an `sql_table` shape with one field per column.
//! Constraints are attached as a `constraint` attribute, and each foreign key
//! becomes a `from.column -> to.column` connection after all shapes.

use crate::builder::DiagramBuilder;
use sql2d2_core::{Column, Constraint, Schema, Table};
use std::fmt::Write;

/// Renders schemas as D2 source
#[derive(Debug, Clone, Copy, Default)]
pub struct D2DiagramBuilder;

impl D2DiagramBuilder {
    pub fn new() -> Self {
        Self
    }

    fn write_table(out: &mut String, table: &Table) {
        let _ = writeln!(out, "{}: {{", table.name);
        out.push_str("\tshape: sql_table\n");
        for column in &table.columns {
            Self::write_column(out, column);
        }
        out.push_str("}\n");
    }

    fn write_column(out: &mut String, column: &Column) {
        if column.constraints.is_empty() {
            let _ = writeln!(out, "\t{}: {}", column.name, column.data_type);
        } else {
            let _ = writeln!(
                out,
                "\t{}: {} {}",
                column.name,
                column.data_type,
                constraint_attribute(&column.constraints)
            );
        }
    }
}

/// `{ constraint: [a; b] }`
fn constraint_attribute(constraints: &[Constraint]) -> String {
    let labels: Vec<String> = constraints.iter().map(Constraint::label).collect();
    format!("{{ constraint: [{}] }}", labels.join("; "))
}

impl DiagramBuilder for D2DiagramBuilder {
    fn tool_name(&self) -> &'static str {
        "d2"
    }

    fn build_diagram(&self, schema: &Schema) -> String {
        let mut out = String::new();

        for table in &schema.tables {
            Self::write_table(&mut out, table);
        }

        for fk in schema.foreign_keys() {
            let _ = writeln!(
                out,
                "{}.{} -> {}.{}",
                fk.from_table, fk.from_column, fk.to_table, fk.to_column
            );
        }

        tracing::debug!(tables = schema.tables.len(), bytes = out.len(), "Rendered D2 diagram");
        out
    }
}
