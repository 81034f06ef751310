//! Schema construction from DDL statements
//!
//! Walks parsed `CREATE TABLE` and `ALTER TABLE` statements and records the
//! same [`Schema`] model that live introspection produces:
//!
//! - Column options keep their declaration order.
//! - `REFERENCES t` without a column list points at `t.id`.
//! - Table-level `PRIMARY KEY`, `UNIQUE` and `FOREIGN KEY` constraints are
//!   appended to the named columns, pairing foreign key columns positionally.
//! - `ALTER TABLE` on a table that was never created creates it empty.
//!
//! Anything else is skipped and noted as a diagnostic.

use crate::parser::{ParseError, SqlParser};
use indexmap::IndexMap;
use sql2d2_core::{Column, Constraint, Diagnostic, DiagnosticCode, DialectConfig, Schema, Table};
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, CreateTable, Ident, ObjectName, Statement,
    TableConstraint,
};
use thiserror::Error;

/// Referenced column assumed when `REFERENCES` names only a table
pub const DEFAULT_REFERENCED_COLUMN: &str = "id";

const CHECK_LABEL: &str = "CHECK";

#[derive(Debug, Error)]
pub enum DdlError {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Schema built from DDL, plus notes about what was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct DdlSchema {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

impl DdlSchema {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

/// Builds a [`Schema`] by parsing migration SQL
#[derive(Default)]
pub struct DdlSchemaBuilder {
    parser: SqlParser,
}

impl DdlSchemaBuilder {
    pub fn new(parser: SqlParser) -> Self {
        Self { parser }
    }

    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        Self::new(SqlParser::from_dialect(dialect))
    }

    /// Parse `sql` and fold every statement into a schema
    pub fn build(&self, sql: &str) -> Result<DdlSchema, DdlError> {
        let parsed = self.parser.parse(sql)?;
        tracing::info!("Building schema from {} statements", parsed.statement_count());

        let mut state = SchemaState::default();
        for (index, statement) in parsed.statements.iter().enumerate() {
            state.apply(index, statement);
        }
        Ok(state.finish())
    }
}

#[derive(Default)]
struct SchemaState {
    tables: IndexMap<String, Table>,
    diagnostics: Vec<Diagnostic>,
}

impl SchemaState {
    fn apply(&mut self, index: usize, statement: &Statement) {
        match statement {
            Statement::CreateTable(create) => self.create_table(index, create),
            Statement::AlterTable { name, operations, .. } => {
                self.alter_table(index, name, operations)
            }
            other => {
                let kind = statement_kind(other);
                tracing::debug!(statement = index, "Ignoring {} statement", kind);
                self.ignore(index, format!("{} statement ignored", kind));
            }
        }
    }

    fn create_table(&mut self, index: usize, create: &CreateTable) {
        let name = table_name(&create.name);
        if self.tables.contains_key(&name) {
            tracing::debug!(table = %name, "Table already defined");
            self.ignore(index, format!("CREATE TABLE {}: table already defined", name));
            return;
        }

        tracing::debug!(table = %name, columns = create.columns.len(), "CREATE TABLE");
        let columns = create.columns.iter().map(column_from_def).collect();
        self.tables.insert(name.clone(), Table::from_columns(name.clone(), columns));

        for constraint in &create.constraints {
            self.apply_table_constraint(index, &name, constraint);
        }
    }

    fn alter_table(&mut self, index: usize, name: &ObjectName, operations: &[AlterTableOperation]) {
        let name = table_name(name);
        self.table_mut(&name);

        for operation in operations {
            match operation {
                AlterTableOperation::AddConstraint(constraint) => {
                    self.apply_table_constraint(index, &name, constraint)
                }
                AlterTableOperation::AddColumn { column_def, .. } => {
                    tracing::debug!(table = %name, column = %column_def.name.value, "ADD COLUMN");
                    self.table_mut(&name).columns.push(column_from_def(column_def));
                }
                other => {
                    tracing::debug!(table = %name, "Ignoring ALTER TABLE operation: {}", other);
                    self.ignore(index, format!("ALTER TABLE {}: '{}' ignored", name, other));
                }
            }
        }
    }

    fn apply_table_constraint(&mut self, index: usize, table: &str, constraint: &TableConstraint) {
        match constraint {
            TableConstraint::PrimaryKey { columns, .. } => {
                for column in columns {
                    self.add_constraint(index, table, &column.value, Constraint::PrimaryKey);
                }
            }
            TableConstraint::Unique { columns, .. } => {
                for column in columns {
                    self.add_constraint(index, table, &column.value, Constraint::Unique);
                }
            }
            TableConstraint::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                ..
            } => {
                let to_table = table_name(foreign_table);
                for (position, column) in columns.iter().enumerate() {
                    let to_column = referred_column(referred_columns, position);
                    self.add_constraint(
                        index,
                        table,
                        &column.value,
                        Constraint::foreign_key(to_table.clone(), to_column),
                    );
                }
            }
            other => {
                tracing::debug!(table = %table, "Ignoring table constraint: {}", other);
                self.ignore(index, format!("{}: constraint '{}' ignored", table, other));
            }
        }
    }

    fn add_constraint(&mut self, index: usize, table: &str, column: &str, constraint: Constraint) {
        match self.table_mut(table).column_mut(column) {
            Some(target) => target.constraints.push(constraint),
            None => {
                tracing::warn!(table = %table, column = %column, "Constraint names an unknown column");
                self.diagnostics.push(
                    Diagnostic::warn(
                        DiagnosticCode::DdlUnresolvedColumn,
                        format!("{}.{}: column not defined, '{}' dropped", table, column, constraint),
                    )
                    .at_index(index),
                );
            }
        }
    }

    /// The named table, created empty if it has not been seen yet
    fn table_mut(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(table = %name, "Creating table on demand");
            Table::new(name)
        })
    }

    fn ignore(&mut self, index: usize, message: String) {
        self.diagnostics
            .push(Diagnostic::info(DiagnosticCode::DdlStatementIgnored, message).at_index(index));
    }

    fn finish(self) -> DdlSchema {
        DdlSchema {
            schema: Schema::from_tables(self.tables.into_values().collect()),
            diagnostics: self.diagnostics,
        }
    }
}

/// Unqualified table name
fn table_name(name: &ObjectName) -> String {
    name.0.last().map(|ident| ident.value.clone()).unwrap_or_default()
}

fn referred_column(referred: &[Ident], position: usize) -> String {
    referred
        .get(position)
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| DEFAULT_REFERENCED_COLUMN.to_string())
}

fn column_from_def(def: &ColumnDef) -> Column {
    let constraints = def
        .options
        .iter()
        .filter_map(|option| column_constraint(&option.option))
        .collect();

    Column::new(def.name.value.clone(), def.data_type.to_string().to_lowercase())
        .with_constraints(constraints)
}

fn column_constraint(option: &ColumnOption) -> Option<Constraint> {
    match option {
        ColumnOption::NotNull => Some(Constraint::NotNull),
        ColumnOption::Default(expr) => Some(Constraint::default_value(expr.to_string())),
        ColumnOption::Unique { is_primary: true, .. } => Some(Constraint::PrimaryKey),
        ColumnOption::Unique { is_primary: false, .. } => Some(Constraint::Unique),
        ColumnOption::ForeignKey {
            foreign_table,
            referred_columns,
            ..
        } => Some(Constraint::foreign_key(
            table_name(foreign_table),
            referred_column(referred_columns, 0),
        )),
        ColumnOption::Check(_) => Some(Constraint::unknown(CHECK_LABEL)),
        _ => None,
    }
}

/// Leading keywords of a statement, for diagnostics
fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}
