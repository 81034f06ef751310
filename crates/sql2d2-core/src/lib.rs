//! sql2d2 core
//!
//! Relational schema model shared by every stage of the pipeline, plus the
//! configuration file, migration source loading and run diagnostics.

pub mod config;
pub mod diagnostic;
pub mod migration;
pub mod schema;

pub use config::{Config, ConfigError, DiagramTool, DialectConfig, ExtractionMode, SandboxConfig};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use migration::{MigrationBuilder, MigrationError};
pub use schema::{Column, Constraint, ForeignKeyRef, Schema, Table};
