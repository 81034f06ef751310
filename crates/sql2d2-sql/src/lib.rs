//! Static DDL parsing
//!
//! This crate handles:
//! - Parsing migration SQL with sqlparser
//! - Building a schema from CREATE TABLE and ALTER TABLE statements

pub mod ddl;
pub mod parser;

pub use ddl::{DdlError, DdlSchema, DdlSchemaBuilder};
pub use parser::{ParseError, ParsedSql, SqlParser};
