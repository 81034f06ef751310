//! SQL parsing using sqlparser
//!
//! Parses migration SQL into statements with a configurable dialect.

use sql2d2_core::DialectConfig;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the generic dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Generic => Self::new(),
        }
    }

    /// Parse SQL string into statements
    pub fn parse(&self, sql: &str) -> Result<ParsedSql, ParseError> {
        let statements = Parser::parse_sql(&*self.dialect, sql).map_err(|error| ParseError { error })?;
        tracing::debug!("Parsed {} statements", statements.len());
        Ok(ParsedSql { statements })
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Parsed statements, in source order
    pub statements: Vec<Statement>,
}

impl ParsedSql {
    /// Count the number of statements
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// SQL parsing error
#[derive(Debug, thiserror::Error)]
#[error("SQL parse error: {error}")]
pub struct ParseError {
    /// Parser error from sqlparser
    #[source]
    pub error: ParserError,
}

impl ParseError {
    /// Check if this is an unsupported syntax error
    pub fn is_unsupported_syntax(&self) -> bool {
        let error_msg = self.error.to_string().to_lowercase();
        error_msg.contains("expected") || error_msg.contains("unexpected")
    }
}
