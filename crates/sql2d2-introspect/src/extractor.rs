//! Introspection query for PostgreSQL catalogs

use crate::resolver::{ConstraintResolver, Resolution};
use sql2d2_core::config::DEFAULT_SCHEMA;
use sql2d2_sandbox::{Row, Sandbox, SandboxError};
use thiserror::Error;

/// Errors raised while extracting a schema
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Introspection query failed: {0}")]
    Query(#[source] SandboxError),
}

/// Reads one schema's columns and constraint markers from a running sandbox
///
/// Each returned row carries, in order: schema, table, column, declared type,
/// `is_nullable`, default expression and an aggregated array of markers
/// (`PK`, `FK->table.column`, `UNIQUE`, `CHECK`).
#[derive(Debug, Clone)]
pub struct PostgresExtractor {
    schema: String,
}

impl Default for PostgresExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl PostgresExtractor {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The introspection query for the configured schema
    pub fn introspection_query(&self) -> String {
        format!(
            r#"
SELECT
    c.table_schema,
    c.table_name,
    c.column_name,
    c.data_type,
    c.is_nullable,
    c.column_default,
    ARRAY_AGG(
        CASE
            WHEN tc.constraint_type = 'PRIMARY KEY' THEN 'PK'
            WHEN tc.constraint_type = 'FOREIGN KEY' THEN
                'FK->' || ccu.table_name || '.' || ccu.column_name
            WHEN tc.constraint_type = 'UNIQUE' THEN 'UNIQUE'
            WHEN tc.constraint_type = 'CHECK' THEN 'CHECK'
        END
    ) FILTER (WHERE tc.constraint_type IS NOT NULL) AS constraints
FROM information_schema.columns c
LEFT JOIN information_schema.key_column_usage kcu
    ON c.table_schema = kcu.table_schema
    AND c.table_name = kcu.table_name
    AND c.column_name = kcu.column_name
LEFT JOIN information_schema.table_constraints tc
    ON kcu.constraint_name = tc.constraint_name
    AND kcu.table_schema = tc.table_schema
LEFT JOIN information_schema.constraint_column_usage ccu
    ON tc.constraint_name = ccu.constraint_name
    AND tc.table_schema = ccu.table_schema
    AND tc.constraint_type = 'FOREIGN KEY'
WHERE c.table_schema = {}
GROUP BY c.table_schema, c.table_name, c.column_name, c.data_type,
         c.is_nullable, c.column_default, c.ordinal_position
ORDER BY c.table_schema, c.table_name, c.ordinal_position;
"#,
            quote_literal(&self.schema)
        )
    }

    /// Run the introspection query and return the raw rows
    pub async fn query(&self, sandbox: &mut dyn Sandbox) -> Result<Vec<Row>, ExtractError> {
        tracing::info!(schema = %self.schema, sandbox = sandbox.name(), "Querying schema catalogs");
        let rows = sandbox
            .execute(&self.introspection_query())
            .await
            .map_err(ExtractError::Query)?;
        tracing::debug!("Introspection returned {} rows", rows.len());
        Ok(rows)
    }

    /// Query and resolve in one step
    pub async fn extract(&self, sandbox: &mut dyn Sandbox) -> Result<Resolution, ExtractError> {
        let rows = self.query(sandbox).await?;
        Ok(ConstraintResolver::resolve(&rows))
    }
}

/// Render `value` as a single-quoted SQL string literal
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql2d2_sandbox::MockSandbox;

    #[test]
    fn test_query_filters_on_quoted_schema() {
        let query = PostgresExtractor::default().introspection_query();
        assert!(query.contains("WHERE c.table_schema = 'public'"));
        assert!(query.contains("FILTER (WHERE tc.constraint_type IS NOT NULL)"));
        assert!(query.contains("ORDER BY c.table_schema, c.table_name, c.ordinal_position"));
    }

    #[test]
    fn test_schema_name_is_escaped() {
        let query = PostgresExtractor::new("o'brien").introspection_query();
        assert!(query.contains("WHERE c.table_schema = 'o''brien'"));
    }

    #[tokio::test]
    async fn test_query_failure_is_wrapped() {
        let mut sandbox = MockSandbox::new().with_query_failure("relation does not exist");
        sandbox.start("CREATE TABLE t (id int);").await.unwrap();

        let err = PostgresExtractor::default().query(&mut sandbox).await.unwrap_err();
        assert!(matches!(err, ExtractError::Query(SandboxError::Query(_))));
        assert!(sandbox.is_running());
    }
}
