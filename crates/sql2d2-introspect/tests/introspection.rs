//! Extractor and resolver running together against a mock sandbox

use pretty_assertions::assert_eq;
use sql2d2_core::{Constraint, DiagnosticCode};
use sql2d2_introspect::PostgresExtractor;
use sql2d2_sandbox::{MockSandbox, Row, Sandbox, SqlValue};

fn row(fields: [Option<&str>; 7]) -> Row {
    fields.into_iter().map(SqlValue::from).collect()
}

fn catalog_rows() -> Vec<Row> {
    vec![
        row([Some("public"), Some("users"), Some("id"), Some("integer"), Some("NO"), Some("nextval('users_id_seq'::regclass)"), Some("{PK}")]),
        row([Some("public"), Some("users"), Some("email"), Some("text"), Some("NO"), None, Some("{UNIQUE}")]),
        row([Some("public"), Some("orders"), Some("id"), Some("integer"), Some("NO"), None, Some("{PK}")]),
        row([Some("public"), Some("orders"), Some("user_id"), Some("integer"), Some("YES"), None, Some("{FK->users.id}")]),
        row([Some("public"), Some("orders"), Some("note"), Some("text"), Some("YES"), None, None]),
    ]
}

#[tokio::test]
async fn test_extract_builds_schema_from_catalog_rows() {
    let mut sandbox = MockSandbox::new().with_response("information_schema.columns", catalog_rows());
    sandbox.start("CREATE TABLE users (id serial);").await.unwrap();

    let resolution = PostgresExtractor::default().extract(&mut sandbox).await.unwrap();
    let schema = resolution.schema;

    assert_eq!(schema.table_names(), vec!["users", "orders"]);
    assert_eq!(
        schema.table("users").unwrap().column("id").unwrap().constraints,
        vec![
            Constraint::NotNull,
            Constraint::default_value("nextval('users_id_seq'::regclass)"),
            Constraint::PrimaryKey,
        ]
    );
    assert!(schema.table("orders").unwrap().column("note").unwrap().constraints.is_empty());

    let edges: Vec<_> = schema
        .foreign_keys()
        .map(|fk| format!("{}.{} -> {}.{}", fk.from_table, fk.from_column, fk.to_table, fk.to_column))
        .collect();
    assert_eq!(edges, vec!["orders.user_id -> users.id"]);

    assert!(resolution.diagnostics.is_empty());
    assert_eq!(sandbox.executed().len(), 1);
}

#[tokio::test]
async fn test_extract_reports_malformed_rows() {
    let mut rows = catalog_rows();
    rows.insert(1, vec![SqlValue::from("public"), SqlValue::from("users")]);

    let mut sandbox = MockSandbox::new().with_rows(rows);
    sandbox.start("SELECT 1;").await.unwrap();

    let resolution = PostgresExtractor::new("public").extract(&mut sandbox).await.unwrap();

    assert_eq!(resolution.schema.table("users").unwrap().column_names(), vec!["id", "email"]);
    let codes: Vec<_> = resolution.warnings().map(|d| (d.code, d.index)).collect();
    assert_eq!(codes, vec![(DiagnosticCode::IntrospectionRowSkipped, Some(1))]);
}
