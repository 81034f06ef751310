//! Building schemas from complete migrations

use pretty_assertions::assert_eq;
use sql2d2_core::{Constraint, DialectConfig};
use sql2d2_sql::DdlSchemaBuilder;

const MIGRATION: &str = r#"
CREATE TABLE users (
    id SERIAL PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMP DEFAULT now()
);

CREATE TABLE orders (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    total NUMERIC(10, 2)
);

CREATE TABLE order_items (
    order_id INTEGER,
    sku TEXT,
    PRIMARY KEY (order_id, sku)
);

ALTER TABLE order_items
    ADD CONSTRAINT fk_order FOREIGN KEY (order_id) REFERENCES orders (id);
"#;

fn edges(sql: &str, dialect: DialectConfig) -> Vec<String> {
    let result = DdlSchemaBuilder::from_dialect(&dialect).build(sql).unwrap();
    result
        .schema
        .foreign_keys()
        .map(|fk| format!("{}.{} -> {}.{}", fk.from_table, fk.from_column, fk.to_table, fk.to_column))
        .collect()
}

#[test]
fn test_migration_builds_tables_in_creation_order() {
    let result = DdlSchemaBuilder::from_dialect(&DialectConfig::Postgres)
        .build(MIGRATION)
        .unwrap();

    assert_eq!(result.schema.table_names(), vec!["users", "orders", "order_items"]);

    let users = result.schema.table("users").unwrap();
    assert_eq!(users.column("email").unwrap().data_type, "varchar(255)");
    assert_eq!(
        users.column("email").unwrap().constraints,
        vec![Constraint::NotNull, Constraint::Unique]
    );
    assert_eq!(
        users.column("created_at").unwrap().constraints,
        vec![Constraint::default_value("now()")]
    );

    let items = result.schema.table("order_items").unwrap();
    assert_eq!(
        items.column("order_id").unwrap().constraints,
        vec![Constraint::PrimaryKey, Constraint::foreign_key("orders", "id")]
    );

    assert_eq!(result.warnings().count(), 0);
}

#[test]
fn test_migration_foreign_keys() {
    assert_eq!(
        edges(MIGRATION, DialectConfig::Postgres),
        vec!["orders.user_id -> users.id", "order_items.order_id -> orders.id"]
    );
}

#[test]
fn test_generic_dialect_matches_postgres_for_portable_ddl() {
    let sql = "CREATE TABLE a (id INTEGER PRIMARY KEY);
               CREATE TABLE b (a_id INTEGER REFERENCES a (id));";

    assert_eq!(edges(sql, DialectConfig::Generic), edges(sql, DialectConfig::Postgres));
}

#[test]
fn test_dangling_reference_is_kept() {
    assert_eq!(
        edges("CREATE TABLE b (a_id INTEGER REFERENCES missing (id));", DialectConfig::Postgres),
        vec!["b.a_id -> missing.id"]
    );
}
