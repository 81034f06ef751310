//! Integration tests for the PostgreSQL sandbox
//!
//! These start a real container and are marked `#[ignore]`. Run them with a
//! Docker daemon available:
//!
//! ```bash
//! cargo test -p sql2d2-sandbox --test postgres_sandbox -- --ignored
//! ```

use sql2d2_core::SandboxConfig;
use sql2d2_sandbox::{AddressLease, PostgresSandbox, Sandbox, SandboxError, SandboxSession, SqlValue};

fn config(port: u16) -> SandboxConfig {
    SandboxConfig {
        port,
        ..SandboxConfig::default()
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_sandbox_lifecycle() {
    let mut session = SandboxSession::start(
        PostgresSandbox::new(config(25_489)),
        "CREATE TABLE users (id serial PRIMARY KEY, email text NOT NULL UNIQUE);",
    )
    .await
    .unwrap();

    let rows = session
        .execute(
            "SELECT column_name, is_nullable FROM information_schema.columns \
             WHERE table_name = 'users' ORDER BY ordinal_position",
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], SqlValue::from("id"));
    assert_eq!(rows[1][1], SqlValue::from("NO"));

    // A failed query leaves the session usable
    assert!(matches!(
        session.execute("SELECT * FROM missing_table").await,
        Err(SandboxError::Query(_))
    ));
    assert!(session.execute("SELECT 1").await.is_ok());

    session.end().await.unwrap();
    assert!(!AddressLease::is_claimed("127.0.0.1:25489"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_sandbox_second_session_on_same_address_fails() {
    let mut first = PostgresSandbox::new(config(25_490));
    first.start("CREATE TABLE t (id int);").await.unwrap();

    let mut second = PostgresSandbox::new(config(25_490));
    let result = second.start("CREATE TABLE t (id int);").await;
    assert_eq!(result, Err(SandboxError::AddressInUse("127.0.0.1:25490".to_string())));

    first.end().await.unwrap();
    assert!(first.end().await.is_ok());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_sandbox_bad_migration_tears_down() {
    let mut sandbox = PostgresSandbox::new(config(25_491));
    let result = sandbox.start("CREATE TABLE broken (").await;

    assert!(matches!(result, Err(SandboxError::Start(_))));
    assert!(!sandbox.is_running());
    assert!(!AddressLease::is_claimed("127.0.0.1:25491"));
}
