//! PostgreSQL sandbox backed by a disposable container
//!
//! Each session starts a fresh `postgres` container with its port published
//! on the configured host port, connects with tokio-postgres, and applies
//! the migration SQL before returning. Queries use the simple-query protocol,
//! so every value comes back as text or NULL.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut sandbox = PostgresSandbox::new(SandboxConfig::default());
//! sandbox.start("CREATE TABLE users (id serial PRIMARY KEY);").await?;
//! let rows = sandbox.execute("SELECT table_name FROM information_schema.tables").await?;
//! sandbox.end().await?;
//! ```
//!
//! Requires a running Docker daemon.

use crate::lease::AddressLease;
use crate::sandbox::{ensure_init_sql, Row, Sandbox, SandboxError, SqlValue};
use sql2d2_core::SandboxConfig;
use std::time::Duration;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::core::IntoContainerPort;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::{ContainerAsync, ImageExt};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, SimpleQueryRow};

/// Port PostgreSQL listens on inside the container
const CONTAINER_PORT: u16 = 5432;

const CONNECT_ATTEMPTS: u32 = 10;

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Resources held while the sandbox is running
///
/// Field order is drop order: connection, then container, then the address.
struct Running {
    client: Client,
    container: ContainerAsync<Postgres>,
    lease: AddressLease,
}

/// PostgreSQL sandbox
pub struct PostgresSandbox {
    config: SandboxConfig,
    running: Option<Running>,
}

impl PostgresSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Connection string for a server published on `host:port`
    fn connection_string(&self, host: &str, port: u16) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            host, port, self.config.user, self.config.password, self.config.database
        )
    }

    /// Connect, retrying while the server finishes booting
    async fn connect(conn_str: &str) -> Result<Client, SandboxError> {
        let mut attempts = 0;
        let (client, connection) = loop {
            attempts += 1;
            match tokio_postgres::connect(conn_str, NoTls).await {
                Ok(result) => break result,
                Err(e) if attempts < CONNECT_ATTEMPTS => {
                    tracing::debug!("Connection attempt {} failed: {}, retrying...", attempts, e);
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(SandboxError::Start(format!(
                        "failed to connect after {} attempts: {}",
                        attempts, e
                    )))
                }
            }
        };

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL sandbox connection error: {}", e);
            }
        });

        Ok(client)
    }

    /// Bring up the container and apply `init_sql`
    ///
    /// Anything acquired here is dropped, and so released, if a later step
    /// fails.
    async fn provision(&self, init_sql: &str) -> Result<Running, SandboxError> {
        let lease = AddressLease::claim(self.config.address())?;

        tracing::info!(address = %lease.address(), tag = %self.config.image_tag, "Starting PostgreSQL container");
        let container = Postgres::default()
            .with_user(&self.config.user)
            .with_password(&self.config.password)
            .with_db_name(&self.config.database)
            .with_tag(self.config.image_tag.clone())
            .with_mapped_port(self.config.port, CONTAINER_PORT.tcp())
            .start()
            .await
            .map_err(|e| SandboxError::Start(format!("failed to start PostgreSQL container: {}", e)))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| SandboxError::Start(format!("failed to resolve container host: {}", e)))?
            .to_string();
        let port = container
            .get_host_port_ipv4(CONTAINER_PORT.tcp())
            .await
            .map_err(|e| SandboxError::Start(format!("failed to resolve container port: {}", e)))?;

        tracing::info!("Connecting to PostgreSQL at {}:{}", host, port);
        let client = Self::connect(&self.connection_string(&host, port)).await?;

        tracing::info!("Running migrations");
        client
            .batch_execute(init_sql)
            .await
            .map_err(|e| SandboxError::Start(format!("failed to apply migrations: {}", e)))?;

        Ok(Running {
            client,
            container,
            lease,
        })
    }
}

fn row_values(row: &SimpleQueryRow) -> Row {
    (0..row.len())
        .map(|i| match row.get(i) {
            Some(text) => SqlValue::Text(text.to_string()),
            None => SqlValue::Null,
        })
        .collect()
}

#[async_trait::async_trait]
impl Sandbox for PostgresSandbox {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn start(&mut self, init_sql: &str) -> Result<(), SandboxError> {
        ensure_init_sql(init_sql)?;
        if self.running.is_some() {
            return Err(SandboxError::Start("sandbox is already running".to_string()));
        }

        self.running = Some(self.provision(init_sql).await?);
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, SandboxError> {
        let running = self.running.as_ref().ok_or(SandboxError::NotStarted)?;

        tracing::debug!("Executing query ({} bytes)", sql.len());
        let messages = running
            .client
            .simple_query(sql)
            .await
            .map_err(|e| SandboxError::Query(e.to_string()))?;

        let rows: Vec<Row> = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(row_values(row)),
                _ => None,
            })
            .collect();

        tracing::debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }

    async fn end(&mut self) -> Result<(), SandboxError> {
        let Some(Running {
            client,
            container,
            lease,
        }) = self.running.take()
        else {
            return Ok(());
        };

        tracing::info!(address = %lease.address(), "Stopping PostgreSQL container");
        drop(client);
        let removed = container
            .rm()
            .await
            .map_err(|e| SandboxError::Release(e.to_string()));
        drop(lease);
        removed
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}
