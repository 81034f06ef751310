//! Sandbox trait for running SQL against a disposable database

use std::borrow::Cow;

/// An untyped scalar returned by a sandbox query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text form of the value, `None` for NULL
    ///
    /// Byte payloads are decoded lossily as UTF-8.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(Cow::Borrowed(s)),
            Self::Int(i) => Some(Cow::Owned(i.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Bool(b) => Some(Cow::Owned(b.to_string())),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// One result row, in select-list order
pub type Row = Vec<SqlValue>;

/// Errors raised by sandbox operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SandboxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start sandbox: {0}")]
    Start(String),

    #[error("Address {0} is already claimed by another sandbox session")]
    AddressInUse(String),

    #[error("Sandbox has not been started")]
    NotStarted,

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to release sandbox: {0}")]
    Release(String),
}

impl SandboxError {
    /// Whether the error happened while provisioning (the run cannot continue)
    pub fn is_start_failure(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Start(_) | Self::AddressInUse(_))
    }
}

/// Reject empty initialization SQL
pub fn ensure_init_sql(init_sql: &str) -> Result<(), SandboxError> {
    if init_sql.trim().is_empty() {
        return Err(SandboxError::Config(
            "migration SQL is empty; nothing to apply".to_string(),
        ));
    }
    Ok(())
}

/// A disposable database engine instance
///
/// Implementations own every resource they start and must release them on
/// drop as well as on `end`, so an abandoned sandbox never leaks a running
/// engine.
#[async_trait::async_trait]
pub trait Sandbox: Send {
    /// Get the sandbox name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Provision a fresh instance and apply `init_sql` to it
    ///
    /// On failure nothing is left running.
    async fn start(&mut self, init_sql: &str) -> Result<(), SandboxError>;

    /// Run an ad-hoc query against the started instance
    ///
    /// A failed query leaves the instance usable.
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, SandboxError>;

    /// Release the connection, instance and storage
    ///
    /// Calling `end` on a sandbox that is not running is a no-op.
    async fn end(&mut self) -> Result<(), SandboxError>;

    /// Whether an instance is currently running
    fn is_running(&self) -> bool;
}

#[async_trait::async_trait]
impl<T: Sandbox + ?Sized> Sandbox for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn start(&mut self, init_sql: &str) -> Result<(), SandboxError> {
        (**self).start(init_sql).await
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, SandboxError> {
        (**self).execute(sql).await
    }

    async fn end(&mut self) -> Result<(), SandboxError> {
        (**self).end().await
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}
