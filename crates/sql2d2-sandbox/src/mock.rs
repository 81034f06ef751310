//! Mock sandbox for testing
//!
//! Returns canned rows without starting any database. Useful for:
//! - Unit testing extraction and resolution logic
//! - Exercising the pipeline's release-on-every-path behavior
//! - Simulating start, query and release failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mock = MockSandbox::new().with_rows(vec![
//!     vec!["public".into(), "users".into(), "id".into(), "integer".into(),
//!          "NO".into(), SqlValue::Null, "{PK}".into()],
//! ]);
//!
//! // Clones share state, so the test can inspect the mock after handing
//! // a clone to the pipeline.
//! run_pipeline(mock.clone(), ...).await?;
//! assert_eq!(mock.end_calls(), 1);
//! ```

use crate::lease::AddressLease;
use crate::sandbox::{ensure_init_sql, Row, Sandbox, SandboxError};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    running: bool,
    init_sql: Option<String>,
    executed: Vec<String>,
    start_calls: usize,
    end_calls: usize,
    lease: Option<AddressLease>,
}

/// Mock sandbox
///
/// # Features
///
/// - Canned rows per query fragment, with a fallback for everything else
/// - Simulated start, query and release failures
/// - Optional address claim, to exercise address exclusivity
/// - Records the init SQL, every executed query and every `end` call
#[derive(Debug, Clone)]
pub struct MockSandbox {
    state: Arc<Mutex<MockState>>,

    /// (query fragment, rows) pairs, first match wins
    responses: Vec<(String, Vec<Row>)>,

    /// Rows for queries that match no fragment
    default_rows: Vec<Row>,

    start_failure: Option<String>,

    query_failure: Option<String>,

    end_failure: Option<String>,

    address: Option<String>,

    sandbox_name: &'static str,
}

impl MockSandbox {
    /// Create a mock that returns no rows
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            responses: Vec::new(),
            default_rows: Vec::new(),
            start_failure: None,
            query_failure: None,
            end_failure: None,
            address: None,
            sandbox_name: "Mock",
        }
    }

    /// Rows returned for any query without a more specific response
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.default_rows = rows;
        self
    }

    /// Rows returned for queries containing `fragment`
    pub fn with_response(mut self, fragment: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.push((fragment.into(), rows));
        self
    }

    /// Make `start` fail with a start error
    pub fn with_start_failure(mut self, message: impl Into<String>) -> Self {
        self.start_failure = Some(message.into());
        self
    }

    /// Make every `execute` fail with a query error
    pub fn with_query_failure(mut self, message: impl Into<String>) -> Self {
        self.query_failure = Some(message.into());
        self
    }

    /// Make `end` report a release error after stopping
    pub fn with_end_failure(mut self, message: impl Into<String>) -> Self {
        self.end_failure = Some(message.into());
        self
    }

    /// Claim `address` for the duration of each session
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set a custom sandbox name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.sandbox_name = name;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// SQL passed to the last successful `start`
    pub fn init_sql(&self) -> Option<String> {
        self.state().init_sql.clone()
    }

    /// Every query passed to `execute`, in order
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.state().start_calls
    }

    pub fn end_calls(&self) -> usize {
        self.state().end_calls
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Sandbox for MockSandbox {
    fn name(&self) -> &'static str {
        self.sandbox_name
    }

    async fn start(&mut self, init_sql: &str) -> Result<(), SandboxError> {
        let mut state = self.state();
        state.start_calls += 1;

        ensure_init_sql(init_sql)?;
        if state.running {
            return Err(SandboxError::Start("sandbox is already running".to_string()));
        }

        let lease = match &self.address {
            Some(address) => Some(AddressLease::claim(address.clone())?),
            None => None,
        };

        if let Some(message) = &self.start_failure {
            // The lease is dropped here, like a real sandbox tearing down
            return Err(SandboxError::Start(message.clone()));
        }

        state.running = true;
        state.init_sql = Some(init_sql.to_string());
        state.lease = lease;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, SandboxError> {
        let mut state = self.state();
        if !state.running {
            return Err(SandboxError::NotStarted);
        }
        state.executed.push(sql.to_string());

        if let Some(message) = &self.query_failure {
            return Err(SandboxError::Query(message.clone()));
        }

        let rows = self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_else(|| self.default_rows.clone());
        Ok(rows)
    }

    async fn end(&mut self) -> Result<(), SandboxError> {
        let mut state = self.state();
        state.end_calls += 1;
        state.running = false;
        state.lease = None;
        match &self.end_failure {
            Some(message) => Err(SandboxError::Release(message.clone())),
            None => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        self.state().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SqlValue;

    #[tokio::test]
    async fn test_mock_sandbox_basic() {
        let mut mock = MockSandbox::new().with_rows(vec![vec![SqlValue::from("1")]]);

        mock.start("CREATE TABLE t (id int);").await.unwrap();
        let rows = mock.execute("SELECT 1").await.unwrap();

        assert_eq!(rows, vec![vec![SqlValue::from("1")]]);
        assert_eq!(mock.init_sql().as_deref(), Some("CREATE TABLE t (id int);"));
        assert_eq!(mock.executed(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_sandbox_responses_by_fragment() {
        let mut mock = MockSandbox::new()
            .with_response("information_schema", vec![vec![SqlValue::from("catalog")]])
            .with_rows(vec![vec![SqlValue::from("fallback")]]);

        mock.start("SELECT 1;").await.unwrap();

        let catalog = mock.execute("SELECT * FROM information_schema.columns").await.unwrap();
        let other = mock.execute("SELECT now()").await.unwrap();
        assert_eq!(catalog[0][0], SqlValue::from("catalog"));
        assert_eq!(other[0][0], SqlValue::from("fallback"));
    }

    #[tokio::test]
    async fn test_mock_sandbox_requires_start() {
        let mut mock = MockSandbox::new();
        assert_eq!(mock.execute("SELECT 1").await, Err(SandboxError::NotStarted));
    }

    #[tokio::test]
    async fn test_mock_sandbox_rejects_empty_init_sql() {
        let mut mock = MockSandbox::new();
        assert!(matches!(mock.start("").await, Err(SandboxError::Config(_))));
        assert!(!mock.is_running());
    }

    #[tokio::test]
    async fn test_mock_sandbox_end_is_idempotent() {
        let mut mock = MockSandbox::new();
        mock.start("SELECT 1;").await.unwrap();

        assert!(mock.end().await.is_ok());
        assert!(mock.end().await.is_ok());
        assert!(!mock.is_running());
        assert_eq!(mock.end_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_sandbox_end_failure_still_stops() {
        let address = "mock-test:2491";
        let mut mock = MockSandbox::new().with_address(address).with_end_failure("volume busy");
        mock.start("SELECT 1;").await.unwrap();

        assert_eq!(mock.end().await, Err(SandboxError::Release("volume busy".to_string())));
        assert!(!mock.is_running());
        assert!(!AddressLease::is_claimed(address));
    }

    #[tokio::test]
    async fn test_mock_sandbox_address_exclusivity() {
        let address = "mock-test:2489";
        let mut first = MockSandbox::new().with_address(address);
        let mut second = MockSandbox::new().with_address(address);

        first.start("SELECT 1;").await.unwrap();
        assert_eq!(
            second.start("SELECT 1;").await,
            Err(SandboxError::AddressInUse(address.to_string()))
        );

        first.end().await.unwrap();
        assert!(second.start("SELECT 1;").await.is_ok());
        second.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_sandbox_start_failure_releases_address() {
        let address = "mock-test:2490";
        let mut failing = MockSandbox::new().with_address(address).with_start_failure("boom");

        assert!(matches!(failing.start("SELECT 1;").await, Err(SandboxError::Start(_))));
        assert!(!AddressLease::is_claimed(address));
    }

    #[tokio::test]
    async fn test_mock_sandbox_clone_shares_state() {
        let mock = MockSandbox::new();
        let mut handle = mock.clone();

        handle.start("SELECT 1;").await.unwrap();
        assert!(mock.is_running());
        assert_eq!(mock.start_calls(), 1);
    }
}
