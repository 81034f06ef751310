//! Scoped sandbox sessions

use crate::sandbox::{Row, Sandbox, SandboxError};

/// A started sandbox; `end` releases it
///
/// Dropping a session without `end` only logs a warning.
///
/// ```rust,ignore
/// let mut session = SandboxSession::start(PostgresSandbox::new(config), &sql).await?;
/// let rows = session.execute("SELECT 1").await;
/// session.end().await?;
/// ```
pub struct SandboxSession<S: Sandbox> {
    sandbox: S,
    ended: bool,
}

impl<S: Sandbox> SandboxSession<S> {
    /// Start `sandbox` and apply `init_sql`
    ///
    /// If this fails the sandbox has already torn itself down.
    pub async fn start(mut sandbox: S, init_sql: &str) -> Result<Self, SandboxError> {
        tracing::info!(sandbox = sandbox.name(), "Starting sandbox");
        sandbox.start(init_sql).await?;
        Ok(Self {
            sandbox,
            ended: false,
        })
    }

    pub async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, SandboxError> {
        self.sandbox.execute(sql).await
    }

    /// Borrow the underlying sandbox for components that run their own queries
    pub fn sandbox_mut(&mut self) -> &mut S {
        &mut self.sandbox
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Release the sandbox
    pub async fn end(mut self) -> Result<(), SandboxError> {
        self.ended = true;
        tracing::info!(sandbox = self.sandbox.name(), "Ending sandbox");
        self.sandbox.end().await
    }
}

impl<S: Sandbox> Drop for SandboxSession<S> {
    fn drop(&mut self) {
        if !self.ended && self.sandbox.is_running() {
            tracing::warn!(
                sandbox = self.sandbox.name(),
                "Sandbox session dropped without end; cleanup is left to the sandbox's own drop"
            );
        }
    }
}
