//! Disposable database sandboxes
//!
//! A sandbox provisions an isolated database engine, applies migration SQL to
//! it, answers ad-hoc queries, and tears everything down again. The
//! extraction code only talks to the [`Sandbox`] trait, so it works against
//! any engine binding.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sql2d2_sandbox::{PostgresSandbox, SandboxSession};
//!
//! let sandbox = PostgresSandbox::new(config.sandbox.clone());
//! let mut session = SandboxSession::start(sandbox, &migration_sql).await?;
//! let rows = session.execute("SELECT 1").await?;
//! session.end().await?;
//! ```

pub mod lease;
pub mod mock;
pub mod postgres;
pub mod sandbox;
pub mod session;

pub use lease::AddressLease;
pub use mock::MockSandbox;
pub use postgres::PostgresSandbox;
pub use sandbox::{ensure_init_sql, Row, Sandbox, SandboxError, SqlValue};
pub use session::SandboxSession;
