//! Single-shot schema to diagram pipeline
//!
//! Live mode:
//!
//! ```text
//! migration SQL -> sandbox.start -> introspection query -> resolve
//!               -> render -> save -> sandbox.end
//! ```
//!
//! AST mode parses the SQL instead and never starts a sandbox. Errors before
//! the save abort the run without writing, and a started sandbox is always
//! ended.

use sql2d2_core::{
    Config, ConfigError, Diagnostic, DiagramTool, ExtractionMode, MigrationBuilder, MigrationError,
    Schema,
};
use sql2d2_diagram::{D2DiagramBuilder, DiagramBuilder, PersistError};
use sql2d2_introspect::{ExtractError, PostgresExtractor};
use sql2d2_sandbox::{PostgresSandbox, Sandbox, SandboxError, SandboxSession};
use sql2d2_sql::{DdlError, DdlSchemaBuilder};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Ddl(#[from] DdlError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub schema: Schema,

    /// Rows or statements that were skipped along the way
    pub diagnostics: Vec<Diagnostic>,

    /// Rendered diagram source, as written
    pub diagram: String,

    /// Where the diagram was written
    pub output: PathBuf,
}

impl PipelineOutput {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

/// Diagram builder for a configured tool
pub fn diagram_builder(tool: DiagramTool) -> Box<dyn DiagramBuilder> {
    match tool {
        DiagramTool::D2 => Box::new(D2DiagramBuilder::new()),
    }
}

pub struct Pipeline {
    config: Config,
    builder: Box<dyn DiagramBuilder>,
}

impl Pipeline {
    /// Create a pipeline; the configuration is validated first
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let builder = diagram_builder(config.diagram_tool);
        Ok(Self { config, builder })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the migration and run in the configured mode
    ///
    /// Whitespace-only SQL is rejected before either mode starts, so an
    /// existing diagram is never replaced by an empty one.
    pub async fn run(&self, migration: &MigrationBuilder) -> Result<PipelineOutput, PipelineError> {
        let sql = migration.get_sql()?;
        if sql.trim().is_empty() {
            return Err(MigrationError::Empty.into());
        }

        match self.config.mode {
            ExtractionMode::Live => {
                let sandbox = PostgresSandbox::new(self.config.sandbox.clone());
                self.run_live(sandbox, &sql).await
            }
            ExtractionMode::Ast => self.run_ast(&sql),
        }
    }

    /// Apply `sql` to `sandbox`, introspect it, render and save, then end
    /// the sandbox
    ///
    /// The sandbox is ended whether or not the earlier steps succeeded. Their
    /// failure takes precedence over a release failure; a release failure
    /// after a successful save is still reported, with the diagram in place.
    pub async fn run_live<S: Sandbox>(&self, sandbox: S, sql: &str) -> Result<PipelineOutput, PipelineError> {
        let mut session = SandboxSession::start(sandbox, sql).await?;

        let extractor = PostgresExtractor::new(self.config.schema.clone());
        let rendered = match extractor.extract(session.sandbox_mut()).await {
            Ok(resolution) => self.render(resolution.schema, resolution.diagnostics),
            Err(e) => Err(e.into()),
        };
        let ended = session.end().await;

        let output = rendered?;
        ended?;
        Ok(output)
    }

    /// Parse `sql` as DDL, then render
    pub fn run_ast(&self, sql: &str) -> Result<PipelineOutput, PipelineError> {
        let built = DdlSchemaBuilder::from_dialect(&self.config.dialect).build(sql)?;
        self.render(built.schema, built.diagnostics)
    }

    fn render(&self, schema: Schema, diagnostics: Vec<Diagnostic>) -> Result<PipelineOutput, PipelineError> {
        for diagnostic in diagnostics.iter().filter(|d| d.is_warning()) {
            tracing::warn!("{}", diagnostic);
        }

        tracing::info!(
            tool = self.builder.tool_name(),
            tables = schema.tables.len(),
            "Rendering diagram"
        );
        let diagram = self.builder.build_diagram(&schema);

        let output = self.config.output.clone();
        self.builder.save_diagram(&diagram, &output)?;

        Ok(PipelineOutput {
            schema,
            diagnostics,
            diagram,
            output,
        })
    }
}
