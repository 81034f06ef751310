//! sql2d2 engine
//!
//! Wires the pieces into a single run:
//! - Load migration SQL
//! - Obtain a schema, live from a sandbox or by parsing DDL
//! - Render and save the diagram

pub mod pipeline;

pub use pipeline::{diagram_builder, Pipeline, PipelineError, PipelineOutput};
