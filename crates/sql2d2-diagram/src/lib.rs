//! Diagram synthesis
//!
//! Renders a [`sql2d2_core::Schema`] as diagram source text and writes it to
//! disk. D2 is the only supported target.

pub mod builder;
pub mod d2;

pub use builder::{write_atomically, DiagramBuilder, PersistError};
pub use d2::D2DiagramBuilder;
