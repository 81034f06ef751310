//! Live schema introspection
//!
//! [`PostgresExtractor`] asks a running sandbox for every column of one schema
//! together with a compact summary of its constraints, and
//! [`ConstraintResolver`] turns those rows into a [`sql2d2_core::Schema`].

pub mod extractor;
pub mod resolver;

pub use extractor::{ExtractError, PostgresExtractor};
pub use resolver::{decode_tag, decode_tags, ConstraintResolver, Resolution, REQUIRED_FIELDS};
