//! Diagram builder trait and persistence

use sql2d2_core::Schema;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while saving a diagram
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move diagram into place at {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateDir { path, .. } | Self::Write { path, .. } | Self::Rename { path, .. } => path,
        }
    }
}

/// Renders a schema into diagram source
pub trait DiagramBuilder {
    /// Name of the diagram language, e.g. `d2`
    fn tool_name(&self) -> &'static str;

    /// Render `schema`; never fails
    fn build_diagram(&self, schema: &Schema) -> String;

    /// Write `diagram` to `path`, replacing any existing file
    fn save_diagram(&self, diagram: &str, path: &Path) -> Result<(), PersistError> {
        write_atomically(diagram, path)
    }
}

/// Write `contents` to a sibling temporary file and rename it over `path`
///
/// Missing parent directories are created. A failed write leaves any
/// previous file at `path` untouched.
pub fn write_atomically(contents: &str, path: &Path) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&dir).map_err(|source| PersistError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let write_error = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_error)?;
    tmp.write_all(contents.as_bytes()).map_err(write_error)?;
    tmp.flush().map_err(write_error)?;

    tmp.persist(path).map_err(|e| PersistError::Rename {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::info!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_error_path() {
        let err = PersistError::Write {
            path: PathBuf::from("out/schema.d2"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.path(), Path::new("out/schema.d2"));
        assert_eq!(err.to_string(), "Failed to write out/schema.d2: disk full");
    }
}
