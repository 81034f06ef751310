//! Configuration schema (sql2d2.toml)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the generated diagram
pub const DEFAULT_OUTPUT: &str = "tmp/schema.d2";

/// Default schema introspected in live mode
pub const DEFAULT_SCHEMA: &str = "public";

/// SQL dialect configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// PostgreSQL (the only dialect with a live sandbox)
    Postgres,

    /// Generic ANSI SQL, DDL parsing only
    Generic,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Postgres
    }
}

/// How the schema is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Apply migrations to a disposable database and read its catalog
    Live,

    /// Parse CREATE/ALTER statements without a database
    Ast,
}

impl Default for ExtractionMode {
    fn default() -> Self {
        Self::Live
    }
}

/// Diagram text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramTool {
    /// D2 (https://d2lang.com)
    D2,
}

impl Default for DiagramTool {
    fn default() -> Self {
        Self::D2
    }
}

impl std::fmt::Display for DiagramTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::D2 => write!(f, "d2"),
        }
    }
}

/// Disposable database settings for live mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Host port the engine listens on
    pub port: u16,

    pub user: String,

    pub password: String,

    pub database: String,

    /// PostgreSQL image tag
    pub image_tag: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            port: 2489,
            user: "postgres_sim".to_string(),
            password: "postgres_sim".to_string(),
            database: "postgres_sim".to_string(),
            image_tag: "16-alpine".to_string(),
        }
    }
}

impl SandboxConfig {
    /// Address the sandbox claims while a session is active
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Diagram output path
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Extraction mode
    #[serde(default)]
    pub mode: ExtractionMode,

    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Diagram format
    #[serde(default)]
    pub diagram_tool: DiagramTool,

    /// Schema to introspect in live mode
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Sandbox settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Directory the config file was loaded from
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: default_output(),
            mode: ExtractionMode::default(),
            dialect: DialectConfig::default(),
            diagram_tool: DiagramTool::default(),
            schema: default_schema(),
            sandbox: SandboxConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == ExtractionMode::Live && self.dialect != DialectConfig::Postgres {
            return Err(ConfigError::Invalid(format!(
                "live mode requires the postgres dialect, got {:?}",
                self.dialect
            )));
        }
        if self.schema.trim().is_empty() {
            return Err(ConfigError::Invalid("schema name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
