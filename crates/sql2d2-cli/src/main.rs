use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sql2d2_core::{Config, DiagramTool, DialectConfig, ExtractionMode, MigrationBuilder, Schema};
use sql2d2_engine::{Pipeline, PipelineOutput};

const CONFIG_FILE: &str = "sql2d2.toml";

/// sql2d2 - Generate database diagrams from SQL migration files
#[derive(Parser, Debug)]
#[command(name = "sql2d2")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQL file or glob pattern for migration files
    input: Option<String>,

    /// Migration file to apply (repeatable)
    #[arg(long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Literal migration SQL
    #[arg(long, value_name = "TEXT")]
    sql: Option<String>,

    /// Output path for the diagram file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// SQL database type
    #[arg(short = 's', long = "sql-type", value_enum)]
    sql_type: Option<SqlType>,

    /// Diagramming tool to use
    #[arg(short, long = "diagram-tool", value_enum)]
    diagram_tool: Option<Tool>,

    /// How to obtain the schema
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Database schema to introspect in live mode
    #[arg(long)]
    schema: Option<String>,

    /// Path to config file (default: sql2d2.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the schema as JSON instead of the table listing
    #[arg(long)]
    json: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SqlType {
    Postgres,
    Generic,
}

impl From<SqlType> for DialectConfig {
    fn from(value: SqlType) -> Self {
        match value {
            SqlType::Postgres => DialectConfig::Postgres,
            SqlType::Generic => DialectConfig::Generic,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Tool {
    D2,
}

impl From<Tool> for DiagramTool {
    fn from(value: Tool) -> Self {
        match value {
            Tool::D2 => DiagramTool::D2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Live,
    Ast,
}

impl From<Mode> for ExtractionMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Live => ExtractionMode::Live,
            Mode::Ast => ExtractionMode::Ast,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    apply_overrides(&mut config, &cli);

    if cli.verbose {
        eprintln!(
            "{} {} mode, {:?} dialect",
            "Using".cyan(),
            format!("{:?}", config.mode).to_lowercase(),
            config.dialect
        );
    }

    let migration = migration_from_args(&cli);
    let pipeline = Pipeline::new(config)?;
    let output = pipeline.run(&migration).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.schema)?);
    } else if !cli.quiet {
        print_schema(&output.schema);
    }

    if !cli.quiet {
        print_warnings(&output);
        eprintln!(
            "{} {}",
            format!("{} diagram saved to", pipeline.config().diagram_tool).green(),
            output.output.display()
        );
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(config_path) = path {
        return Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    let default_path = Path::new(CONFIG_FILE);
    if default_path.exists() {
        return Ok(Config::from_file(default_path)?);
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

/// Command-line values win over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(sql_type) = cli.sql_type {
        config.dialect = sql_type.into();
    }
    if let Some(tool) = cli.diagram_tool {
        config.diagram_tool = tool.into();
    }
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    if let Some(schema) = &cli.schema {
        config.schema = schema.clone();
    }
}

/// Every source given on the command line is configured; the builder
/// rejects zero or several
fn migration_from_args(cli: &Cli) -> MigrationBuilder {
    let mut migration = MigrationBuilder::new();
    if let Some(input) = &cli.input {
        migration = migration.use_glob(input.clone());
    }
    for file in &cli.files {
        migration = migration.use_sql_file(file.clone());
    }
    if let Some(sql) = &cli.sql {
        migration = migration.use_sql(sql.clone());
    }
    migration
}

fn print_schema(schema: &Schema) {
    println!("{}", format!("Found {} tables:", schema.tables.len()).bold());

    for table in &schema.tables {
        println!();
        println!("{} {}", "Table:".bold(), table.name.bright_blue());

        for column in &table.columns {
            let mut line = format!("  Column: {} ({})", column.name, column.data_type);
            if !column.constraints.is_empty() {
                let tags: Vec<String> = column.constraints.iter().map(ToString::to_string).collect();
                line.push_str(&format!(" - Constraints: {}", tags.join(", ")));
            }
            println!("{}", line);
        }
    }
    println!();
}

fn print_warnings(output: &PipelineOutput) {
    let warnings: Vec<_> = output.warnings().collect();
    if warnings.is_empty() {
        return;
    }

    eprintln!("{}", format!("{} warnings:", warnings.len()).yellow());
    for warning in warnings {
        eprintln!("  {}", warning.to_string().yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sql2d2").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let cli = parse(&["migrations/*.sql"]);
        let mut config = Config::default();
        let before = config.clone();

        apply_overrides(&mut config, &cli);
        assert_eq!(config, before);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "schema.sql",
            "-o",
            "out/db.d2",
            "-s",
            "generic",
            "-d",
            "d2",
            "--mode",
            "ast",
            "--schema",
            "app",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.output, PathBuf::from("out/db.d2"));
        assert_eq!(config.dialect, DialectConfig::Generic);
        assert_eq!(config.diagram_tool, DiagramTool::D2);
        assert_eq!(config.mode, ExtractionMode::Ast);
        assert_eq!(config.schema, "app");
    }

    #[test]
    fn test_unsupported_sql_type_rejected() {
        let result = Cli::try_parse_from(["sql2d2", "schema.sql", "-s", "mysql"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeated_files_form_one_source() {
        let cli = parse(&["--file", "a.sql", "--file", "b.sql"]);
        assert!(migration_from_args(&cli).validate().is_ok());
    }

    #[test]
    fn test_glob_and_sql_together_rejected() {
        let cli = parse(&["migrations/*.sql", "--sql", "CREATE TABLE t (id int);"]);
        assert!(migration_from_args(&cli).validate().is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sql2d2", "x.sql", "-q", "-v"]).is_err());
    }
}
