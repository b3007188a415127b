use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use querybind_catalog::{Catalog, MemoryCatalog};
use querybind_core::{Config, OutputFormat, ParserError, QueryDescription, QuerySchema, Report};
use querybind_sql::SqlParser;

/// querybind - bind SELECT statements against a table catalog
#[derive(Parser)]
#[command(name = "querybind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: querybind.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file (TOML or JSON); overrides the config
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Output format; overrides the config
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Statement given inline or read from a file
#[derive(clap::Args)]
struct StatementArgs {
    /// SQL statement
    statement: Option<String>,

    /// Read the statement from a file
    #[arg(short, long, conflicts_with = "statement")]
    file: Option<PathBuf>,
}

impl StatementArgs {
    fn read(&self) -> Result<String> {
        match (&self.statement, &self.file) {
            (Some(sql), _) => Ok(sql.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read statement from {}", path.display())),
            (None, None) => Err(anyhow::anyhow!("No statement given; pass it inline or with --file")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a statement binds against the catalog
    Check {
        #[command(flatten)]
        input: StatementArgs,

        /// Write a JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe the query built from a statement
    Explain {
        #[command(flatten)]
        input: StatementArgs,
    },

    /// Print the statement re-serialized from the built query
    Format {
        #[command(flatten)]
        input: StatementArgs,
    },

    /// List catalog tables and their fields
    Tables,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("querybind.toml").exists() {
        Config::from_file(Path::new("querybind.toml"))?
    } else {
        Config::default()
    };

    init_tracing(&config, cli.verbose);

    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    let catalog = load_catalog(&cli, &config)?;
    let format = cli.format.map(OutputFormat::from).unwrap_or(config.output.format);

    match cli.command {
        Commands::Check { input, output } => {
            let parser = SqlParser::from_config(catalog, &config);
            check_command(&parser, &input.read()?, output.as_deref(), cli.verbose)
        }
        Commands::Explain { input } => {
            let parser = SqlParser::from_config(catalog, &config);
            explain_command(&parser, &input.read()?, format)
        }
        Commands::Format { input } => {
            let parser = SqlParser::from_config(catalog, &config);
            format_command(&parser, &input.read()?)
        }
        Commands::Tables => tables_command(catalog.as_ref(), format),
    }
}

/// `RUST_LOG` wins over the configured filter; `-v` raises the default
fn init_tracing(config: &Config, verbose: bool) {
    let default_filter = if verbose { "debug" } else { config.log_filter.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_catalog(cli: &Cli, config: &Config) -> Result<Arc<dyn Catalog>> {
    let path = cli
        .catalog
        .clone()
        .or_else(|| config.catalog_path())
        .ok_or_else(|| {
            anyhow::anyhow!("No catalog file given; pass --catalog or set `catalog` in querybind.toml")
        })?;

    if cli.verbose {
        eprintln!("{} {}", "Loading catalog from:".cyan(), path.display());
    }

    let catalog = MemoryCatalog::from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog {}: {}", path.display(), e))?;
    tracing::debug!(tables = catalog.len(), path = %path.display(), "catalog loaded");
    Ok(Arc::new(catalog))
}

/// Parse or print the error and exit with code 1
fn parse_or_exit(parser: &SqlParser, sql: &str) -> QuerySchema {
    match parser.parse(sql) {
        Ok(query) => query,
        Err(err) => {
            print_error(&err, sql);
            std::process::exit(1);
        }
    }
}

fn print_error(err: &ParserError, sql: &str) {
    let rendered = err.render(sql.trim_end());
    let mut lines = rendered.lines();
    if let Some(first) = lines.next() {
        if err.is_user_error() {
            eprintln!("{}", first.red().bold());
        } else {
            eprintln!("{} {}", "internal:".magenta().bold(), first.magenta());
        }
    }
    for line in lines {
        eprintln!("{}", line);
    }
}

/// Check command - parse and report success or the first error
fn check_command(parser: &SqlParser, sql: &str, output: Option<&Path>, verbose: bool) -> Result<()> {
    let result = parser.parse(sql);

    let report = match &result {
        Ok(query) => Report::from_query(sql, query),
        Err(err) => Report::from_error(sql, err.clone()),
    };

    if let Some(path) = output {
        report.save_to_file(path)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    match result {
        Ok(query) => {
            println!("{}", "OK".green().bold());
            if verbose {
                eprintln!("{}", query.debug_string());
            }
            Ok(())
        }
        Err(err) => {
            print_error(&err, sql);
            std::process::exit(1);
        }
    }
}

/// Explain command - print tables, columns and clauses
fn explain_command(parser: &SqlParser, sql: &str, format: OutputFormat) -> Result<()> {
    let query = parse_or_exit(parser, sql);
    let description = QueryDescription::from_query(&query);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(());
    }

    println!("{}", "Tables:".bold());
    for table in &description.tables {
        let alias = table
            .alias
            .as_deref()
            .map(|a| format!(" AS {}", a))
            .unwrap_or_default();
        println!("  {}: {}{}", table.position, table.name.green(), alias);
    }
    println!(
        "{} {}",
        "Master table:".bold(),
        description.master_table.as_deref().unwrap_or("-")
    );

    println!("{}", "Columns:".bold());
    for column in &description.columns {
        let alias = column
            .alias
            .as_deref()
            .map(|a| format!(" AS {}", a.cyan()))
            .unwrap_or_default();
        let hidden = if column.visible { "" } else { " (hidden)" };
        println!(
            "  {}: [{}] {}{}{}",
            column.position, column.kind, column.text, alias, hidden
        );
    }

    println!("{}", "Expanded:".bold());
    for (i, entry) in description.expanded.iter().enumerate() {
        let source = entry.table.as_deref().unwrap_or("expression");
        println!("  {}: {} ({})", i + 1, entry.name, source.dimmed());
    }

    if let Some(where_expr) = &description.where_expression {
        println!("{} {}", "Where:".bold(), where_expr);
    }

    if !description.order_by.is_empty() {
        println!("{}", "Order by:".bold());
        for entry in &description.order_by {
            let direction = if entry.ascending { "ASC" } else { "DESC" };
            println!("  {} {}", entry.target, direction);
        }
    }
    Ok(())
}

/// Format command - print the re-serialized statement
fn format_command(parser: &SqlParser, sql: &str) -> Result<()> {
    let query = parse_or_exit(parser, sql);
    println!("{}", parser.to_sql(&query));
    Ok(())
}

/// Tables command - list the catalog
fn tables_command(catalog: &dyn Catalog, format: OutputFormat) -> Result<()> {
    let mut names = catalog.table_names();
    names.sort();

    let tables = names
        .iter()
        .map(|name| catalog.table(name))
        .collect::<Result<Vec<_>, _>>()?;

    if format == OutputFormat::Json {
        let tables: Vec<_> = tables.iter().map(|t| t.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    for table in tables {
        println!("{}", table.name.bold());
        for field in &table.fields {
            let mut flags = Vec::new();
            if field.primary_key {
                flags.push("primary key");
            }
            if field.auto_increment {
                flags.push("auto increment");
            }
            if field.not_null {
                flags.push("not null");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            println!("  {} {}{}", field.name, field.logical_type.to_string().dimmed(), flags);
        }
    }
    Ok(())
}
