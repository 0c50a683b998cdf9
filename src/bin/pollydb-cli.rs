//! PollyDB CLI - run one SELECT against a directory of delimited files
//!
//! Usage:
//!   pollydb-cli --dir ./data "select o.id, c.name from orders o join customers c on o.cust = c.id"
//!   pollydb-cli --dir ./data --separator , --format json "select * from people"

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pollydb::config::{ConfigBuilder, EngineConfig};
use pollydb::{Command, Connection, QueryResult};
use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "pollydb-cli")]
#[command(about = "Query delimited text files with SQL", long_about = None)]
#[command(version)]
struct Cli {
    /// SQL query
    sql: String,

    /// Directory holding the relation files
    #[arg(short, long, env = "POLLYDB_DATA_DIR")]
    dir: Option<PathBuf>,

    /// Field separator
    #[arg(long)]
    separator: Option<char>,

    /// Quote character
    #[arg(long)]
    quote: Option<char>,

    /// File encoding label, e.g. utf-8 or windows-1252
    #[arg(long)]
    encoding: Option<String>,

    /// Files have no header line
    #[arg(long)]
    no_header: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    pollydb::logging::init(&config.logging);

    let conn = Connection::from_config(&config).with_context(|| {
        format!(
            "cannot open data directory {}",
            config.connection.data_dir.display()
        )
    })?;
    let result = Command::new(cli.sql.as_str(), &conn)
        .execute_query()
        .with_context(|| format!("query failed: {}", cli.sql))?;

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print!("{}", render_table(&result)),
    }
    Ok(())
}

/// Config file or environment, then command line flags on top.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let base = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => EngineConfig::from_env().context("invalid environment configuration")?,
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(dir) = &cli.dir {
        builder = builder.with_data_dir(dir);
    }
    if let Some(separator) = cli.separator {
        builder = builder.with_separator(separator);
    }
    if let Some(quote) = cli.quote {
        builder = builder.with_quote(quote);
    }
    if let Some(encoding) = &cli.encoding {
        builder = builder.with_encoding(encoding.as_str());
    }
    if cli.no_header {
        builder = builder.with_header(false);
    }
    if let Some(level) = &cli.log_level {
        builder = builder.with_log_level(level.as_str());
    }
    builder.build().context("invalid configuration")
}

fn render_table(result: &QueryResult) -> String {
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &result.rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let line = |values: &[String]| -> String {
        let cells: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<w$}", v, w = *w))
            .collect();
        cells.join(" | ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&result.columns));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &result.rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", result.rows.len()));
    out
}
