use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tabletalk")]
#[command(
    author,
    version,
    about = "An in-memory SQL engine for executing AI-generated queries over uploaded datasets"
)]
pub struct Cli {
    /// Path to a JSON file holding an array of row objects
    #[arg(required = true)]
    pub path: PathBuf,

    /// Name to load the table under (defaults to the file stem)
    #[arg(short, long)]
    pub table: Option<String>,

    /// Execute a query against the loaded table
    #[arg(short, long)]
    pub query: Option<String>,

    /// Output format for query results
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
