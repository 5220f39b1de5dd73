use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Append one spreadsheet onto another whose columns differ",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Propose a column mapping between two files without changing either
    Propose(ProposeArgs),
    /// Review a mapping, then append the source rows to the target file
    Append(AppendArgs),
}

/// Options shared by every command that reads the two files.
#[derive(Debug, Args)]
pub struct PairArgs {
    /// File whose rows are appended (CSV, TSV, TXT, XLSX, XLSM, XLS, XLSB or ODS)
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,
    /// File receiving the rows; its columns define the result
    #[arg(short = 't', long = "target")]
    pub target: PathBuf,
    /// YAML file with similarityThreshold, topKSuggestions and allowManyToOneMapping
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Minimum similarity (0-1) for a target column to be suggested
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Number of suggestions kept per unmapped column
    #[arg(long = "top-k")]
    pub top_k: Option<usize>,
    /// Delimiter for delimited input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProposeArgs {
    #[command(flatten)]
    pub pair: PairArgs,
    /// Save the proposal as an editable YAML mapping plan
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print the proposal as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AppendArgs {
    #[command(flatten)]
    pub pair: PairArgs,
    /// Start from a YAML mapping plan instead of the proposal
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Map a source column by hand: `SOURCE=TARGET` (repeatable)
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub maps: Vec<String>,
    /// Drop a source column (repeatable)
    #[arg(long = "unmap", action = clap::ArgAction::Append)]
    pub unmaps: Vec<String>,
    /// Accept the best free suggestion for every unmapped column
    #[arg(long = "accept-suggestions", conflicts_with = "mapping")]
    pub accept_suggestions: bool,
    /// Review each column at the terminal before merging
    #[arg(
        short = 'i',
        long = "interactive",
        conflicts_with_all = ["mapping", "accept_suggestions", "maps", "unmaps"]
    )]
    pub interactive: bool,
    /// Let several source columns feed one target column
    #[arg(long = "allow-many-to-one")]
    pub allow_many_to_one: bool,
    /// Copy the target to a timestamped .bak file before replacing it
    #[arg(long)]
    pub backup: bool,
    /// Merge and report statistics without writing the target
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
    /// Delimiter for the written target (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the written target (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
