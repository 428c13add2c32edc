use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::schema::DEFAULT_SAMPLE_ROWS;

#[derive(Debug, Parser)]
#[command(author, version, about = "Import delimited text files into SQLite tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import one or more CSV files into a database table
    Import(ImportArgs),
    /// Show the inferred columns and first rows of a CSV file
    Preview(PreviewArgs),
    /// Compare the header of several CSV files with a reference file
    Match(MatchArgs),
}

/// Dialect and header options shared by every subcommand. Unset options fall
/// back to the settings file.
#[derive(Debug, Clone, Default, Args)]
pub struct DialectArgs {
    /// Use the first row as column names
    #[arg(long = "header", overrides_with = "no_header")]
    pub header: bool,
    /// Treat the first row as data
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Strip whitespace outside quotes around each field
    #[arg(long = "trim", overrides_with = "no_trim")]
    pub trim: bool,
    /// Keep whitespace around fields
    #[arg(long = "no-trim")]
    pub no_trim: bool,
    /// Field separator (supports ',', ';', '|', 'tab', or any ASCII character)
    #[arg(long, value_parser = parse_separator)]
    pub delimiter: Option<char>,
    /// Quote character ('"', '\'', or 'none' to disable quoting)
    #[arg(long, value_parser = parse_quote)]
    pub quote: Option<QuoteArg>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML file holding the last used import settings
    #[arg(long = "settings")]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteArg(pub Option<char>);

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// CSV files to import
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// SQLite database file (created when missing)
    #[arg(long = "db")]
    pub database: PathBuf,
    /// Target table (defaults to the first file's base name)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// Import every file into its own table named after the file
    #[arg(long = "separate-tables", overrides_with = "single_table")]
    pub separate_tables: bool,
    /// Import every file into the same table
    #[arg(long = "single-table")]
    pub single_table: bool,
    /// Only import files whose header matches this file's header
    #[arg(long = "match-reference")]
    pub match_reference: Option<PathBuf>,
    /// Import files even when their header does not match the reference
    #[arg(long)]
    pub force: bool,
    /// Refuse to append into an existing table
    #[arg(long = "no-append")]
    pub no_append: bool,
    /// Create integer columns for sampled columns holding only integers
    #[arg(long = "detect-types")]
    pub detect_types: bool,
    /// Print the per-file report as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CSV file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to sample
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub rows: usize,
    /// Report integer columns among the sampled rows
    #[arg(long = "detect-types")]
    pub detect_types: bool,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// CSV files to compare
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// File whose header the others are compared with (defaults to the first input)
    #[arg(long)]
    pub reference: Option<PathBuf>,
    #[command(flatten)]
    pub dialect: DialectArgs,
}

pub fn parse_separator(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        other => single_ascii_char(other, "Separator"),
    }
}

pub fn parse_quote(value: &str) -> Result<QuoteArg, String> {
    match value {
        "none" | "" => Ok(QuoteArg(None)),
        "double" | "\"" => Ok(QuoteArg(Some('"'))),
        "single" | "'" => Ok(QuoteArg(Some('\''))),
        other => single_ascii_char(other, "Quote").map(|ch| QuoteArg(Some(ch))),
    }
}

fn single_ascii_char(value: &str, role: &str) -> Result<char, String> {
    let mut chars = value.chars();
    let first = chars
        .next()
        .ok_or_else(|| format!("{role} cannot be empty"))?;
    if chars.next().is_some() {
        return Err(format!("{role} must be a single character"));
    }
    if !first.is_ascii() {
        return Err(format!("{role} must be ASCII"));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_aliases_resolve() {
        assert_eq!(parse_separator("tab"), Ok('\t'));
        assert_eq!(parse_separator("semicolon"), Ok(';'));
        assert_eq!(parse_separator("#"), Ok('#'));
        assert!(parse_separator("ab").is_err());
        assert!(parse_separator("é").is_err());
    }

    #[test]
    fn quote_none_disables_quoting() {
        assert_eq!(parse_quote("none"), Ok(QuoteArg(None)));
        assert_eq!(parse_quote("'"), Ok(QuoteArg(Some('\''))));
        assert!(parse_quote("").is_ok());
    }

    #[test]
    fn cli_parses_import_with_dialect_flags() {
        let cli = Cli::try_parse_from([
            "csv-import",
            "import",
            "-i",
            "a.csv",
            "-i",
            "b.csv",
            "--db",
            "out.db",
            "--header",
            "--delimiter",
            ";",
            "--quote",
            "none",
        ])
        .expect("parse");
        let Commands::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.inputs.len(), 2);
        assert!(args.dialect.header);
        assert_eq!(args.dialect.delimiter, Some(';'));
        assert_eq!(args.dialect.quote, Some(QuoteArg(None)));
    }
}
