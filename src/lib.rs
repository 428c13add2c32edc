pub mod batch;
pub mod cli;
pub mod dialect;
pub mod error;
pub mod import;
pub mod io_utils;
pub mod matcher;
pub mod preview;
pub mod progress;
pub mod schema;
pub mod settings;
pub mod sqlite;
pub mod store;
pub mod table;
pub mod tokenizer;

use std::{env, path::PathBuf, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    batch::{BatchOptions, FileStatus},
    cli::{Cli, Commands, DialectArgs},
    import::ImportOptions,
    progress::{LogProgress, ProgressSink},
    schema::InferOptions,
    settings::{ImportSettings, SETTINGS_ENV},
    sqlite::SqliteStore,
    tokenizer::Tokenizer,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Match(args) => handle_match(&args),
    }
}

pub(crate) struct ResolvedSettings {
    pub path: Option<PathBuf>,
    pub settings: ImportSettings,
}

/// Loads the persisted settings (from `--settings` or `CSV_IMPORT_SETTINGS`)
/// and applies the command-line overrides on top.
pub(crate) fn resolve_settings(args: &DialectArgs) -> Result<ResolvedSettings> {
    let path = args
        .settings
        .clone()
        .or_else(|| env::var_os(SETTINGS_ENV).map(PathBuf::from));
    let mut settings = match &path {
        Some(path) => ImportSettings::load(path)?,
        None => ImportSettings::default(),
    };
    if args.header {
        settings.first_row_header = true;
    } else if args.no_header {
        settings.first_row_header = false;
    }
    if args.trim {
        settings.trim_fields = true;
    } else if args.no_trim {
        settings.trim_fields = false;
    }
    if let Some(separator) = args.delimiter {
        settings.separator = separator;
    }
    if let Some(quote) = args.quote {
        settings.quote = quote.0;
    }
    if let Some(encoding) = &args.input_encoding {
        settings.encoding = encoding.clone();
    }
    debug!("Resolved settings: {settings:?}");
    Ok(ResolvedSettings { path, settings })
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let mut resolved = resolve_settings(&args.dialect)?;
    if args.separate_tables {
        resolved.settings.separate_tables = true;
    } else if args.single_table {
        resolved.settings.separate_tables = false;
    }
    let settings = &resolved.settings;
    let dialect = settings.dialect()?;
    info!(
        "Importing {} file(s) into {:?} with separator '{}'",
        args.inputs.len(),
        args.database,
        printable_char(dialect.effective_separator())
    );

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("Opening database {:?}", args.database))?;
    let options = BatchOptions {
        table: args.table.clone(),
        separate_tables: settings.separate_tables,
        reference: args.match_reference.clone(),
        force: args.force,
        import: ImportOptions {
            use_header: settings.first_row_header,
            allow_append: !args.no_append,
            detect_integers: args.detect_types,
            ..ImportOptions::default()
        },
    };
    let report = batch::run(&store, Tokenizer::new(dialect), &args.inputs, &options, |path| {
        Box::new(LogProgress::new(path.display().to_string())) as Box<dyn ProgressSink>
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Serializing import report")?;
        println!("{json}");
    } else {
        let headers = ["file", "table", "status", "rows", "message"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = report
            .files
            .iter()
            .map(|file| {
                vec![
                    file.path.display().to_string(),
                    file.table.clone().unwrap_or_default(),
                    format!("{:?}", file.status).to_lowercase(),
                    file.rows.to_string(),
                    file.message.clone().unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }

    if report.has_failures() {
        bail!(
            "{} of {} file(s) failed to import",
            report.count(FileStatus::Failed),
            report.files.len()
        );
    }
    if let Some(path) = &resolved.path {
        resolved
            .settings
            .save(path)
            .with_context(|| format!("Saving settings to {path:?}"))?;
        debug!("Saved settings to {path:?}");
    }
    Ok(())
}

fn handle_match(args: &cli::MatchArgs) -> Result<()> {
    let resolved = resolve_settings(&args.dialect)?;
    let dialect = resolved.settings.dialect()?;
    let Some(reference) = args.reference.as_ref().or_else(|| args.inputs.first()) else {
        bail!("No input files given");
    };
    let options = InferOptions::with_header(resolved.settings.first_row_header);
    let matches = matcher::match_files(reference, &args.inputs, &Tokenizer::new(dialect), &options)
        .with_context(|| format!("Matching headers against {reference:?}"))?;

    let headers = ["file", "columns", "matches"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = matches
        .iter()
        .map(|entry| {
            vec![
                entry.path.display().to_string(),
                entry.columns.to_string(),
                if entry.compatible { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "{} of {} file(s) match {:?}",
        matches.iter().filter(|entry| entry.compatible).count(),
        matches.len(),
        reference
    );
    Ok(())
}

pub(crate) fn printable_char(value: char) -> String {
    match value {
        '\t' => "\\t".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        other => other.to_string(),
    }
}
