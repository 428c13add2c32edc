use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::PreviewArgs,
    error::ImportError,
    io_utils::{CsvSource, FileSource},
    progress::NoProgress,
    schema::{self, FieldList, InferOptions},
    table,
    tokenizer::{ParseResult, Row, Tokenizer},
};

/// Inferred fields plus the sampled data rows (header row excluded).
#[derive(Debug, Clone, Default)]
pub struct Preview {
    pub fields: FieldList,
    pub rows: Vec<Row>,
}

impl Preview {
    pub fn render(&self) -> String {
        let headers = self
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect::<Vec<_>>();
        table::render_numbered(&headers, &self.rows, 1)
    }
}

pub fn collect<S>(
    source: &S,
    tokenizer: &Tokenizer,
    options: &InferOptions,
) -> Result<Preview, ImportError>
where
    S: CsvSource + ?Sized,
{
    let fields = schema::infer(source, tokenizer, options)?;
    if fields.is_empty() {
        return Ok(Preview::default());
    }
    let mut rows = Vec::new();
    let result = tokenizer.parse(
        source,
        Some(options.sample_limit),
        &mut NoProgress,
        |row_index, row| {
            if !(row_index == 0 && options.use_header) {
                rows.push(row.to_vec());
            }
            true
        },
    );
    if let ParseResult::Error(err) = result {
        return Err(err);
    }
    Ok(Preview { fields, rows })
}

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let resolved = crate::resolve_settings(&args.dialect)?;
    let dialect = resolved.settings.dialect()?;
    let options = InferOptions {
        use_header: resolved.settings.first_row_header,
        sample_limit: args.rows,
        detect_integers: args.detect_types,
    };
    let source = FileSource::new(&args.input);
    let preview = collect(&source, &Tokenizer::new(dialect), &options)
        .with_context(|| format!("Previewing {:?}", args.input))?;

    if preview.fields.is_empty() {
        info!("{:?} contains no rows", args.input);
        return Ok(());
    }
    for name in preview.fields.duplicate_names() {
        warn!("Column name '{name}' appears more than once; table creation may fail");
    }

    let kinds = preview
        .fields
        .iter()
        .map(|field| format!("{} {}", field.name, field.kind))
        .collect::<Vec<_>>()
        .join(", ");
    println!("Fields: {kinds}");
    print!("{}", preview.render());
    info!(
        "Previewed {} row(s) across {} column(s) from {:?}",
        preview.rows.len(),
        preview.fields.len(),
        args.input
    );
    Ok(())
}
