use std::fmt::Write as _;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_import::dialect::Dialect;
use csv_import::import::{ImportOptions, Importer};
use csv_import::io_utils::MemorySource;
use csv_import::progress::NoProgress;
use csv_import::sqlite::SqliteStore;
use csv_import::tokenizer::Tokenizer;

fn generate_orders(rows: usize) -> String {
    let mut contents = String::from("id,customer,note,amount\n");
    for i in 0..rows {
        let note = match i % 3 {
            0 => "\"rush, gift wrap\"",
            1 => "  standard  ",
            _ => "\"said \"\"thanks\"\"\"",
        };
        let _ = writeln!(contents, "{i},customer {},{note},{}", i % 97, i * 7 % 1000);
    }
    contents
}

fn bench_tokenize(c: &mut Criterion) {
    let source = MemorySource::from(generate_orders(50_000).as_str());
    let tokenizer = Tokenizer::new(Dialect::default());
    c.bench_function("tokenize_50k_rows", |b| {
        b.iter(|| {
            let mut fields = 0usize;
            let result = tokenizer.parse(&source, None, &mut NoProgress, |_, row| {
                fields += row.len();
                true
            });
            assert!(result.is_success());
            fields
        })
    });
}

fn bench_import(c: &mut Criterion) {
    let source = MemorySource::from(generate_orders(10_000).as_str());
    c.bench_function("import_10k_rows_sqlite", |b| {
        b.iter_batched(
            || SqliteStore::open_in_memory().expect("in-memory store"),
            |store| {
                let importer = Importer::new(&store, Tokenizer::new(Dialect::default()));
                let mut outcome = importer
                    .import(&source, "orders", &ImportOptions::with_header(true), &mut NoProgress)
                    .expect("import");
                importer.commit(&mut outcome).expect("commit");
                outcome.rows_processed
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_tokenize, bench_import);
criterion_main!(benches);
