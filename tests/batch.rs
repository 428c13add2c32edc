mod common;

use csv_import::{
    batch::{self, BatchOptions, FileStatus},
    dialect::Dialect,
    import::ImportOptions,
    progress::{NoProgress, ProgressSink},
    sqlite::SqliteStore,
    tokenizer::Tokenizer,
};

use common::{TestWorkspace, table_rows, text};

fn no_progress(_: &std::path::Path) -> Box<dyn ProgressSink> {
    Box::new(NoProgress)
}

fn header_options() -> ImportOptions {
    ImportOptions::with_header(true)
}

#[test]
fn mismatched_header_is_excluded_unless_forced() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("first.csv", "a,b\n1,2\n");
    let second = workspace.write("second.csv", "a,c\n3,4\n");
    let files = vec![first.clone(), second.clone()];

    let store = SqliteStore::open_in_memory().expect("store");
    let options = BatchOptions {
        reference: Some(first.clone()),
        import: header_options(),
        ..BatchOptions::default()
    };
    let report = batch::run(
        &store,
        Tokenizer::new(Dialect::default()),
        &files,
        &options,
        no_progress,
    )
    .expect("batch");

    assert_eq!(report.files[0].status, FileStatus::Imported);
    assert_eq!(report.files[1].status, FileStatus::Excluded);
    assert_eq!(store.row_count("first").unwrap(), 1);

    let forced = BatchOptions {
        force: true,
        ..options
    };
    let store = SqliteStore::open_in_memory().expect("store");
    let report = batch::run(
        &store,
        Tokenizer::new(Dialect::default()),
        &files,
        &forced,
        no_progress,
    )
    .expect("batch");
    assert_eq!(report.count(FileStatus::Imported), 2);
    assert_eq!(
        table_rows(&store, "first"),
        vec![vec![text("1"), text("2")], vec![text("3"), text("4")]]
    );
}

#[test]
fn failed_file_does_not_undo_earlier_files() {
    let workspace = TestWorkspace::new();
    let good = workspace.write("good.csv", "x,y\n1,2\n");
    let wide = workspace.write("wide.csv", "x,y,z\n1,2,3\n");
    let later = workspace.write("later.csv", "x,y\n5,6\n");
    let files = vec![good, wide, later];

    let store = SqliteStore::open_in_memory().expect("store");
    let options = BatchOptions {
        table: Some("combined".into()),
        import: header_options(),
        ..BatchOptions::default()
    };
    let report = batch::run(
        &store,
        Tokenizer::new(Dialect::default()),
        &files,
        &options,
        no_progress,
    )
    .expect("batch");

    let statuses: Vec<FileStatus> = report.files.iter().map(|file| file.status).collect();
    assert_eq!(
        statuses,
        vec![FileStatus::Imported, FileStatus::Failed, FileStatus::Imported]
    );
    assert!(report.has_failures());
    assert!(
        report.files[1]
            .message
            .as_deref()
            .unwrap_or_default()
            .starts_with("SchemaMismatchError")
    );
    assert_eq!(report.total_rows(), 2);
    assert_eq!(store.row_count("combined").unwrap(), 2);
}

#[test]
fn separate_tables_are_named_after_files() {
    let workspace = TestWorkspace::new();
    let files = vec![
        workspace.write("jan.2024.csv", "day,amount\n1,10\n2,20\n"),
        workspace.write("feb.csv", "day\n1\n"),
        workspace.write("empty.csv", ""),
    ];

    let store = SqliteStore::open_in_memory().expect("store");
    let options = BatchOptions {
        separate_tables: true,
        import: header_options(),
        ..BatchOptions::default()
    };
    let report = batch::run(
        &store,
        Tokenizer::new(Dialect::default()),
        &files,
        &options,
        no_progress,
    )
    .expect("batch");

    assert_eq!(store.table_names().unwrap(), vec!["feb", "jan"]);
    assert_eq!(store.row_count("jan").unwrap(), 2);
    assert_eq!(report.files[2].status, FileStatus::Empty);
    assert!(!report.has_failures());
}

#[test]
fn report_serializes_statuses_in_snake_case() {
    let workspace = TestWorkspace::new();
    let files = vec![workspace.write("only.csv", "v\n1\n")];
    let store = SqliteStore::open_in_memory().expect("store");
    let report = batch::run(
        &store,
        Tokenizer::new(Dialect::default()),
        &files,
        &BatchOptions {
            import: header_options(),
            ..BatchOptions::default()
        },
        no_progress,
    )
    .expect("batch");

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["files"][0]["status"], "imported");
    assert_eq!(json["files"][0]["table"], "only");
    assert_eq!(json["files"][0]["rows"], 1);
    assert!(json["files"][0].get("message").is_none());
}
