use std::fs;
use std::path::Path;

use pdx_index::{
    ExtractionRule, Origin, RuleExtractor, ScanOptions, SymbolIndex, SymbolLookup, file_uri,
    scan_workspace,
};
use pdx_testhelpers::init_tracing;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn extractor() -> RuleExtractor {
    RuleExtractor::new(&[
        ExtractionRule {
            path: "**/events/*.txt".into(),
            category: "event".into(),
            name_field: Some("id".into()),
        },
        ExtractionRule {
            path: "**/common/traits/*.txt".into(),
            category: "trait".into(),
            name_field: None,
        },
    ])
}

fn options() -> ScanOptions {
    ScanOptions {
        batch_size: 2,
        workers: 2,
        ..ScanOptions::default()
    }
}

#[test]
fn scan_indexes_matching_files() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "events/a.txt", "namespace = a\nevent = { id = a.1 }\nevent = { id = a.2 }");
    write(root, "events/b.txt", "event = { id = b.1 }");
    write(root, "common/traits/traits.txt", "brave = { }\ncraven = { }\n@threshold = 5");
    write(root, "common/traits/readme.md", "brave = { }");
    write(root, "broken/c.txt", "x = { y = ");

    let index = SymbolIndex::new();
    let report = scan_workspace(&index, &[root.to_path_buf()], &options(), &extractor()).unwrap();

    assert_eq!(report.files_indexed, 4);
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.files_skipped, 0);
    assert_eq!(report.symbols, 6);
    assert_eq!(report.batches, 2);

    assert_eq!(index.names("event"), vec!["a.1", "a.2", "b.1"]);
    assert_eq!(index.names("trait"), vec!["brave", "craven"]);
    assert!(index.contains("variable", "@threshold"));

    let a2 = index.find("event", "a.2").unwrap();
    assert_eq!(a2.uri, file_uri(&root.join("events/a.txt")).unwrap());
    assert_eq!(a2.range.start.line, 2);
    assert_eq!(index.origin(&a2.uri), Some(Origin::Disk));
}

#[test]
fn scan_honours_ignore_files_and_hidden_dirs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, ".ignore", "generated/\n");
    write(root, "generated/events/g.txt", "event = { id = gen.1 }");
    write(root, ".hidden/events/h.txt", "event = { id = hidden.1 }");
    write(root, "events/e.txt", "event = { id = kept.1 }");

    let index = SymbolIndex::new();
    let report = scan_workspace(&index, &[root.to_path_buf()], &options(), &extractor()).unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(index.names("event"), vec!["kept.1"]);
}

#[test]
fn scan_does_not_overwrite_editor_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "events/open.txt", "event = { id = stale.1 }");
    write(root, "events/closed.txt", "event = { id = closed.1 }");

    let index = SymbolIndex::new();
    let uri = file_uri(&root.join("events/open.txt")).unwrap();
    let ast = pdx_parse::parse("event = { id = live.1 }");
    let symbols = pdx_index::SymbolExtractor::extract(&extractor(), &uri, &ast);
    index.update_document(&uri, symbols);

    let report = scan_workspace(&index, &[root.to_path_buf()], &options(), &extractor()).unwrap();
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.files_indexed, 1);
    assert_eq!(index.names("event"), vec!["closed.1", "live.1"]);
    assert_eq!(index.origin(&uri), Some(Origin::Editor));
}
