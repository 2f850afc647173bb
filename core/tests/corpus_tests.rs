use regdocs_core::corpus::{load_corpus, load_source};
use regdocs_core::{LabelSpec, LoadError, SourceDescriptor, SourceFormat, UrlSpec};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn governance_source(path: &Path) -> SourceDescriptor {
    SourceDescriptor::new(
        path,
        &["Official name", "Short summary", "Long summary"],
        LabelSpec::Literal("Kaggle AI Governance".into()),
    )
    .with_url(UrlSpec::Column("Link to document".into()))
}

fn epa_source(path: &Path) -> SourceDescriptor {
    SourceDescriptor::new(path, &["Document Name", "Description/Summary"], LabelSpec::Literal("EPA Guidance".into()))
}

#[test]
fn concatenates_sources_in_order_and_skips_malformed_rows() {
    let dir = tempdir().unwrap();
    let a = write(
        dir.path(),
        "documents.csv",
        "Official name,Short summary,Long summary,Link to document\n\
         AI Act,Risk tiers,Long text one,https://a.example/1\n\
         Broken,row,with,too,many,fields\n\
         Algorithmic Accountability,Audits,,https://a.example/2\n\
         Model Cards,Transparency,Long text three,\n",
    );
    let b = write(
        dir.path(),
        "guidance_ow.csv",
        "Document Name,Description/Summary\n\
         PFAS Advisory,Drinking water health advisories\n\
         Nutrient Criteria,Lakes and reservoirs\n",
    );

    let corpus = load_corpus(&[governance_source(&a), epa_source(&b)]).unwrap();
    let docs = &corpus.documents;
    assert_eq!(docs.len(), 5);
    let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["Kaggle AI Governance"; 3].into_iter().chain(vec!["EPA Guidance"; 2]).collect::<Vec<_>>());
    assert_eq!(docs[0].content, "AI Act. Risk tiers. Long text one");
    assert_eq!(docs[1].content, "Algorithmic Accountability. Audits");
    assert_eq!(docs[0].url, "https://a.example/1");
    assert_eq!(docs[2].url, "N/A");
    assert_eq!(docs[3].content, "PFAS Advisory. Drinking water health advisories");
    assert_eq!(docs[4].url, "N/A");

    assert_eq!(corpus.report.sources[0].rows_read, 4);
    assert_eq!(corpus.report.sources[0].rows_malformed, 1);
    assert_eq!(corpus.report.sources[0].rows_kept, 3);
    assert_eq!(corpus.report.documents_kept(), 5);
    assert!(corpus.report.failures.is_empty());
}

#[test]
fn rows_without_text_are_dropped() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        "guidance.csv",
        "Document Name,Description/Summary,Office\n\
         ,,OW\n\
         Lead and Copper,,OGWDW\n\
         \"  \",\"   \",OST\n\
         Short\n",
    );
    let desc = epa_source(&path);
    let (docs, report) = load_source(&desc).unwrap();
    let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["Lead and Copper", "Short"]);
    assert_eq!(report.rows_empty, 2);
    assert!(docs.iter().all(|d| !d.content.is_empty()));
}

#[test]
fn label_and_url_from_columns() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        "compliance.csv",
        "title;office;link\nPermit rule;OW;https://epa.example/p\nNo office;;\n",
    );
    let desc = SourceDescriptor::new(&path, &["title"], LabelSpec::Column("office".into()))
        .with_url(UrlSpec::Column("link".into()))
        .with_delimiter(';');
    let (docs, _) = load_source(&desc).unwrap();
    assert_eq!(docs[0].source, "OW");
    assert_eq!(docs[0].url, "https://epa.example/p");
    // blank label cell falls back to the file stem
    assert_eq!(docs[1].source, "compliance");
    assert_eq!(docs[1].url, "N/A");
}

#[test]
fn missing_url_column_uses_sentinel_but_missing_text_columns_fail() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "a.csv", "Document Name,Other\nWetlands,x\n");

    let desc = epa_source(&path).with_url(UrlSpec::Column("URL".into()));
    let (docs, _) = load_source(&desc).unwrap();
    assert_eq!(docs[0].content, "Wetlands");
    assert_eq!(docs[0].url, "N/A");

    let desc = SourceDescriptor::new(&path, &["Title", "Body"], LabelSpec::Literal("A".into()));
    match load_source(&desc) {
        Err(LoadError::MissingColumns { columns, .. }) => assert_eq!(columns, vec!["Title", "Body"]),
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn utf8_bom_header_is_ignored() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "bom.csv", "\u{feff}Document Name,Description/Summary\nStormwater,Permits\n");
    let (docs, _) = load_source(&epa_source(&path)).unwrap();
    assert_eq!(docs[0].content, "Stormwater. Permits");
}

#[test]
fn unreadable_source_is_skipped_when_others_load() {
    let dir = tempdir().unwrap();
    let good = write(dir.path(), "good.csv", "Document Name,Description/Summary\nBeaches,Monitoring\n");
    let missing = dir.path().join("missing.csv");

    let corpus = load_corpus(&[epa_source(&missing), epa_source(&good)]).unwrap();
    assert_eq!(corpus.documents.len(), 1);
    assert_eq!(corpus.report.failures.len(), 1);
    assert!(matches!(corpus.report.failures[0], LoadError::SourceUnreadable { .. }));
}

#[test]
fn build_fails_when_no_source_is_usable() {
    let dir = tempdir().unwrap();
    let err = load_corpus(&[epa_source(&dir.path().join("nope.csv"))]).unwrap_err();
    match err {
        LoadError::NoUsableSources { failures } => assert_eq!(failures.len(), 1),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(load_corpus(&[]), Err(LoadError::NoSources)));
}

#[test]
fn json_and_jsonl_sources() {
    let dir = tempdir().unwrap();
    let jsonl = write(
        dir.path(),
        "docs.jsonl",
        "{\"title\":\"Data Act\",\"body\":\"Data sharing\",\"url\":\"https://eu.example\"}\n\
         \n\
         not json\n\
         [1,2]\n\
         {\"title\":null,\"body\":\"Orphan body\",\"year\":2023}\n",
    );
    let desc = SourceDescriptor::new(&jsonl, &["title", "body"], LabelSpec::Literal("EU".into()))
        .with_format(SourceFormat::Jsonl)
        .with_url(UrlSpec::Column("url".into()));
    let (docs, report) = load_source(&desc).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].content, "Data Act. Data sharing");
    assert_eq!(docs[0].url, "https://eu.example");
    assert_eq!(docs[1].content, "Orphan body");
    assert_eq!(report.rows_malformed, 2);

    let json = write(dir.path(), "docs.json", "[{\"title\":\"Guidance\",\"year\":2021},{\"year\":1999}]");
    let desc = SourceDescriptor::new(&json, &["title", "year"], LabelSpec::Literal("EPA".into()))
        .with_format(SourceFormat::Json);
    let (docs, report) = load_source(&desc).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].content, "Guidance. 2021");
    assert_eq!(docs[1].content, "1999");
    assert_eq!(report.rows_empty, 0);

    let bad = write(dir.path(), "bad.json", "{ truncated");
    let desc = SourceDescriptor { origin: bad, ..desc };
    assert!(matches!(load_source(&desc), Err(LoadError::SourceParse { .. })));
}

#[test]
fn invalid_descriptor_is_a_source_failure() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "guidance.csv", "Document Name,Description/Summary\nPFAS,Advisory\n");

    let no_fields = SourceDescriptor::new(&path, &[], LabelSpec::Literal("A".into()));
    assert!(matches!(load_source(&no_fields), Err(LoadError::InvalidDescriptor { .. })));

    // U+012C truncates to b',' as a byte
    let wide_delimiter = epa_source(&path).with_delimiter('\u{12C}');
    assert!(matches!(load_source(&wide_delimiter), Err(LoadError::InvalidDescriptor { .. })));

    let corpus = load_corpus(&[no_fields.clone(), epa_source(&path)]).unwrap();
    assert_eq!(corpus.documents.len(), 1);
    assert_eq!(corpus.report.failures.len(), 1);
    assert!(matches!(corpus.report.failures[0], LoadError::InvalidDescriptor { .. }));

    assert!(matches!(load_corpus(&[no_fields]), Err(LoadError::NoUsableSources { .. })));
}

#[test]
fn invalid_utf8_rows_are_malformed() {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("compliance.csv");
    fs::write(&csv_path, b"title,note\nok one,x\ncaf\xe9,latin1\nok two,y\n").unwrap();
    let desc = SourceDescriptor::new(&csv_path, &["title"], LabelSpec::Literal("Compliance".into()));
    let (docs, report) = load_source(&desc).unwrap();
    let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["ok one", "ok two"]);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.rows_malformed, 1);

    let jsonl_path = dir.path().join("docs.jsonl");
    fs::write(&jsonl_path, b"{\"title\":\"first\"}\n{\"title\":\"caf\xe9\"}\n{\"title\":\"second\"}\n").unwrap();
    let desc = desc.with_format(SourceFormat::Jsonl);
    let desc = SourceDescriptor { origin: jsonl_path, ..desc };
    let (docs, report) = load_source(&desc).unwrap();
    let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(report.rows_malformed, 1);
}

#[test]
fn json_sources_report_missing_columns() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "docs.jsonl", "{\"name\":\"Data Act\"}\n{\"name\":\"AI Act\",\"office\":\"EU\"}\n");

    let desc = SourceDescriptor::new(&path, &["title", "body"], LabelSpec::Literal("EU".into()))
        .with_format(SourceFormat::Jsonl);
    match load_source(&desc) {
        Err(LoadError::MissingColumns { columns, .. }) => assert_eq!(columns, vec!["title", "body"]),
        other => panic!("expected MissingColumns, got {other:?}"),
    }

    // a column present in any object counts as present
    let desc = SourceDescriptor::new(&path, &["name"], LabelSpec::Column("office".into()))
        .with_format(SourceFormat::Jsonl);
    let (docs, _) = load_source(&desc).unwrap();
    assert_eq!(docs[0].source, "docs");
    assert_eq!(docs[1].source, "EU");

    let desc = SourceDescriptor::new(&path, &["name"], LabelSpec::Column("agency".into()))
        .with_format(SourceFormat::Jsonl);
    assert!(matches!(load_source(&desc), Err(LoadError::MissingColumns { .. })));
}
