use crate::config::{LabelSpec, SourceDescriptor, SourceFormat, UrlSpec, DEFAULT_URL_SENTINEL};
use crate::error::LoadError;
use crate::index::Document;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// What one source contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub origin: PathBuf,
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows whose text fields were all missing or blank.
    pub rows_empty: usize,
    /// Rows that could not be parsed.
    pub rows_malformed: usize,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub sources: Vec<SourceReport>,
    /// Sources that failed as a whole and were skipped.
    pub failures: Vec<LoadError>,
}

impl LoadReport {
    pub fn documents_kept(&self) -> usize { self.sources.iter().map(|s| s.rows_kept).sum() }
}

#[derive(Debug)]
pub struct LoadedCorpus {
    pub documents: Vec<Document>,
    pub report: LoadReport,
}

/// Load every source in order and concatenate their documents.
///
/// A source that cannot be opened or parsed is skipped; the load fails only when none is usable.
pub fn load_corpus(sources: &[SourceDescriptor]) -> Result<LoadedCorpus, LoadError> {
    if sources.is_empty() {
        return Err(LoadError::NoSources);
    }
    let mut documents = Vec::new();
    let mut report = LoadReport::default();
    for desc in sources {
        match load_source(desc) {
            Ok((docs, source_report)) => {
                tracing::info!(
                    origin = %desc.origin.display(),
                    read = source_report.rows_read,
                    kept = source_report.rows_kept,
                    empty = source_report.rows_empty,
                    malformed = source_report.rows_malformed,
                    "loaded source"
                );
                documents.extend(docs);
                report.sources.push(source_report);
            }
            Err(e) => {
                tracing::warn!(origin = %desc.origin.display(), error = %e, "skipping source");
                report.failures.push(e);
            }
        }
    }
    if report.sources.is_empty() {
        return Err(LoadError::NoUsableSources { failures: report.failures });
    }
    tracing::info!(num_docs = documents.len(), sources = report.sources.len(), failed = report.failures.len(), "corpus loaded");
    Ok(LoadedCorpus { documents, report })
}

/// Load a single source into documents, in file order.
pub fn load_source(desc: &SourceDescriptor) -> Result<(Vec<Document>, SourceReport), LoadError> {
    if let Some(reason) = desc.problem() {
        return Err(LoadError::InvalidDescriptor { origin: desc.origin.clone(), reason: reason.to_string() });
    }
    let mut report = SourceReport { origin: desc.origin.clone(), ..SourceReport::default() };
    let docs = match desc.format {
        SourceFormat::Csv => load_csv(desc, &mut report)?,
        SourceFormat::Json => load_json(desc, &mut report)?,
        SourceFormat::Jsonl => load_jsonl(desc, &mut report)?,
    };
    report.rows_kept = docs.len();
    Ok((docs, report))
}

/// Turns field lookups into a document according to a descriptor.
struct RowMapper<'a> {
    desc: &'a SourceDescriptor,
    url_column_present: bool,
    fallback_label: String,
}

impl<'a> RowMapper<'a> {
    fn new(desc: &'a SourceDescriptor) -> Self {
        let fallback_label = desc
            .origin
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| desc.origin.display().to_string());
        Self { desc, url_column_present: true, fallback_label }
    }

    /// None when every text field is missing or blank.
    fn map<F>(&self, field: F) -> Option<Document>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parts: Vec<String> = self
            .desc
            .text_fields
            .iter()
            .filter_map(|name| field(name.as_str()))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if parts.is_empty() {
            return None;
        }
        let content = parts.join(&self.desc.separator);

        let source = match &self.desc.label {
            LabelSpec::Literal(label) => label.clone(),
            LabelSpec::Column(column) => non_blank(field(column.as_str())).unwrap_or_else(|| self.fallback_label.clone()),
        };
        let url = match &self.desc.url {
            UrlSpec::Column(column) if self.url_column_present => {
                non_blank(field(column.as_str())).unwrap_or_else(|| DEFAULT_URL_SENTINEL.to_string())
            }
            UrlSpec::Column(_) => DEFAULT_URL_SENTINEL.to_string(),
            UrlSpec::Sentinel(sentinel) => sentinel.clone(),
        };
        Some(Document { source, content, url })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn unreadable(origin: &Path, source: std::io::Error) -> LoadError {
    LoadError::SourceUnreadable { origin: origin.to_path_buf(), source }
}

fn csv_error(origin: &Path, err: csv::Error) -> LoadError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => unreadable(origin, source),
        other => LoadError::SourceParse { origin: origin.to_path_buf(), reason: format!("{other:?}") },
    }
}

fn load_csv(desc: &SourceDescriptor, report: &mut SourceReport) -> Result<Vec<Document>, LoadError> {
    let origin = desc.origin.as_path();
    let delimiter = u8::try_from(desc.delimiter).map_err(|_| LoadError::InvalidDescriptor {
        origin: origin.to_path_buf(),
        reason: "delimiter must be ASCII".into(),
    })?;
    let file = File::open(origin).map_err(|e| unreadable(origin, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers().map_err(|e| csv_error(origin, e))?.clone();
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (i, name) in headers.iter().enumerate() {
        let name = name.trim_start_matches('\u{feff}').trim().to_string();
        columns.entry(name).or_insert(i);
    }

    let mut mapper = RowMapper::new(desc);
    mapper.url_column_present = validate_columns(desc, |name| columns.contains_key(name))?;

    let mut docs = Vec::new();
    for result in rdr.records() {
        report.rows_read += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_error(origin, e)),
            Err(e) => {
                tracing::debug!(origin = %origin.display(), row = report.rows_read, error = %e, "skipping malformed row");
                report.rows_malformed += 1;
                continue;
            }
        };
        if record.len() > headers.len() {
            tracing::debug!(origin = %origin.display(), row = report.rows_read, fields = record.len(), "skipping row with extra fields");
            report.rows_malformed += 1;
            continue;
        }
        let field = |name: &str| columns.get(name).and_then(|&i| record.get(i)).map(str::to_string);
        match mapper.map(field) {
            Some(doc) => docs.push(doc),
            None => report.rows_empty += 1,
        }
    }
    Ok(docs)
}

/// Missing text columns are tolerated unless all are missing; a missing label column is fatal
/// and a missing url column falls back to the sentinel. Returns whether the url column exists.
fn validate_columns<F>(desc: &SourceDescriptor, has_column: F) -> Result<bool, LoadError>
where
    F: Fn(&str) -> bool,
{
    let origin = desc.origin.display();
    let missing_text: Vec<String> = desc
        .text_fields
        .iter()
        .filter(|f| !has_column(f.as_str()))
        .cloned()
        .collect();
    let mut fatal = Vec::new();
    if missing_text.len() == desc.text_fields.len() {
        fatal.extend(missing_text.iter().cloned());
    } else {
        for column in &missing_text {
            tracing::warn!(origin = %origin, column = %column, "text column missing; treated as empty");
        }
    }
    if let LabelSpec::Column(column) = &desc.label {
        if !has_column(column) {
            fatal.push(column.clone());
        }
    }
    if !fatal.is_empty() {
        return Err(LoadError::MissingColumns { origin: desc.origin.clone(), columns: fatal });
    }
    if let UrlSpec::Column(column) = &desc.url {
        if !has_column(column) {
            tracing::warn!(origin = %origin, column = %column, "url column missing; using sentinel");
            return Ok(false);
        }
    }
    Ok(true)
}

fn json_field(obj: &serde_json::Map<String, serde_json::Value>, name: &str) -> Option<String> {
    match obj.get(name)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accumulates JSON rows. Objects carry no header, so column checks run on the union of their keys.
struct JsonRows<'a> {
    mapper: RowMapper<'a>,
    keys: HashSet<String>,
    objects: usize,
    docs: Vec<Document>,
}

impl<'a> JsonRows<'a> {
    fn new(desc: &'a SourceDescriptor) -> Self {
        Self { mapper: RowMapper::new(desc), keys: HashSet::new(), objects: 0, docs: Vec::new() }
    }

    fn push(&mut self, value: &serde_json::Value, report: &mut SourceReport) {
        report.rows_read += 1;
        let Some(obj) = value.as_object() else {
            report.rows_malformed += 1;
            return;
        };
        self.objects += 1;
        self.keys.extend(obj.keys().cloned());
        match self.mapper.map(|name| json_field(obj, name)) {
            Some(doc) => self.docs.push(doc),
            None => report.rows_empty += 1,
        }
    }

    fn finish(self) -> Result<Vec<Document>, LoadError> {
        if self.objects > 0 {
            validate_columns(self.mapper.desc, |name| self.keys.contains(name))?;
        }
        Ok(self.docs)
    }
}

fn load_jsonl(desc: &SourceDescriptor, report: &mut SourceReport) -> Result<Vec<Document>, LoadError> {
    let origin = desc.origin.as_path();
    let f = File::open(origin).map_err(|e| unreadable(origin, e))?;
    let reader = BufReader::new(f);
    let mut rows = JsonRows::new(desc);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                report.rows_read += 1;
                report.rows_malformed += 1;
                continue;
            }
            Err(e) => return Err(unreadable(origin, e)),
        };
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => rows.push(&value, report),
            Err(e) => {
                tracing::debug!(origin = %origin.display(), error = %e, "skipping malformed line");
                report.rows_read += 1;
                report.rows_malformed += 1;
            }
        }
    }
    rows.finish()
}

fn load_json(desc: &SourceDescriptor, report: &mut SourceReport) -> Result<Vec<Document>, LoadError> {
    let origin = desc.origin.as_path();
    let f = File::open(origin).map_err(|e| unreadable(origin, e))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            unreadable(origin, e.into())
        } else {
            LoadError::SourceParse { origin: origin.to_path_buf(), reason: e.to_string() }
        }
    })?;
    let mut rows = JsonRows::new(desc);
    match &json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                rows.push(v, report);
            }
        }
        serde_json::Value::Object(_) => rows.push(&json, report),
        _ => {
            return Err(LoadError::SourceParse {
                origin: origin.to_path_buf(),
                reason: "expected a JSON array or object".into(),
            })
        }
    }
    rows.finish()
}
