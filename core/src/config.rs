use crate::error::ConfigError;
use crate::index::{IndexSettings, Weighting};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_URL_SENTINEL: &str = "N/A";

fn default_separator() -> String { ". ".to_string() }
fn default_delimiter() -> char { ',' }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    #[default]
    Csv,
    /// A JSON array of objects, or a single object.
    Json,
    /// One JSON object per line.
    Jsonl,
}

/// Where a document's `source` label comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSpec {
    Literal(String),
    Column(String),
}

/// Where a document's `url` comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSpec {
    Column(String),
    Sentinel(String),
}

impl Default for UrlSpec {
    fn default() -> Self { UrlSpec::Sentinel(DEFAULT_URL_SENTINEL.to_string()) }
}

/// One tabular origin and the mapping from its columns to documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub origin: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    /// CSV field delimiter, a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Fields concatenated, in order, into the document content.
    pub text_fields: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    pub label: LabelSpec,
    #[serde(default)]
    pub url: UrlSpec,
}

impl SourceDescriptor {
    pub fn new(origin: impl Into<PathBuf>, text_fields: &[&str], label: LabelSpec) -> Self {
        Self {
            origin: origin.into(),
            format: SourceFormat::default(),
            delimiter: default_delimiter(),
            text_fields: text_fields.iter().map(|f| f.to_string()).collect(),
            separator: default_separator(),
            label,
            url: UrlSpec::default(),
        }
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_url(mut self, url: UrlSpec) -> Self {
        self.url = url;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.problem() {
            Some(reason) => Err(ConfigError::Invalid(format!("source {}: {reason}", self.origin.display()))),
            None => Ok(()),
        }
    }

    /// First reason this descriptor cannot be loaded, if any.
    pub fn problem(&self) -> Option<&'static str> {
        if self.text_fields.is_empty() {
            return Some("text_fields is empty");
        }
        if self.text_fields.iter().any(|f| f.trim().is_empty()) {
            return Some("blank text field name");
        }
        if !self.delimiter.is_ascii() {
            return Some("delimiter must be ASCII");
        }
        match &self.label {
            LabelSpec::Column(c) if c.trim().is_empty() => return Some("blank label column"),
            _ => {}
        }
        if let UrlSpec::Column(c) = &self.url {
            if c.trim().is_empty() {
                return Some("blank url column");
            }
        }
        None
    }
}

fn default_model() -> String { "gpt-4.1-mini".to_string() }
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_timeout_secs() -> u64 { 60 }

/// OpenAI-compatible chat-completions endpoint used for answer synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level corpus configuration, usually read from a TOML file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub tokenizer: Tokenizer,
    #[serde(default)]
    pub weighting: Weighting,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl CorpusConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and validate a config file. Relative source origins are resolved against the file's directory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let mut config = Self::from_toml_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        if let Some(base) = path.parent() {
            config.resolve_origins(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings { tokenizer: self.tokenizer.clone(), weighting: self.weighting }
    }

    pub fn resolve_origins(&mut self, base: &Path) {
        for source in self.sources.iter_mut() {
            if source.origin.is_relative() {
                source.origin = base.join(&source.origin);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}
