//! Retrieval core: corpus loading, TF-IDF vector space, cosine ranking and answer synthesis.

pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod search;
pub mod synth;
pub mod tokenizer;

pub use config::{CorpusConfig, LabelSpec, SourceDescriptor, SourceFormat, SynthesisConfig, UrlSpec};
pub use corpus::{load_corpus, LoadReport, SourceReport};
pub use error::{ConfigError, LoadError, SearchError, SynthesisError};
pub use index::{DocId, Document, Index, IndexSettings, IndexStats, TermId};
pub use search::Hit;
pub use synth::{ask, Answer, ChatCompletionsSynthesizer, Synthesizer};

/// A freshly built index and the report of how its corpus was loaded.
#[derive(Debug)]
pub struct BuiltIndex {
    pub index: Index,
    pub report: LoadReport,
}

/// Load every configured source and build the index. Runs to completion before any query is served.
pub fn build_index(config: &CorpusConfig) -> Result<BuiltIndex, LoadError> {
    build_from_sources(&config.sources, &config.index_settings())
}

pub fn build_from_sources(sources: &[SourceDescriptor], settings: &IndexSettings) -> Result<BuiltIndex, LoadError> {
    let corpus = load_corpus(sources)?;
    let index = Index::build(corpus.documents, settings);
    Ok(BuiltIndex { index, report: corpus.report })
}
