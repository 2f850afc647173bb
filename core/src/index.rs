use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;

pub type TermId = u32;
/// Position of a document in the document set.
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Provenance label.
    pub source: String,
    /// Indexed text, never empty.
    pub content: String,
    /// Link to the document, or the source's sentinel.
    pub url: String,
}

impl Document {
    pub fn new(source: impl Into<String>, content: impl Into<String>, url: impl Into<String>) -> Self {
        Self { source: source.into(), content: content.into(), url: url.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermFrequency {
    /// Raw occurrence count.
    #[default]
    Raw,
    /// 1 + ln(count)
    Sublinear,
}

impl TermFrequency {
    pub fn weight(self, count: u32) -> f32 {
        if count == 0 { return 0.0; }
        match self {
            TermFrequency::Raw => count as f32,
            TermFrequency::Sublinear => 1.0 + (count as f32).ln(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InverseDocumentFrequency {
    /// ln(N / df); zero for a term present in every document.
    Plain,
    /// ln(1 + N / df); always positive.
    #[default]
    Smooth,
}

impl InverseDocumentFrequency {
    /// `num_docs` and `df` are floored at 1 so the ratio and the log stay finite.
    pub fn weight(self, num_docs: u32, df: u32) -> f32 {
        let n = num_docs.max(1) as f32;
        let df = df.max(1) as f32;
        match self {
            InverseDocumentFrequency::Plain => (n / df).ln(),
            InverseDocumentFrequency::Smooth => (1.0 + n / df).ln(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Weighting {
    pub tf: TermFrequency,
    pub idf: InverseDocumentFrequency,
}

/// Everything that shapes the vector space; documents and queries go through the same settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub tokenizer: Tokenizer,
    pub weighting: Weighting,
}

/// Term dictionary with ids assigned in first-encountered order.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    dictionary: HashMap<String, TermId>,
    terms: Vec<String>,
    df: Vec<u32>,
    idf: Vec<f32>,
}

impl Vocabulary {
    pub fn len(&self) -> usize { self.terms.len() }
    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
    pub fn get(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }
    pub fn term(&self, id: TermId) -> Option<&str> { self.terms.get(id as usize).map(String::as_str) }
    /// Number of documents containing the term.
    pub fn df(&self, id: TermId) -> u32 { self.df.get(id as usize).copied().unwrap_or(0) }
    pub fn idf(&self, id: TermId) -> f32 { self.idf.get(id as usize).copied().unwrap_or(0.0) }
    /// Terms in id order.
    pub fn terms(&self) -> impl Iterator<Item = &str> { self.terms.iter().map(String::as_str) }

    fn intern(&mut self, term: String) -> TermId {
        if let Some(&id) = self.dictionary.get(&term) { return id; }
        let id = self.terms.len() as TermId;
        self.terms.push(term.clone());
        self.dictionary.insert(term, id);
        self.df.push(0);
        id
    }
}

/// Sparse vector over a vocabulary: non-zero entries sorted by term id, plus the Euclidean magnitude.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(TermId, f32)>,
    norm: f32,
}

impl SparseVector {
    pub fn from_entries(mut entries: Vec<(TermId, f32)>) -> Self {
        entries.retain(|&(_, w)| w != 0.0);
        entries.sort_by_key(|&(t, _)| t);
        let norm = entries.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
        Self { entries, norm }
    }

    pub fn entries(&self) -> &[(TermId, f32)] { &self.entries }
    pub fn norm(&self) -> f32 { self.norm }
    pub fn is_zero(&self) -> bool { self.entries.is_empty() }

    pub fn weight(&self, term: TermId) -> f32 {
        match self.entries.binary_search_by_key(&term, |&(t, _)| t) {
            Ok(i) => self.entries[i].1,
            Err(_) => 0.0,
        }
    }
}

/// One row per document, row i aligned with document i.
#[derive(Debug, Clone, Default)]
pub struct WeightMatrix {
    rows: Vec<SparseVector>,
}

impl WeightMatrix {
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn row(&self, doc_id: DocId) -> Option<&SparseVector> { self.rows.get(doc_id as usize) }
    pub fn rows(&self) -> &[SparseVector] { &self.rows }
    pub fn non_zero(&self) -> usize { self.rows.iter().map(|r| r.entries.len()).sum() }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // raw tf-idf weight, not normalized
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub vocabulary_size: usize,
    pub non_zero_weights: usize,
    pub built_at: String,
}

/// Immutable TF-IDF index over a document set. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) documents: Vec<Document>,
    pub(crate) vocabulary: Vocabulary,
    pub(crate) matrix: WeightMatrix,
    /// postings[term] sorted by doc_id
    pub(crate) postings: Vec<Vec<Posting>>,
    pub(crate) settings: IndexSettings,
    built_at: String,
}

impl Index {
    /// Build the vocabulary, weight matrix and postings. An empty document set yields an unusable index.
    pub fn build(documents: Vec<Document>, settings: &IndexSettings) -> Self {
        let mut vocabulary = Vocabulary::default();
        let mut term_counts: Vec<Vec<(TermId, u32)>> = Vec::with_capacity(documents.len());

        for doc in &documents {
            let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
            for term in settings.tokenizer.tokenize(&doc.content) {
                let tid = vocabulary.intern(term);
                *tf_counts.entry(tid).or_insert(0) += 1;
            }
            for tid in tf_counts.keys() {
                vocabulary.df[*tid as usize] += 1;
            }
            let mut counts: Vec<(TermId, u32)> = tf_counts.into_iter().collect();
            counts.sort_by_key(|&(t, _)| t);
            term_counts.push(counts);
        }

        let num_docs = documents.len() as u32;
        vocabulary.idf = vocabulary
            .df
            .iter()
            .map(|&df| settings.weighting.idf.weight(num_docs, df))
            .collect();

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); vocabulary.len()];
        let mut rows = Vec::with_capacity(term_counts.len());
        for (doc_id, counts) in term_counts.into_iter().enumerate() {
            let entries: Vec<(TermId, f32)> = counts
                .into_iter()
                .map(|(tid, tf_raw)| (tid, settings.weighting.tf.weight(tf_raw) * vocabulary.idf[tid as usize]))
                .collect();
            let row = SparseVector::from_entries(entries);
            for &(tid, weight) in row.entries() {
                postings[tid as usize].push(Posting { doc_id: doc_id as DocId, weight });
            }
            rows.push(row);
        }

        let built_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        let index = Self {
            documents,
            vocabulary,
            matrix: WeightMatrix { rows },
            postings,
            settings: settings.clone(),
            built_at,
        };
        tracing::info!(
            num_docs = index.documents.len(),
            num_terms = index.vocabulary.len(),
            non_zero = index.matrix.non_zero(),
            "index built"
        );
        if !index.is_usable() {
            tracing::warn!("index has no documents; searches will fail until restart with data");
        }
        index
    }

    /// False when no documents were indexed.
    pub fn is_usable(&self) -> bool { !self.documents.is_empty() }
    pub fn len(&self) -> usize { self.documents.len() }
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
    pub fn documents(&self) -> &[Document] { &self.documents }
    pub fn document(&self, doc_id: DocId) -> Option<&Document> { self.documents.get(doc_id as usize) }
    pub fn vocabulary(&self) -> &Vocabulary { &self.vocabulary }
    pub fn matrix(&self) -> &WeightMatrix { &self.matrix }
    pub fn settings(&self) -> &IndexSettings { &self.settings }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.documents.len(),
            vocabulary_size: self.vocabulary.len(),
            non_zero_weights: self.matrix.non_zero(),
            built_at: self.built_at.clone(),
        }
    }
}
