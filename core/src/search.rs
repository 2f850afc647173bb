use crate::error::SearchError;
use crate::index::{DocId, Document, Index, SparseVector, TermId};
use serde::Serialize;
use std::collections::HashMap;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit<'a> {
    pub doc_id: DocId,
    pub score: f32,
    pub document: &'a Document,
}

impl Index {
    /// Map a query into the index's vector space. Terms outside the vocabulary are ignored.
    pub fn project(&self, query: &str) -> SparseVector {
        let mut tf_q_raw: HashMap<TermId, u32> = HashMap::new();
        for term in self.settings.tokenizer.tokenize(query) {
            if let Some(tid) = self.vocabulary.get(&term) {
                *tf_q_raw.entry(tid).or_insert(0) += 1;
            }
        }
        let tf = self.settings.weighting.tf;
        let entries = tf_q_raw
            .into_iter()
            .map(|(tid, raw)| (tid, tf.weight(raw) * self.vocabulary.idf(tid)))
            .collect();
        SparseVector::from_entries(entries)
    }

    /// Cosine similarity of the query against every document, in document order.
    pub fn scores(&self, query: &SparseVector) -> Vec<f32> {
        let mut dots = vec![0.0f32; self.documents.len()];
        if query.norm() == 0.0 {
            return dots;
        }
        // entries are sorted by term id, so accumulation order is fixed
        for &(tid, q_w) in query.entries() {
            if let Some(postings) = self.postings.get(tid as usize) {
                for p in postings {
                    dots[p.doc_id as usize] += q_w * p.weight;
                }
            }
        }
        for (dot, row) in dots.iter_mut().zip(self.matrix.rows()) {
            let denom = query.norm() * row.norm();
            *dot = if denom == 0.0 { 0.0 } else { *dot / denom };
        }
        dots
    }

    /// Top `k` documents by cosine similarity, best first. Equal scores keep document-set order.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Hit<'_>>, SearchError> {
        if k == 0 {
            return Err(SearchError::InvalidTopK(k));
        }
        if !self.is_usable() {
            return Err(SearchError::IndexUnusable);
        }
        let q = self.project(query);
        let scores = self.scores(&q);
        let hits = rank_top_k(&scores, k)
            .into_iter()
            .map(|(doc_id, score)| Hit { doc_id, score, document: &self.documents[doc_id as usize] })
            .collect::<Vec<_>>();
        tracing::debug!(query, k, query_terms = q.entries().len(), returned = hits.len(), "search");
        Ok(hits)
    }
}

/// Stable sort by descending score, then truncate to `k`.
pub fn rank_top_k(scores: &[f32], k: usize) -> Vec<(DocId, f32)> {
    let mut scored: Vec<(DocId, f32)> = scores
        .iter()
        .enumerate()
        .map(|(i, &s)| (i as DocId, s))
        .collect();
    // sort_by is stable, so ties stay in document order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}
