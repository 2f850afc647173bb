use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use regdocs_core::tokenizer::is_stopword;
use regdocs_core::{ask, DocId, Hit, Index, SearchError, Synthesizer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

#[derive(Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub top_k: usize,
}

/// Body of `POST /api/search`.
#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub top_k: usize,
}

/// Element of the `POST /api/search` response.
#[derive(Serialize)]
pub struct DocumentResult {
    pub source: String,
    pub content: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
    pub answer: Option<String>,
    pub synthesis_error: Option<String>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
    pub source: String,
    pub content: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub documents_loaded: usize,
    pub vocabulary_size: usize,
    pub built_at: String,
}

/// Shared, read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<Index>,
    pub synthesizer: Option<Arc<dyn Synthesizer>>,
}

type ApiError = (StatusCode, String);

/// The index must be fully built before the router exists; there is no not-ready phase.
pub fn build_app(index: Index, synthesizer: Option<Arc<dyn Synthesizer>>) -> Router {
    let app_state = AppState { index: Arc::new(index), synthesizer };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    // Routes used by the web frontend
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(api_search_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/ask", post(ask_handler))
        .nest("/api", api)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.index.stats();
    Json(HealthResponse {
        status: "ok",
        documents_loaded: stats.documents,
        vocabulary_size: stats.vocabulary_size,
        built_at: stats.built_at,
    })
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let hits = state.index.search(&params.q, k).map_err(search_error)?;
    let results = to_results(&hits, &params.q);
    Ok(Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), results }))
}

pub async fn api_search_handler(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Result<Json<Vec<DocumentResult>>, ApiError> {
    let k = req.top_k.clamp(1, MAX_K);
    let hits = state.index.search(&req.query, k).map_err(search_error)?;
    let results = hits
        .iter()
        .map(|hit| DocumentResult {
            source: hit.document.source.clone(),
            content: hit.document.content.clone(),
            url: hit.document.url.clone(),
        })
        .collect();
    Ok(Json(results))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.index.document(doc_id) {
        Some(doc) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "source": doc.source,
            "content": doc.content,
            "url": doc.url,
        }))),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

pub async fn ask_handler(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Result<Json<AskResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = req.top_k.clamp(1, MAX_K);
    let (results, answer, synthesis_error) = match &state.synthesizer {
        Some(synthesizer) => {
            let outcome = ask(&state.index, synthesizer.as_ref(), &req.query, k).await.map_err(search_error)?;
            let results = to_results(&outcome.hits, &req.query);
            match outcome.answer {
                Ok(text) => (results, Some(text), None),
                Err(e) => (results, None, Some(e.to_string())),
            }
        }
        None => {
            let hits = state.index.search(&req.query, k).map_err(search_error)?;
            (to_results(&hits, &req.query), None, Some("synthesis failed: no synthesizer configured".to_string()))
        }
    };
    Ok(Json(AskResponse { query: req.query, took_s: start.elapsed().as_secs_f64(), results, answer, synthesis_error }))
}

fn search_error(err: SearchError) -> ApiError {
    match err {
        SearchError::IndexUnusable => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        SearchError::InvalidTopK(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn to_results(hits: &[Hit<'_>], query: &str) -> Vec<SearchHit> {
    // Capture raw query terms for highlighting
    let raw_terms: Vec<String> = query
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| s.chars().count() > 1 && !is_stopword(&s.to_lowercase()))
        .collect();
    hits.iter()
        .map(|hit| SearchHit {
            doc_id: hit.doc_id,
            score: hit.score,
            source: hit.document.source.clone(),
            content: hit.document.content.clone(),
            url: hit.document.url.clone(),
            snippet: snippet(&hit.document.content, &raw_terms),
        })
        .collect()
}

fn terms_regex(terms: &[String]) -> Option<regex::Regex> {
    if terms.is_empty() { return None; }
    let alternation = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    regex::RegexBuilder::new(&alternation).case_insensitive(true).build().ok()
}

/// A window of the text around the first matching term, with matches wrapped in `<em>`.
pub fn snippet(text: &str, raw_terms: &[String]) -> String {
    let pat = terms_regex(raw_terms);
    let window = match pat.as_ref().and_then(|p| p.find(text)) {
        Some(m) => {
            let start = floor_boundary(text, m.start().saturating_sub(SNIPPET_BEFORE));
            let end = ceil_boundary(text, (m.start() + SNIPPET_AFTER).min(text.len()));
            &text[start..end]
        }
        None => &text[..ceil_boundary(text, SNIPPET_AFTER.min(text.len()))],
    };
    match pat {
        Some(p) => p.replace_all(window, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned(),
        None => window.to_string(),
    }
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while !text.is_char_boundary(i) { i -= 1; }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    while !text.is_char_boundary(i) { i += 1; }
    i
}
