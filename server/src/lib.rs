use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sitesearch_core::persist::load_index;
use sitesearch_core::query::raw_terms;
use sitesearch_core::snippet::highlight;
use sitesearch_core::{DocId, QueryEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub highlight: bool,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub partial: bool,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub id: String,
    pub score: f32,
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Clone, Default)]
pub struct ServerConfig {
    pub admin_token: Option<String>,
    /// Comma-separated origins; any origin when unset or unparsable.
    pub cors_allow_origin: Option<String>,
    /// Per-query budget for score accumulation.
    pub query_deadline: Option<Duration>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
            query_deadline: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_path: PathBuf,
    /// Queries clone the inner `Arc` and drop the lock before doing any work.
    pub engine: Arc<RwLock<Arc<QueryEngine>>>,
    pub admin_token: Option<String>,
    pub query_deadline: Option<Duration>,
}

impl AppState {
    pub fn engine(&self) -> Arc<QueryEngine> {
        self.engine.read().clone()
    }
}

fn open_engine(index_path: &std::path::Path) -> Result<QueryEngine> {
    let index = load_index(index_path).with_context(|| format!("loading index {}", index_path.display()))?;
    tracing::info!(path = %index_path.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "index loaded");
    Ok(QueryEngine::new(index))
}

fn cors_layer(allow: Option<&str>) -> CorsLayer {
    match allow {
        Some(val) => {
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
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

pub fn build_app(index_path: impl Into<PathBuf>, config: ServerConfig) -> Result<Router> {
    // Load the index at startup; a bad index is fatal here
    let index_path = index_path.into();
    let engine = open_engine(&index_path)?;
    let app_state = AppState {
        index_path,
        engine: Arc::new(RwLock::new(Arc::new(engine))),
        admin_token: config.admin_token,
        query_deadline: config.query_deadline,
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors_layer(config.cors_allow_origin.as_deref()))
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = Instant::now();
    let engine = state.engine();
    let hits = match state.query_deadline {
        Some(budget) => engine.search_with_deadline(&params.q, start + budget),
        None => engine.search(&params.q),
    };
    let total_hits = hits.total();
    let partial = hits.is_partial();
    let k = params.k.clamp(1, 100);

    // Capture raw query terms for snippets and highlighting
    let terms = raw_terms(&params.q);
    let results: Vec<SearchHit> = hits
        .take(k)
        .filter_map(|scored| engine.render(scored, &terms))
        .map(|hit| SearchHit {
            snippet: if params.highlight { highlight(&hit.snippet, &terms) } else { hit.snippet },
            doc_id: hit.doc_id,
            id: hit.id,
            score: hit.score,
            title: hit.title,
            url: hit.url,
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, returned = results.len(), "search");
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, partial, results })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let engine = state.engine();
    match engine.index().doc(doc_id) {
        Some(meta) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "id": meta.external_id,
            "title": meta.title,
            "url": meta.url,
            "excerpt": meta.excerpt,
            "teaser": meta.teaser,
            "categories": meta.categories,
            "tags": meta.tags,
        }))),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

/// Re-read the index file. The running index is replaced only if the new one
/// loads and validates.
async fn reload_handler(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let path = state.index_path.clone();
    let loaded = tokio::task::spawn_blocking(move || open_engine(&path))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match loaded {
        Ok(engine) => {
            let num_docs = engine.index().num_docs();
            *state.engine.write() = Arc::new(engine);
            Ok(Json(serde_json::json!({ "reloaded": true, "num_docs": num_docs })))
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "reload failed, keeping current index");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
