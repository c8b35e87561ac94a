//! Retrieval orchestrator.
//!
//! Resolves a query to exactly one context: the closest internal document
//! inside a distance tier, else the top web result, else a fixed
//! "nothing found" context. Results are cached per exact query string.
//! Index and web failures never escape [`Retriever::resolve`]; they degrade
//! to the next source and are reported in [`Resolution::errors`].

use crate::cache::ResultCache;
use crate::config::{CacheConfig, RetrievalConfig};
use crate::index::VectorIndex;
use crate::models::{RetrievalResult, ScoredDocument, SourceKind, WebHit};
use crate::websearch::WebSearch;

pub const NOTHING_FOUND: &str = "No relevant information was found.";
const UNKNOWN_SOURCE: &str = "unknown document";

/// Outcome of one [`Retriever::resolve`] call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub result: RetrievalResult,
    /// Failures swallowed on the way to `result`, in the order they happened.
    pub errors: Vec<String>,
    pub cached: bool,
}

pub struct Retriever {
    index: Box<dyn VectorIndex>,
    web: Box<dyn WebSearch>,
    doc_cache: ResultCache,
    web_cache: ResultCache,
    k: usize,
    max_distances: Vec<f32>,
}

impl Retriever {
    pub fn new(
        index: Box<dyn VectorIndex>,
        web: Box<dyn WebSearch>,
        retrieval: &RetrievalConfig,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            index,
            web,
            doc_cache: ResultCache::from_config(cache),
            web_cache: ResultCache::from_config(cache),
            k: retrieval.k,
            max_distances: retrieval.max_distances.clone(),
        }
    }

    pub async fn resolve(&self, query: &str) -> Resolution {
        if let Some(result) = self
            .doc_cache
            .get(query)
            .or_else(|| self.web_cache.get(query))
        {
            tracing::debug!(source_kind = result.source_kind.as_str(), "retrieval cache hit");
            return Resolution {
                result,
                errors: Vec::new(),
                cached: true,
            };
        }

        let mut errors = Vec::new();

        match self.index.search(query, self.k).await {
            Ok(docs) => {
                if let Some(doc) = self.accept(&docs) {
                    let result = internal_result(doc);
                    self.doc_cache.insert(query, result.clone());
                    return Resolution {
                        result,
                        errors,
                        cached: false,
                    };
                }
                tracing::debug!(candidates = docs.len(), "no document within distance tiers");
            }
            Err(err) => {
                tracing::warn!(error = %err, "vector index unavailable, falling back to web search");
                errors.push(err.to_string());
            }
        }

        let result = match self.web.search(query).await {
            Ok(Some(hit)) => web_result(&hit),
            Ok(None) => nothing_found(),
            Err(err) => {
                tracing::warn!(error = %err, "web search failed");
                errors.push(err.to_string());
                nothing_found()
            }
        };
        self.web_cache.insert(query, result.clone());
        Resolution {
            result,
            errors,
            cached: false,
        }
    }

    /// The lowest-distance document inside the first tier that admits one.
    fn accept<'a>(&self, docs: &'a [ScoredDocument]) -> Option<&'a ScoredDocument> {
        let best = docs
            .iter()
            .filter(|d| d.distance.is_finite())
            .min_by(|a, b| a.distance.total_cmp(&b.distance))?;
        let tier = self.max_distances.iter().position(|max| best.distance <= *max)?;
        tracing::debug!(tier, distance = best.distance, "document accepted");
        Some(best)
    }
}

fn internal_result(doc: &ScoredDocument) -> RetrievalResult {
    let label = doc.source().unwrap_or(UNKNOWN_SOURCE).to_string();
    RetrievalResult {
        content: format!("Source: internal document ({})\n{}", label, doc.text),
        source_kind: SourceKind::InternalDoc,
        source_label: label,
    }
}

fn web_result(hit: &WebHit) -> RetrievalResult {
    RetrievalResult {
        content: format!(
            "Source: web search\nTitle: {}\nSummary: {}\nLink: {}",
            hit.title, hit.snippet, hit.url
        ),
        source_kind: SourceKind::Web,
        source_label: if hit.url.is_empty() {
            "web search".to_string()
        } else {
            hit.url.clone()
        },
    }
}

fn nothing_found() -> RetrievalResult {
    RetrievalResult {
        content: NOTHING_FOUND.to_string(),
        source_kind: SourceKind::None,
        source_label: "none".to_string(),
    }
}
