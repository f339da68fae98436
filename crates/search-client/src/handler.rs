//! Search orchestration: cache lookup, provider call, pricing, degradation.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::{CacheEntry, CacheStats, SearchCache};
use crate::provider::SearchProvider;
use crate::sources::extract_sources;

/// Flat provider rate: minor units per million tokens.
///
/// Distinct from the language-model price tables.
pub const SEARCH_RATE_CENTS_PER_MTOK: f64 = 100.0;

const DISABLED_FALLBACK: &str = "La búsqueda de información actual no está disponible en este \
momento. Responderé basándome en mi conocimiento general.";

const FAILURE_FALLBACK: &str = "No pude obtener información actualizada en este momento. Te \
ayudo con mi conocimiento general sobre el tema.";

/// Result of one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Whether the provider produced usable content.
    pub success: bool,
    /// Formatted content (or an apologetic placeholder on failure).
    pub content: String,
    /// Extracted source URLs, capped at five.
    pub sources: Vec<String>,
    /// Tokens consumed by the live call; zero on cache hit or failure.
    pub tokens_used: u32,
    /// Estimated cost in minor units; zero on cache hit or failure.
    pub cost_cents: i64,
    /// Whether the result came from the cache.
    pub served_from_cache: bool,
}

impl SearchOutcome {
    fn failed(content: &str) -> Self {
        Self {
            success: false,
            content: content.to_string(),
            sources: Vec::new(),
            tokens_used: 0,
            cost_cents: 0,
            served_from_cache: false,
        }
    }
}

/// Estimate the cost of a live search at the flat provider rate.
pub fn estimate_cost_cents(tokens: u32) -> i64 {
    (f64::from(tokens) / 1_000_000.0 * SEARCH_RATE_CENTS_PER_MTOK).round() as i64
}

/// Cached, priced access to the search provider.
///
/// Never returns an error: search failure degrades to "answer from general
/// knowledge" via an apologetic placeholder with zero cost.
pub struct SearchHandler {
    provider: SearchProvider,
    cache: Mutex<SearchCache>,
}

impl SearchHandler {
    /// Create a handler with the default 24h cache TTL.
    pub fn new(provider: SearchProvider) -> Self {
        Self::with_ttl(provider, crate::cache::DEFAULT_CACHE_TTL)
    }

    /// Create a handler with a custom cache TTL.
    pub fn with_ttl(provider: SearchProvider, ttl: Duration) -> Self {
        Self {
            provider,
            cache: Mutex::new(SearchCache::new(ttl)),
        }
    }

    /// Whether live search can run at all.
    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    /// Execute one search, consulting the cache first.
    pub async fn search(&self, query: &str, focus_sites: Option<&[String]>) -> SearchOutcome {
        if !self.provider.is_enabled() {
            warn!("search requested but not enabled");
            return SearchOutcome::failed(DISABLED_FALLBACK);
        }

        let key = SearchCache::cache_key(query, focus_sites);

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                info!(query, "returning cached search result");
                return SearchOutcome {
                    success: true,
                    content: entry.content,
                    sources: entry.sources,
                    tokens_used: 0,
                    cost_cents: 0,
                    served_from_cache: true,
                };
            }
        }

        let answer = match self.provider.current_info(query, focus_sites).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(query, "search failed: {}", e);
                return SearchOutcome::failed(FAILURE_FALLBACK);
            }
        };

        let sources = extract_sources(&answer.content);
        let content = format_results(&answer.content, &sources);
        let cost_cents = estimate_cost_cents(answer.total_tokens);

        {
            let mut cache = self.cache.lock().await;
            cache.insert(
                key,
                CacheEntry {
                    content: content.clone(),
                    sources: sources.clone(),
                    tokens_used: answer.total_tokens,
                    inserted_at: std::time::Instant::now(),
                },
            );
        }

        info!(
            query,
            tokens = answer.total_tokens,
            sources = sources.len(),
            cost_cents,
            "search completed"
        );

        SearchOutcome {
            success: true,
            content,
            sources,
            tokens_used: answer.total_tokens,
            cost_cents,
            served_from_cache: false,
        }
    }

    /// Purge expired cache entries, returning how many were removed.
    pub async fn clean_cache(&self) -> usize {
        let mut cache = self.cache.lock().await;
        cache.clean()
    }

    /// Cache diagnostics.
    pub async fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock().await;
        cache.stats()
    }
}

/// Append the consulted-sources trailer and a freshness line.
fn format_results(content: &str, sources: &[String]) -> String {
    let mut formatted = content.to_string();

    if !sources.is_empty() {
        formatted.push_str("\n\n📚 **Fuentes consultadas:**");
        for (index, source) in sources.iter().enumerate() {
            formatted.push_str(&format!("\n{}. {}", index + 1, source));
        }
    }

    formatted.push_str("\n\n🔄 *Información actualizada consultada en tiempo real*");
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SearchConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handler_for(server_uri: &str, ttl: Duration) -> SearchHandler {
        let config = SearchConfig::builder()
            .api_key("test-key")
            .api_url(server_uri)
            .build();
        SearchHandler::with_ttl(SearchProvider::new(config).unwrap(), ttl)
    }

    fn provider_body(content: &str, total_tokens: u32) -> serde_json::Value {
        serde_json::json!({
            "usage": {"prompt_tokens": 50, "completion_tokens": 100, "total_tokens": total_tokens},
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": content}
            }]
        })
    }

    #[test]
    fn test_estimate_cost_cents() {
        assert_eq!(estimate_cost_cents(1_000_000), 100);
        assert_eq!(estimate_cost_cents(500_000), 50);
        // Small searches round to zero cents.
        assert_eq!(estimate_cost_cents(300), 0);
    }

    #[test]
    fn test_format_results_numbers_sources() {
        let formatted = format_results(
            "contenido",
            &["https://boe.es/".to_string(), "https://sepe.es/".to_string()],
        );
        assert!(formatted.contains("Fuentes consultadas"));
        assert!(formatted.contains("1. https://boe.es/"));
        assert!(formatted.contains("2. https://sepe.es/"));
        assert!(formatted.contains("tiempo real"));
    }

    #[tokio::test]
    async fn test_disabled_search_degrades() {
        let handler = SearchHandler::new(
            SearchProvider::new(SearchConfig::builder().enabled(false).build()).unwrap(),
        );

        let outcome = handler.search("tasas NIE", None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.cost_cents, 0);
        assert!(outcome.content.contains("conocimiento general"));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let handler = handler_for(&server.uri(), Duration::from_secs(60));
        let outcome = handler.search("tasas NIE", None).await;

        assert!(!outcome.success);
        assert_eq!(outcome.tokens_used, 0);
        assert_eq!(outcome.cost_cents, 0);
    }

    #[tokio::test]
    async fn test_repeat_query_served_from_cache_with_zero_cost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_body(
                "Tasa vigente: ver https://www.boe.es/",
                400_000,
            )))
            // The second identical query must not reach the provider.
            .expect(1)
            .mount(&server)
            .await;

        let handler = handler_for(&server.uri(), Duration::from_secs(60));

        let first = handler.search("tasas NIE 2024", None).await;
        assert!(first.success);
        assert!(!first.served_from_cache);
        assert_eq!(first.cost_cents, 40);
        assert_eq!(first.sources, vec!["https://www.boe.es/".to_string()]);

        let second = handler.search("  Tasas NIE 2024 ", None).await;
        assert!(second.success);
        assert!(second.served_from_cache);
        assert_eq!(second.cost_cents, 0);
        assert_eq!(second.tokens_used, 0);
        assert_eq!(second.sources, first.sources);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(provider_body("contenido", 100)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let handler = handler_for(&server.uri(), Duration::from_millis(30));

        let first = handler.search("tasas", None).await;
        assert!(!first.served_from_cache);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let second = handler.search("tasas", None).await;
        assert!(!second.served_from_cache);
    }

    #[tokio::test]
    async fn test_clean_cache_and_stats() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(provider_body("contenido", 100)),
            )
            .mount(&server)
            .await;

        let handler = handler_for(&server.uri(), Duration::from_millis(20));
        handler.search("tasas", None).await;

        assert_eq!(handler.cache_stats().await.size, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(handler.clean_cache().await, 1);
        assert_eq!(handler.cache_stats().await.size, 0);
    }
}
