use std::ops::RangeInclusive;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::extract::extract_prices;
use crate::fetch::PageFetcher;
use crate::search::SearchProvider;

/// Qualifier appended to every product query.
const QUERY_TERM: &str = "price";
/// Search results fetched per product.
pub const DEFAULT_MAX_RESULTS: usize = 3;
/// Jittered pause between fetches of one product's candidate pages.
const URL_DELAY_MS: RangeInclusive<u64> = 1_000..=3_000;
/// Names shorter than this after cleanup carry too little signal to search.
const MIN_NAME_LEN: usize = 3;

static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static CODE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{2,8}\b").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Row-level seam for the batch loop; lets tests script per-name outcomes.
#[async_trait]
pub trait ResolvePrice: Send + Sync {
    /// Resolve a raw product name to one representative price, or None when
    /// the web yields no usable signal.
    async fn resolve(&self, name: &str) -> Result<Option<f64>>;
}

pub struct ProductResolver {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    max_results: usize,
    url_delay_ms: RangeInclusive<u64>,
}

impl ProductResolver {
    pub fn new(search: Arc<dyn SearchProvider>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            search,
            fetcher,
            max_results: DEFAULT_MAX_RESULTS,
            url_delay_ms: URL_DELAY_MS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }
}

#[async_trait]
impl ResolvePrice for ProductResolver {
    async fn resolve(&self, name: &str) -> Result<Option<f64>> {
        let cleaned = normalize_name(name);
        if !usable_name(&cleaned) {
            warn!("product name '{}' is too short to search after cleanup", name);
            return Ok(None);
        }

        let query = format!("{cleaned} {QUERY_TERM}");
        debug!("searching: {}", query);
        let urls = match self.search.search(&query, self.max_results).await {
            Ok(urls) => urls,
            Err(e) => {
                // A lost search costs one row, not the batch.
                warn!("search failed for '{}': {}", name, e);
                return Ok(None);
            }
        };

        let mut candidates = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                jitter_sleep(self.url_delay_ms.clone()).await;
            }
            match self.fetcher.fetch(url).await {
                Ok(body) => {
                    let found = extract_prices(&body);
                    debug!("{} candidate(s) on {}", found.len(), url);
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!("skipping {}: {}", url, e);
                }
            }
        }

        let resolved = aggregate(&candidates);
        if let Some(price) = resolved {
            info!(
                "resolved '{}' to {:.2} from {} candidate(s)",
                name,
                price,
                candidates.len()
            );
        }
        Ok(resolved)
    }
}

/// Clean a catalog name for searching: punctuation becomes whitespace,
/// likely internal code tokens (short all-caps alphanumerics) are removed,
/// runs of whitespace collapse.
pub fn normalize_name(raw: &str) -> String {
    let no_punct = PUNCT_RE.replace_all(raw, " ");
    let no_codes = CODE_TOKEN_RE.replace_all(&no_punct, "");
    SPACE_RE.replace_all(&no_codes, " ").trim().to_string()
}

/// Whether a normalized name is worth sending to a search engine.
pub fn usable_name(normalized: &str) -> bool {
    normalized.chars().count() >= MIN_NAME_LEN
}

/// Sleep for a uniformly random number of milliseconds from `range`.
/// A range ending at zero disables the pause.
pub(crate) async fn jitter_sleep(range: RangeInclusive<u64>) {
    if *range.end() == 0 {
        return;
    }
    tokio::time::sleep(Duration::from_millis(fastrand::u64(range))).await;
}

// ── Tests ──
