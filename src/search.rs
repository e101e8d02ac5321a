use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static RESULT_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").unwrap());

/// Discovers candidate pages for a product query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

/// Web search against DuckDuckGo's HTML-only endpoint, which serves stable
/// markup without JavaScript or a results API key.
pub struct DuckDuckGo {
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let html = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("failed to read search results page")?;

        let urls = parse_results(&html, max_results);
        debug!("search '{}' yielded {} candidate url(s)", query, urls.len());
        Ok(urls)
    }
}

/// Pull organic result targets out of a results page, in page order.
fn parse_results(html: &str, max_results: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&RESULT_LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(resolve_target)
        .filter(|u| u.starts_with("http") && !u.contains("duckduckgo.com"))
        .take(max_results)
        .collect()
}

/// Result anchors point at a redirect of the form
/// `//duckduckgo.com/l/?uddg=<percent-encoded target>`; unwrap it.
fn resolve_target(href: &str) -> Option<String> {
    if !href.contains("duckduckgo.com/l/") {
        return Some(href.to_string());
    }
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <div class="results">
          <h2 class="result__title">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fshop.example%2Fbolt%2F42&amp;rut=abc">Bolt 42</a>
          </h2>
          <h2 class="result__title">
            <a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Sponsored</a>
          </h2>
          <h2 class="result__title">
            <a class="result__a" href="https://other.example/p/7">Other</a>
          </h2>
          <a href="https://nav.example/ignored">nav link without result class</a>
        </div>"#;

    #[test]
    fn parses_results_in_page_order() {
        let urls = parse_results(RESULTS_PAGE, 10);
        assert_eq!(
            urls,
            vec![
                "https://shop.example/bolt/42".to_string(),
                "https://other.example/p/7".to_string(),
            ]
        );
    }

    #[test]
    fn respects_max_results() {
        let urls = parse_results(RESULTS_PAGE, 1);
        assert_eq!(urls, vec!["https://shop.example/bolt/42".to_string()]);
    }

    #[test]
    fn empty_page_yields_no_urls() {
        assert!(parse_results("<html><body>No results.</body></html>", 5).is_empty());
    }

    #[test]
    fn redirect_wrapper_is_percent_decoded() {
        let target = resolve_target("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%20b");
        assert_eq!(target.as_deref(), Some("https://example.com/a b"));
    }

    #[test]
    fn direct_links_pass_through() {
        assert_eq!(
            resolve_target("https://example.com/p/1").as_deref(),
            Some("https://example.com/p/1")
        );
    }

    #[test]
    fn wrapper_without_target_is_dropped() {
        assert_eq!(resolve_target("//duckduckgo.com/l/?other=1"), None);
    }
}
