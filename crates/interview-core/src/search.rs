// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Search Tool — resource lookup used by the Coach to back recommended
//! resources with real links.
//!
//! Grounded on `agents/tools/search_tool.py`: over-fetches by 4x (capped
//! at 40) to leave room for filtering out paid/book results, then trims
//! back down to the caller's requested count.

use async_trait::async_trait;

use crate::model::{Resource, ResourceType};

/// Domains known to host paywalled book listings rather than free
/// learning material; matched against the result URL.
const BOOK_DOMAINS: &[&str] = &[
    "amazon.com",
    "barnesandnoble.com",
    "oreilly.com",
    "packtpub.com",
    "manning.com",
];

/// Title substrings that indicate paid content, checked case-insensitively.
const PAID_CONTENT_INDICATORS: &[&str] =
    &["buy", "purchase", "paid", "premium", "subscription", "kindle", "paperback"];

/// A single raw search hit before it's adapted into a [`Resource`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Search backend seam. The real implementation calls out to a search
/// API; tests and offline runs use a fixed-result double.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Run a query, over-fetching to compensate for filtering, and return at
/// most `num_results` non-paid, non-book hits adapted to `resource_type`.
pub async fn search_resources(
    provider: &dyn SearchProvider,
    query: &str,
    num_results: usize,
    resource_type: ResourceType,
) -> Vec<Resource> {
    let search_count = (num_results * 4).min(40);
    let hits = provider.search(query, search_count).await.unwrap_or_default();

    hits.into_iter()
        .filter(|h| !is_book_or_paid(h))
        .take(num_results)
        .map(|h| Resource {
            title: h.title,
            url: h.url,
            description: h.description,
            resource_type,
            reasoning: String::new(),
            relevance_score: None,
            metadata: None,
        })
        .collect()
}

fn is_book_or_paid(hit: &SearchHit) -> bool {
    let url_lower = hit.url.to_ascii_lowercase();
    if BOOK_DOMAINS.iter().any(|d| url_lower.contains(d)) {
        return true;
    }
    let title_lower = hit.title.to_ascii_lowercase();
    PAID_CONTENT_INDICATORS.iter().any(|w| title_lower.contains(w))
}

/// Search double that returns a fixed result set, for coach tests.
pub struct FixedSearchProvider {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for FixedSearchProvider {
    async fn search(&self, _query: &str, count: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(count).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, url: &str) -> SearchHit {
        SearchHit { title: title.to_string(), url: url.to_string(), description: "desc".to_string() }
    }

    #[tokio::test]
    async fn filters_out_book_domains() {
        let provider = FixedSearchProvider {
            hits: vec![hit("Rust Book", "https://amazon.com/rust-book"), hit("Rust Guide", "https://doc.rust-lang.org")],
        };
        let resources = search_resources(&provider, "rust", 5, ResourceType::Article).await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].url, "https://doc.rust-lang.org");
    }

    #[tokio::test]
    async fn filters_out_paid_content_indicators_in_title() {
        let provider = FixedSearchProvider {
            hits: vec![hit("Buy the premium course now", "https://example.com/a"), hit("Free intro tutorial", "https://example.com/b")],
        };
        let resources = search_resources(&provider, "python", 5, ResourceType::Course).await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].title, "Free intro tutorial");
    }

    #[tokio::test]
    async fn truncates_to_requested_count_after_filtering() {
        let hits: Vec<SearchHit> = (0..10).map(|i| hit(&format!("Result {i}"), &format!("https://example.com/{i}"))).collect();
        let provider = FixedSearchProvider { hits };
        let resources = search_resources(&provider, "q", 2, ResourceType::Video).await;
        assert_eq!(resources.len(), 2);
    }

    #[tokio::test]
    async fn search_failure_yields_empty_resources_not_an_error() {
        struct Failing;
        #[async_trait]
        impl SearchProvider for Failing {
            async fn search(&self, _query: &str, _count: usize) -> anyhow::Result<Vec<SearchHit>> {
                anyhow::bail!("search backend unreachable")
            }
        }
        let resources = search_resources(&Failing, "q", 3, ResourceType::Article).await;
        assert!(resources.is_empty());
    }
}
