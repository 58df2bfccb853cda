use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::store::{Article, Store};
use crate::tagger;

/// Review window presets, in hours.
pub const DAILY_WINDOW_HOURS: i64 = 24;
pub const WEEKLY_WINDOW_HOURS: i64 = 168;
pub const MONTHLY_WINDOW_HOURS: i64 = 720;

/// One source's slice of a digest window.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestGroup {
    pub source_name: String,
    pub article_count: usize,
    pub dominant_tag: String,
    pub articles: Vec<DigestItem>,
}

/// Headline-level reference to an article inside a group.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestItem {
    pub title: String,
    pub url: String,
}

pub struct DigestAggregator {
    store: Arc<Store>,
}

impl DigestAggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Summarizes the articles ingested within the window, one group
    /// per source that contributed anything. Groups come back in
    /// source-name order; articles inside a group stay newest first.
    /// An empty window is an empty digest, not an error.
    pub async fn digest(&self, hours_ago: Option<i64>) -> Result<Vec<DigestGroup>> {
        let articles = self.store.list_since(hours_ago).await?;

        let mut groups: BTreeMap<String, Vec<Article>> = BTreeMap::new();
        for article in articles {
            groups
                .entry(article.source_name.clone())
                .or_default()
                .push(article);
        }

        let digest = groups
            .into_iter()
            .map(|(source_name, articles)| build_group(source_name, articles))
            .collect();
        Ok(digest)
    }
}

// The dominant tag is the most frequent individual label across the
// group, ranked with the same tie-break the tagger uses.
fn build_group(source_name: String, articles: Vec<Article>) -> DigestGroup {
    let ranked = tagger::rank_by_count(
        articles
            .iter()
            .flat_map(|article| article.tags.iter().map(String::as_str)),
    );
    let dominant_tag = ranked
        .into_iter()
        .next()
        .map(|(tag, _)| tag)
        .unwrap_or_else(|| tagger::FALLBACK_TAG.to_string());

    DigestGroup {
        source_name,
        article_count: articles.len(),
        dominant_tag,
        articles: articles
            .into_iter()
            .map(|article| DigestItem {
                title: article.title,
                url: article.url,
            })
            .collect(),
    }
}
