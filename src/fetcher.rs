use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::Source;

/// Upper bound on one feed retrieval, connect through body. A hung
/// source costs the cycle at most this long.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Only the first entries of a document are considered, in feed order.
pub const MAX_ENTRIES_PER_FETCH: usize = 6;

/// Stored summaries are cut to this many characters.
pub const SUMMARY_LENGTH: usize = 250;

const USER_AGENT: &str = "Feedwatch/1.0 (RSS Monitor)";

/// A feed entry reduced to the fields the pipeline cares about.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Publication date claimed by the feed, if any. Advisory only;
    /// article timestamps are assigned at ingestion.
    pub published_hint: Option<DateTime<Utc>>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Retrieves and parses one source's feed document.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<RawEntry>> {
        info!("Fetching feed: {} ({})", source.name, source.url);

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| Error::Fetch {
                url: source.url.clone(),
                source: err,
            })?;

        let bytes = response.bytes().await.map_err(|err| Error::Fetch {
            url: source.url.clone(),
            source: err,
        })?;

        let entries = parse_entries(&bytes).map_err(|err| Error::Parse {
            url: source.url.clone(),
            source: err,
        })?;

        Ok(entries)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

// Entry extraction is separate from transport so it can be exercised on
// fixture documents.
fn parse_entries(bytes: &[u8]) -> std::result::Result<Vec<RawEntry>, parser::ParseFeedError> {
    let parsed = parser::parse(bytes)?;

    let mut entries = Vec::new();
    for entry in parsed.entries.into_iter().take(MAX_ENTRIES_PER_FETCH) {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        if link.is_empty() {
            warn!("Skipping entry with no link: {}", title);
            continue;
        }

        let description = entry.summary.map(|t| t.content).unwrap_or_default();
        let published_hint = entry.published.or(entry.updated);

        entries.push(RawEntry {
            title,
            description,
            link,
            published_hint,
        });
    }

    Ok(entries)
}

/// Cuts a description down to the stored summary size. The ellipsis
/// marker is always appended, short descriptions included.
pub fn truncate_summary(text: &str) -> String {
    let mut summary: String = text.chars().take(SUMMARY_LENGTH).collect();
    summary.push_str("...");
    summary
}
