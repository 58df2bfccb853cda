use thiserror::Error;

/// Errors produced by the feedwatch pipeline.
///
/// Duplicate articles and rejected registrations are not errors; the
/// store reports those as `Ok(false)` so callers can tell them apart
/// from real storage failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failure in the sqlite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network failure while retrieving a feed document.
    #[error("failed to fetch feed at {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    /// The retrieved document could not be parsed as a feed.
    #[error("failed to parse feed at {url}: {source}")]
    Parse {
        url: String,
        source: feed_rs::parser::ParseFeedError,
    },
}

impl Error {
    /// True for failures tied to a single source's feed, either network
    /// or a malformed document. The sync engine contains these per
    /// source instead of aborting the whole cycle.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
