use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;

/// Default number of articles a live-feed consumer sees.
pub const DEFAULT_LIVE_FEED_LIMIT: i64 = 60;

#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub source_id: i64,
    pub source_name: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// An article as produced by the sync engine, before it has an id.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: i64,
    pub source_name: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// Row shape; tags travel comma-joined in a single TEXT column
#[derive(Debug, FromRow)]
struct ArticleRow {
    id: String,
    source_id: i64,
    source_name: String,
    title: String,
    summary: String,
    url: String,
    tags: String,
    created_at: String,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            source_id: row.source_id,
            source_name: row.source_name,
            title: row.title,
            summary: row.summary,
            url: row.url,
            tags: row
                .tags
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total_articles: i64,
    pub top_source: Option<String>,
    pub last_ingested_at: Option<String>,
}

/// Identity for an article is the SHA-256 of its link, so the same url
/// maps to the same row across sources, cycles and restarts.
pub fn article_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Store { pool })
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id TEXT PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES sources(id),
                source_name TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                url TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_created_at ON feeds (created_at DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_source_id ON feeds (source_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Registers a feed subscription. Empty names or urls are rejected
    /// with `Ok(false)` and nothing is written; anything else is left
    /// for fetch time to complain about.
    pub async fn add_source(&self, name: &str, url: &str) -> Result<bool> {
        if name.is_empty() || url.is_empty() {
            return Ok(false);
        }

        let created_at = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO sources (name, url, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(url)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    /// Removes a source and every article ingested from it, atomically.
    pub async fn remove_source(&self, source_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM feeds WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources =
            sqlx::query_as::<_, Source>("SELECT * FROM sources ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(sources)
    }

    /// Inserts an article keyed by the hash of its url. Returns
    /// `Ok(true)` for a new row and `Ok(false)` when the id already
    /// exists; real storage failures come back as `Err`.
    pub async fn save_article(&self, article: &NewArticle) -> Result<bool> {
        let id = article_id(&article.url);
        let tags = article.tags.join(",");
        let created_at = article.created_at.to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO feeds (id, source_id, source_name, title, summary, url, tags, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(article.source_id)
        .bind(&article.source_name)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.url)
        .bind(&tags)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Article>> {
        let rows =
            sqlx::query_as::<_, ArticleRow>("SELECT * FROM feeds ORDER BY created_at DESC, id LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles ingested within the last `hours_ago` hours, newest
    /// first. `None` means no cutoff. The window is measured against
    /// ingestion time, not feed-claimed publication dates.
    pub async fn list_since(&self, hours_ago: Option<i64>) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = match hours_ago {
            Some(hours) => {
                let cutoff = (Utc::now() - Duration::hours(hours)).to_rfc3339();
                sqlx::query_as(
                    "SELECT * FROM feeds WHERE created_at >= ? ORDER BY created_at DESC, id",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM feeds ORDER BY created_at DESC, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Snapshot counters for a monitoring surface. Fields are `None`
    /// on an empty store rather than made-up zero values.
    pub async fn stats(&self) -> Result<StoreStats> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?;

        let top_source: Option<String> = sqlx::query_scalar(
            r#"
            SELECT source_name FROM feeds
            GROUP BY source_name
            ORDER BY COUNT(*) DESC, source_name
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let last: (Option<String>,) = sqlx::query_as("SELECT MAX(created_at) FROM feeds")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total_articles: total.0,
            top_source,
            last_ingested_at: last.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_store() -> Store {
        let store = Store::new("sqlite::memory:").await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn sample_article(url: &str, source_id: i64, source_name: &str) -> NewArticle {
        NewArticle {
            source_id,
            source_name: source_name.to_string(),
            title: "Sample headline".to_string(),
            summary: "Sample summary...".to_string(),
            url: url.to_string(),
            tags: vec!["Sample".to_string()],
            created_at: Utc::now(),
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_store_creation() {
            let store = Store::new("sqlite::memory:").await;
            assert!(store.is_ok());
        }

        #[tokio::test]
        async fn test_initialize_is_idempotent() {
            let store = create_test_store().await;
            assert!(store.initialize().await.is_ok());
        }
    }

    mod article_id_tests {
        use super::*;

        #[test]
        fn test_id_is_stable() {
            // Pinned vector; ids must not change across versions or
            // process restarts
            assert_eq!(
                article_id("abc"),
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            );
        }

        #[test]
        fn test_same_url_same_id() {
            assert_eq!(
                article_id("https://example.com/post/1"),
                article_id("https://example.com/post/1")
            );
        }

        #[test]
        fn test_distinct_urls_distinct_ids() {
            assert_ne!(
                article_id("https://example.com/post/1"),
                article_id("https://example.com/post/2")
            );
        }
    }

    mod source_tests {
        use super::*;

        #[tokio::test]
        async fn test_add_and_list_source() {
            let store = create_test_store().await;

            let added = store
                .add_source("Tech Daily", "https://techdaily.test/rss")
                .await
                .unwrap();
            assert!(added);

            let sources = store.list_sources().await.unwrap();
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].name, "Tech Daily");
            assert_eq!(sources[0].url, "https://techdaily.test/rss");
            assert!(sources[0].id > 0);
        }

        #[tokio::test]
        async fn test_add_source_rejects_empty_name() {
            let store = create_test_store().await;

            let added = store.add_source("", "https://techdaily.test/rss").await.unwrap();
            assert!(!added);
            assert!(store.list_sources().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_add_source_rejects_empty_url() {
            let store = create_test_store().await;

            let added = store.add_source("Tech Daily", "").await.unwrap();
            assert!(!added);
            assert!(store.list_sources().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_sources_listed_newest_first() {
            let store = create_test_store().await;

            store.add_source("First", "https://first.test/rss").await.unwrap();
            store.add_source("Second", "https://second.test/rss").await.unwrap();

            let sources = store.list_sources().await.unwrap();
            assert_eq!(sources.len(), 2);
            // Newest first; id breaks same-instant ties
            assert_eq!(sources[0].name, "Second");
            assert_eq!(sources[1].name, "First");
        }

        #[tokio::test]
        async fn test_remove_source_cascades_to_articles() {
            let store = create_test_store().await;

            store.add_source("Keep", "https://keep.test/rss").await.unwrap();
            store.add_source("Drop", "https://drop.test/rss").await.unwrap();
            let sources = store.list_sources().await.unwrap();
            let drop_id = sources.iter().find(|s| s.name == "Drop").unwrap().id;
            let keep_id = sources.iter().find(|s| s.name == "Keep").unwrap().id;

            store
                .save_article(&sample_article("https://keep.test/a", keep_id, "Keep"))
                .await
                .unwrap();
            store
                .save_article(&sample_article("https://drop.test/a", drop_id, "Drop"))
                .await
                .unwrap();
            store
                .save_article(&sample_article("https://drop.test/b", drop_id, "Drop"))
                .await
                .unwrap();

            store.remove_source(drop_id).await.unwrap();

            let sources = store.list_sources().await.unwrap();
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].name, "Keep");

            let articles = store.list_since(None).await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].source_name, "Keep");
        }

        #[tokio::test]
        async fn test_remove_missing_source_is_ok() {
            let store = create_test_store().await;
            assert!(store.remove_source(999).await.is_ok());
        }
    }

    mod article_tests {
        use super::*;

        #[tokio::test]
        async fn test_save_new_article() {
            let store = create_test_store().await;
            store.add_source("Tech Daily", "https://techdaily.test/rss").await.unwrap();
            let source_id = store.list_sources().await.unwrap()[0].id;

            let saved = store
                .save_article(&sample_article("https://techdaily.test/a", source_id, "Tech Daily"))
                .await
                .unwrap();
            assert!(saved);

            let articles = store.list_since(None).await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].id, article_id("https://techdaily.test/a"));
        }

        #[tokio::test]
        async fn test_duplicate_save_is_a_noop() {
            let store = create_test_store().await;
            store.add_source("Tech Daily", "https://techdaily.test/rss").await.unwrap();
            let source_id = store.list_sources().await.unwrap()[0].id;

            let article = sample_article("https://techdaily.test/a", source_id, "Tech Daily");
            assert!(store.save_article(&article).await.unwrap());
            assert!(!store.save_article(&article).await.unwrap());

            let articles = store.list_since(None).await.unwrap();
            assert_eq!(articles.len(), 1);
        }

        #[tokio::test]
        async fn test_duplicate_url_across_sources_keeps_first() {
            let store = create_test_store().await;
            store.add_source("One", "https://one.test/rss").await.unwrap();
            store.add_source("Two", "https://two.test/rss").await.unwrap();
            let sources = store.list_sources().await.unwrap();
            let one_id = sources.iter().find(|s| s.name == "One").unwrap().id;
            let two_id = sources.iter().find(|s| s.name == "Two").unwrap().id;

            let shared = "https://mirror.test/story";
            assert!(store
                .save_article(&sample_article(shared, one_id, "One"))
                .await
                .unwrap());
            assert!(!store
                .save_article(&sample_article(shared, two_id, "Two"))
                .await
                .unwrap());

            let articles = store.list_since(None).await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].source_name, "One");
        }

        #[tokio::test]
        async fn test_tags_survive_round_trip() {
            let store = create_test_store().await;
            store.add_source("Tech Daily", "https://techdaily.test/rss").await.unwrap();
            let source_id = store.list_sources().await.unwrap()[0].id;

            let mut article = sample_article("https://techdaily.test/a", source_id, "Tech Daily");
            article.tags = vec!["Rust".to_string(), "Async".to_string(), "Web".to_string()];
            store.save_article(&article).await.unwrap();

            let articles = store.list_since(None).await.unwrap();
            assert_eq!(articles[0].tags, vec!["Rust", "Async", "Web"]);
        }

        #[tokio::test]
        async fn test_list_recent_orders_and_limits() {
            let store = create_test_store().await;
            store.add_source("Tech Daily", "https://techdaily.test/rss").await.unwrap();
            let source_id = store.list_sources().await.unwrap()[0].id;

            for (title, hours_back) in [("oldest", 3), ("middle", 2), ("newest", 1)] {
                let mut article = sample_article(
                    &format!("https://techdaily.test/{title}"),
                    source_id,
                    "Tech Daily",
                );
                article.title = title.to_string();
                article.created_at = Utc::now() - Duration::hours(hours_back);
                store.save_article(&article).await.unwrap();
            }

            let articles = store.list_recent(2).await.unwrap();
            assert_eq!(articles.len(), 2);
            assert_eq!(articles[0].title, "newest");
            assert_eq!(articles[1].title, "middle");
        }

        #[tokio::test]
        async fn test_window_includes_recent_and_drops_old() {
            let store = create_test_store().await;
            store.add_source("Tech Daily", "https://techdaily.test/rss").await.unwrap();
            let source_id = store.list_sources().await.unwrap()[0].id;

            let mut inside = sample_article("https://techdaily.test/in", source_id, "Tech Daily");
            inside.created_at = Utc::now() - Duration::hours(23);
            let mut outside = sample_article("https://techdaily.test/out", source_id, "Tech Daily");
            outside.created_at = Utc::now() - Duration::hours(25);

            store.save_article(&inside).await.unwrap();
            store.save_article(&outside).await.unwrap();

            let windowed = store.list_since(Some(24)).await.unwrap();
            assert_eq!(windowed.len(), 1);
            assert_eq!(windowed[0].url, "https://techdaily.test/in");

            let unbounded = store.list_since(None).await.unwrap();
            assert_eq!(unbounded.len(), 2);
        }
    }

    mod stats_tests {
        use super::*;

        #[tokio::test]
        async fn test_stats_on_empty_store() {
            let store = create_test_store().await;

            let stats = store.stats().await.unwrap();
            assert_eq!(stats.total_articles, 0);
            assert_eq!(stats.top_source, None);
            assert_eq!(stats.last_ingested_at, None);
        }

        #[tokio::test]
        async fn test_stats_counts_and_top_source() {
            let store = create_test_store().await;
            store.add_source("Busy", "https://busy.test/rss").await.unwrap();
            store.add_source("Quiet", "https://quiet.test/rss").await.unwrap();
            let sources = store.list_sources().await.unwrap();
            let busy_id = sources.iter().find(|s| s.name == "Busy").unwrap().id;
            let quiet_id = sources.iter().find(|s| s.name == "Quiet").unwrap().id;

            store
                .save_article(&sample_article("https://busy.test/a", busy_id, "Busy"))
                .await
                .unwrap();
            store
                .save_article(&sample_article("https://busy.test/b", busy_id, "Busy"))
                .await
                .unwrap();
            store
                .save_article(&sample_article("https://quiet.test/a", quiet_id, "Quiet"))
                .await
                .unwrap();

            let stats = store.stats().await.unwrap();
            assert_eq!(stats.total_articles, 3);
            assert_eq!(stats.top_source, Some("Busy".to_string()));
            assert!(stats.last_ingested_at.is_some());
        }

        #[tokio::test]
        async fn test_top_source_tie_breaks_alphabetically() {
            let store = create_test_store().await;
            store.add_source("Zulu", "https://zulu.test/rss").await.unwrap();
            store.add_source("Alpha", "https://alpha.test/rss").await.unwrap();
            let sources = store.list_sources().await.unwrap();
            let zulu_id = sources.iter().find(|s| s.name == "Zulu").unwrap().id;
            let alpha_id = sources.iter().find(|s| s.name == "Alpha").unwrap().id;

            store
                .save_article(&sample_article("https://zulu.test/a", zulu_id, "Zulu"))
                .await
                .unwrap();
            store
                .save_article(&sample_article("https://alpha.test/a", alpha_id, "Alpha"))
                .await
                .unwrap();

            let stats = store.stats().await.unwrap();
            assert_eq!(stats.top_source, Some("Alpha".to_string()));
        }
    }
}
