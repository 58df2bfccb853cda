use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::fetcher::{self, Fetcher};
use crate::store::{NewArticle, Source, Store};
use crate::tagger;

/// How far a running cycle has progressed, in whole sources.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncProgress {
    pub sources_done: usize,
    pub sources_total: usize,
}

impl SyncProgress {
    /// Completed fraction in `[0.0, 1.0]`; an empty registry reports 0.
    pub fn fraction(&self) -> f64 {
        if self.sources_total == 0 {
            0.0
        } else {
            self.sources_done as f64 / self.sources_total as f64
        }
    }
}

/// Outcome of one source's visit within a cycle.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_id: i64,
    pub source_name: String,
    pub fetched: usize,
    pub new_articles: usize,
    pub error: Option<String>,
}

/// Outcome of a whole cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub new_articles: usize,
    pub sources: Vec<SourceReport>,
}

pub struct SyncEngine {
    store: Arc<Store>,
    fetcher: Fetcher,
    progress: watch::Sender<SyncProgress>,
    syncing: RwLock<bool>,
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, fetcher: Fetcher) -> Self {
        let (progress, _) = watch::channel(SyncProgress::default());

        Self {
            store,
            fetcher,
            progress,
            syncing: RwLock::new(false),
        }
    }

    /// Subscribes to per-source progress updates. A fresh value is
    /// published after every visited source.
    pub fn progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.subscribe()
    }

    pub async fn is_syncing(&self) -> bool {
        *self.syncing.read().await
    }

    /// Runs one cycle over every registered source, sequentially.
    /// Returns `Ok(None)` when a cycle is already in flight; only one
    /// runs at a time.
    pub async fn run_sync(&self) -> Result<Option<SyncReport>> {
        // Check if a cycle is already running
        {
            let mut syncing = self.syncing.write().await;
            if *syncing {
                info!("Sync already in progress, skipping");
                return Ok(None);
            }
            *syncing = true;
        }

        let result = self.sync_cycle().await;

        // Clear the flag
        {
            let mut syncing = self.syncing.write().await;
            *syncing = false;
        }

        result.map(Some)
    }

    async fn sync_cycle(&self) -> Result<SyncReport> {
        let sources = self.store.list_sources().await?;
        info!("Syncing {} sources", sources.len());

        let total = sources.len();
        self.progress.send_replace(SyncProgress {
            sources_done: 0,
            sources_total: total,
        });

        let mut report = SyncReport::default();
        for (done, source) in sources.iter().enumerate() {
            let source_report = self.sync_source(source).await;
            if let Some(err) = &source_report.error {
                error!("Source '{}' failed: {}", source.name, err);
            }

            report.new_articles += source_report.new_articles;
            report.sources.push(source_report);

            self.progress.send_replace(SyncProgress {
                sources_done: done + 1,
                sources_total: total,
            });
        }

        info!(
            "Sync complete: {} new articles across {} sources",
            report.new_articles, total
        );
        Ok(report)
    }

    // One source's fetch-tag-save pass. Failures land on this source's
    // report and never abort the cycle.
    async fn sync_source(&self, source: &Source) -> SourceReport {
        let mut report = SourceReport {
            source_id: source.id,
            source_name: source.name.clone(),
            fetched: 0,
            new_articles: 0,
            error: None,
        };

        let entries = match self.fetcher.fetch(source).await {
            Ok(entries) => entries,
            Err(err) => {
                report.error = Some(err.to_string());
                return report;
            }
        };
        report.fetched = entries.len();

        for entry in entries {
            let article = NewArticle {
                source_id: source.id,
                source_name: source.name.clone(),
                title: entry.title.clone(),
                summary: fetcher::truncate_summary(&entry.description),
                url: entry.link.clone(),
                tags: tagger::tag(&entry.title, &entry.description),
                created_at: Utc::now(),
            };

            match self.store.save_article(&article).await {
                Ok(true) => report.new_articles += 1,
                Ok(false) => {}
                Err(err) => {
                    // Keep what was saved so far, skip the rest of this source
                    report.error = Some(err.to_string());
                    break;
                }
            }
        }

        info!(
            "Added {} new items for source '{}'",
            report.new_articles, source.name
        );
        report
    }
}

/// Drives the engine forever: one cycle at startup, then one per
/// interval.
pub async fn start_sync_loop(engine: Arc<SyncEngine>, store: Arc<Store>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial sync");
    run_logged_cycle(&engine, &store).await;

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled sync");
        run_logged_cycle(&engine, &store).await;
    }
}

async fn run_logged_cycle(engine: &SyncEngine, store: &Store) {
    match engine.run_sync().await {
        Ok(Some(report)) => {
            let failed = report.sources.iter().filter(|s| s.error.is_some()).count();
            if failed > 0 {
                warn!("{} of {} sources failed this cycle", failed, report.sources.len());
            }

            match store.stats().await {
                Ok(stats) => info!(
                    "Store now holds {} articles (most active: {})",
                    stats.total_articles,
                    stats.top_source.as_deref().unwrap_or("none")
                ),
                Err(err) => warn!("Could not read store stats: {}", err),
            }
        }
        Ok(None) => {}
        Err(err) => error!("Sync failed: {}", err),
    }
}
