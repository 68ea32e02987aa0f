use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::notion::{NotionClient, RssItem};

pub struct Ingestor {
    client: Client,
    notion: NotionClient,
    lookback_hours: i64,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub feeds: usize,
    pub failed_feeds: usize,
    pub items: usize,
}

impl Ingestor {
    pub fn new(notion: NotionClient, config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent("NotionRss/0.1 (RSS Ingester)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            notion,
            lookback_hours: config.lookback_hours,
        }
    }

    /// Run one ingestion pass: read the enabled feed URLs, fetch and parse
    /// each feed, and write every recent entry to the content database.
    /// Per-feed failures are logged and counted; only the feed source query
    /// itself failing aborts the pass.
    pub async fn run_once(&self) -> anyhow::Result<IngestSummary> {
        let urls = self.notion.enabled_feed_urls().await?;
        info!("Ingesting {} feeds", urls.len());

        let cutoff = Utc::now() - chrono::Duration::hours(self.lookback_hours);
        let mut summary = IngestSummary {
            feeds: urls.len(),
            ..Default::default()
        };

        for url in &urls {
            match self.ingest_feed(url, cutoff).await {
                Ok(count) => summary.items += count,
                Err(e) => {
                    error!("Failed to ingest feed '{}': {}", url, e);
                    summary.failed_feeds += 1;
                }
            }
        }

        info!(
            "Ingestion pass complete: {} new items from {} feeds ({} failed)",
            summary.items, summary.feeds, summary.failed_feeds
        );
        Ok(summary)
    }

    async fn ingest_feed(&self, feed_url: &Url, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        info!("Fetching feed: {}", feed_url);

        let response = self.client.get(feed_url.clone()).send().await?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;

        let mut count = 0;
        for entry in parsed.entries {
            let Some(item) = entry_to_item(&entry) else {
                warn!("Skipping entry with no usable link in '{}'", feed_url);
                continue;
            };

            if !within_lookback(&item, cutoff) {
                continue;
            }

            self.notion.add_rss_item(&item).await?;
            count += 1;
        }

        info!("Added {} items from feed '{}'", count, feed_url);
        Ok(count)
    }
}

/// Map a parsed feed entry to an item. Returns `None` when the entry has no
/// parseable link. A missing title becomes "Untitled"; the body is the entry
/// content, falling back to the summary.
pub fn entry_to_item(entry: &feed_rs::model::Entry) -> Option<RssItem> {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| "Untitled".to_string());

    let link = entry.links.first().map(|l| l.href.clone())?;
    let link = Url::parse(&link).ok()?;

    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .unwrap_or_default();

    let published = entry.published.or(entry.updated);

    Some(RssItem {
        title,
        link,
        content,
        published,
    })
}

/// Whether an item falls inside the ingestion window. Undated items are
/// excluded: without a publication date they would be re-ingested on every
/// pass, and the writer does not deduplicate.
pub fn within_lookback(item: &RssItem, cutoff: DateTime<Utc>) -> bool {
    match item.published {
        Some(published) => published >= cutoff,
        None => false,
    }
}

pub async fn start_polling(ingestor: Arc<Ingestor>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    // Do initial pass
    info!("Starting initial ingestion pass");
    if let Err(e) = ingestor.run_once().await {
        error!("Initial ingestion pass failed: {}", e);
    }

    // Then schedule periodic passes
    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled ingestion pass");
        if let Err(e) = ingestor.run_once().await {
            error!("Scheduled ingestion pass failed: {}", e);
        }
    }
}
