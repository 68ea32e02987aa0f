use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use crate::blocks::{content_to_blocks, Block, RichText};
use crate::config::Config;

const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

/// Feed database property holding the subscription toggle.
pub const ENABLED_PROPERTY: &str = "Enabled";
/// Feed database property holding the feed URL.
pub const LINK_PROPERTY: &str = "Link";

const QUERY_PAGE_SIZE: u32 = 100;
const STREAM_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limited by the API")]
    RateLimited { retry_after: Option<u64> },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("unexpected status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Row-level problems with a feed source. These never fail a query; the row
/// is skipped and logged.
#[derive(Debug, Error)]
pub enum MalformedRow {
    #[error("row has no `{LINK_PROPERTY}` property")]
    MissingLink,
    #[error("`{LINK_PROPERTY}` property is not a url property")]
    WrongType,
    #[error("`{LINK_PROPERTY}` property has no value")]
    EmptyLink,
    #[error("`{LINK_PROPERTY}` property is not a valid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// One syndication entry to persist as a content page.
#[derive(Debug, Clone)]
pub struct RssItem {
    pub title: String,
    pub link: Url,
    pub content: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<Page>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Url { url: Option<String> },
    Checkbox { checkbox: bool },
    #[serde(other)]
    Other,
}

/// Extract the feed URL from a feed source row.
pub fn feed_url(page: &Page) -> Result<Url, MalformedRow> {
    match page.properties.get(LINK_PROPERTY) {
        None => Err(MalformedRow::MissingLink),
        Some(PropertyValue::Url { url: Some(raw) }) => Ok(Url::parse(raw)?),
        Some(PropertyValue::Url { url: None }) => Err(MalformedRow::EmptyLink),
        Some(_) => Err(MalformedRow::WrongType),
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    filter: CheckboxFilter<'a>,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
}

#[derive(Serialize)]
struct CheckboxFilter<'a> {
    property: &'a str,
    checkbox: CheckboxCondition,
}

#[derive(Serialize)]
struct CheckboxCondition {
    equals: bool,
}

#[derive(Serialize)]
struct PageCreateRequest<'a> {
    parent: Parent<'a>,
    properties: PageProperties,
    children: Vec<Block>,
}

#[derive(Serialize)]
struct Parent<'a> {
    database_id: &'a str,
}

#[derive(Serialize)]
struct PageProperties {
    #[serde(rename = "Title")]
    title: TitleProperty,
    #[serde(rename = "Link")]
    link: UrlProperty,
}

#[derive(Serialize)]
struct TitleProperty {
    #[serde(rename = "type")]
    kind: &'static str,
    title: Vec<RichText>,
}

#[derive(Serialize)]
struct UrlProperty {
    #[serde(rename = "type")]
    kind: &'static str,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: String,
    api_token: String,
    feeds_database_id: String,
    content_database_id: String,
}

impl NotionClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Point the client at a different API host (useful for testing).
    pub fn with_base_url(config: &Config, base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent("NotionRss/0.1 (RSS Ingester)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            feeds_database_id: config.feeds_database_id.clone(),
            content_database_id: config.content_database_id.clone(),
        }
    }

    /// Collect the feed URL of every enabled feed source, following cursor
    /// pagination until the remote reports no more results. Rows whose link
    /// is missing or unparseable are skipped with a warning; a failed query
    /// is an error, never an empty result.
    pub async fn enabled_feed_urls(&self) -> Result<Vec<Url>, NotionError> {
        let mut urls = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.query_enabled_page(cursor.as_deref()).await?;

            for row in &page.results {
                match feed_url(row) {
                    Ok(url) => urls.push(url),
                    Err(reason) => warn!("Skipping feed row {}: {}", row.id, reason),
                }
            }

            if !page.has_more {
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(urls)
    }

    /// Streaming variant of [`enabled_feed_urls`](Self::enabled_feed_urls):
    /// URLs are delivered as each remote page arrives. The channel closes
    /// when the query is exhausted; a query failure is delivered as a final
    /// `Err` item before closing. Dropping the receiver stops the producer
    /// at its next send.
    pub fn stream_enabled_feed_urls(&self) -> mpsc::Receiver<Result<Url, NotionError>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let client = self.clone();

        tokio::spawn(async move {
            let mut cursor: Option<String> = None;

            loop {
                let page = match client.query_enabled_page(cursor.as_deref()).await {
                    Ok(page) => page,
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };

                for row in page.results {
                    match feed_url(&row) {
                        Ok(url) => {
                            if tx.send(Ok(url)).await.is_err() {
                                return;
                            }
                        }
                        Err(reason) => warn!("Skipping feed row {}: {}", row.id, reason),
                    }
                }

                if !page.has_more {
                    return;
                }
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => return,
                }
            }
        });

        rx
    }

    async fn query_enabled_page(&self, cursor: Option<&str>) -> Result<QueryResponse, NotionError> {
        let body = QueryRequest {
            filter: CheckboxFilter {
                property: ENABLED_PROPERTY,
                checkbox: CheckboxCondition { equals: true },
            },
            page_size: QUERY_PAGE_SIZE,
            start_cursor: cursor,
        };

        let response = self
            .http
            .post(format!(
                "{}/v1/databases/{}/query",
                self.base_url, self.feeds_database_id
            ))
            .bearer_auth(&self.api_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Create one page in the content database for the given item and return
    /// its id. No idempotence check happens here: writing the same item twice
    /// creates two pages.
    pub async fn add_rss_item(&self, item: &RssItem) -> Result<String, NotionError> {
        let body = PageCreateRequest {
            parent: Parent {
                database_id: &self.content_database_id,
            },
            properties: PageProperties {
                title: TitleProperty {
                    kind: "title",
                    title: vec![RichText::text(&item.title)],
                },
                link: UrlProperty {
                    kind: "url",
                    url: item.link.to_string(),
                },
            },
            children: content_to_blocks(&item.content),
        };

        let response = self
            .http
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(&self.api_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;

        let created: CreatedPage = Self::check_status(response).await?.json().await?;
        Ok(created.id)
    }

    async fn check_status(response: Response) -> Result<Response, NotionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let body: ErrorBody = response.json().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NotionError::Auth(body.message),
            StatusCode::TOO_MANY_REQUESTS => NotionError::RateLimited { retry_after },
            StatusCode::BAD_REQUEST if body.code == "validation_error" => {
                NotionError::Validation(body.message)
            }
            _ => NotionError::Api {
                status: status.as_u16(),
                message: body.message,
            },
        })
    }
}
