//! HTTP client for the Taskcluster index and queue services

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;

use crate::config::TaskclusterConfig;
use crate::error::{Error, Result};
use crate::types::{Channel, IndexPage, Report, Task};

/// Artifact holding the analysis results of a task
const REPORT_ARTIFACT: &str = "public/results/report.json";

/// Upper bound on followed continuation tokens for one listing
const MAX_INDEX_PAGES: usize = 100;

/// Read access to the index and queue services
#[async_trait]
pub trait TaskclusterApi: Send + Sync {
    /// List every task indexed under `namespace` for `channel`
    async fn list_indexed_tasks(&self, channel: Channel, namespace: &str) -> Result<Vec<Task>>;

    /// Download the analysis report of one task
    ///
    /// The returned report has its `task_id` set.
    async fn fetch_report(&self, task_id: &str) -> Result<Report>;
}

/// Full index namespace for a dashboard namespace on a channel
pub fn index_namespace(channel: Channel, namespace: &str) -> String {
    format!(
        "project.releng.services.project.{}.shipit_static_analysis.{}",
        channel, namespace
    )
}

/// Queue path of a task's report artifact, relative to the queue base URL
pub fn report_artifact_path(task_id: &str) -> String {
    format!(
        "/task/{}/artifacts/{}",
        urlencoding::encode(task_id),
        REPORT_ARTIFACT
    )
}

/// reqwest-backed [`TaskclusterApi`]
pub struct TaskclusterClient {
    http_client: reqwest::Client,
    index_url: String,
    queue_url: String,
}

impl TaskclusterClient {
    /// Create a new client from configuration
    pub fn new(config: &TaskclusterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            index_url: config.index_url.trim_end_matches('/').to_string(),
            queue_url: config.queue_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `url` and decode the body as `T`
    ///
    /// `what` names the payload in parse errors.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Api {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let body = response.text().await.map_err(|source| Error::Http {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| Error::Parse {
            what: what.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TaskclusterApi for TaskclusterClient {
    async fn list_indexed_tasks(&self, channel: Channel, namespace: &str) -> Result<Vec<Task>> {
        let base = format!(
            "{}/tasks/{}",
            self.index_url,
            index_namespace(channel, namespace)
        );

        let mut tasks = Vec::new();
        let mut token: Option<String> = None;

        for page in 0..MAX_INDEX_PAGES {
            let url = match &token {
                Some(token) => format!(
                    "{}?continuationToken={}",
                    base,
                    urlencoding::encode(token)
                ),
                None => base.clone(),
            };

            let listing: IndexPage = self.get_json(&url, "index listing").await?;
            tracing::debug!(
                namespace = %namespace,
                page,
                tasks = listing.tasks.len(),
                "Fetched index page"
            );
            tasks.extend(listing.tasks);

            match listing.continuation_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => return Ok(tasks),
            }
        }

        tracing::warn!(
            namespace = %namespace,
            pages = MAX_INDEX_PAGES,
            "Index listing truncated"
        );
        Ok(tasks)
    }

    async fn fetch_report(&self, task_id: &str) -> Result<Report> {
        let url = format!("{}{}", self.queue_url, report_artifact_path(task_id));
        let mut report: Report = self.get_json(&url, "report").await?;
        report.task_id = task_id.to_string();
        Ok(report)
    }
}
