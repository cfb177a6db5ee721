use crate::client::{BackendError, Endpoint, SentimentBackend};
use crate::config::Settings;
use crate::domain::request::ValidNewStock;
use crate::domain::stock::Stock;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

// Error bodies can be whole HTML pages; keep the banner readable.
const MAX_ERROR_DETAIL_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.backend_base_url.clone(),
            settings.backend_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path())
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(endpoint);
        tracing::debug!(%url, ?query, "backend request");

        let res = self
            .http
            .post(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| BackendError {
                endpoint,
                status: None,
                detail: err.to_string(),
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| BackendError {
            endpoint,
            status: Some(status.as_u16()),
            detail: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            tracing::warn!(%url, %status, "backend returned error status");
            return Err(BackendError {
                endpoint,
                status: Some(status.as_u16()),
                detail: truncate(text.trim(), MAX_ERROR_DETAIL_CHARS),
            }
            .into());
        }

        serde_json::from_str::<T>(&text).map_err(|err| {
            tracing::warn!(%url, error = %err, "backend response did not decode");
            BackendError {
                endpoint,
                status: Some(status.as_u16()),
                detail: format!("invalid response body: {err}"),
            }
            .into()
        })
    }
}

#[async_trait::async_trait]
impl SentimentBackend for HttpBackend {
    async fn create(&self, request: &ValidNewStock) -> Result<Stock> {
        let stock: Stock = self
            .post(
                Endpoint::Create,
                &[
                    ("name", request.name.clone()),
                    ("exchange", request.exchange.clone()),
                    ("num_of_articles", request.num_of_articles.to_string()),
                ],
            )
            .await?;
        Ok(stock.normalize())
    }

    async fn update(&self, id: &str, num_of_articles: u32) -> Result<Stock> {
        let stock: Stock = self
            .post(
                Endpoint::Update,
                &[
                    ("id", id.to_string()),
                    ("num_of_articles", num_of_articles.to_string()),
                ],
            )
            .await?;
        Ok(stock.normalize())
    }

    async fn get_all(&self) -> Result<Vec<Stock>> {
        let stocks: Vec<Stock> = self.post(Endpoint::GetAll, &[]).await?;
        Ok(stocks.into_iter().map(Stock::normalize).collect())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
