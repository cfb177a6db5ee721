use crate::domain::request::ValidNewStock;
use crate::domain::stock::Stock;
use std::fmt;

pub mod http;

pub use http::HttpBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Create,
    Update,
    GetAll,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Create => "/create",
            Self::Update => "/update",
            Self::GetAll => "/get_all",
        }
    }
}

/// A backend call that failed for any reason: transport, status, or body.
/// Callers show the message; the user retries the action.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub endpoint: Endpoint,
    pub status: Option<u16>,
    pub detail: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "request to {} failed (status={status}): {}",
                self.endpoint.path(),
                self.detail
            ),
            None => write!(
                f,
                "request to {} failed: {}",
                self.endpoint.path(),
                self.detail
            ),
        }
    }
}

impl std::error::Error for BackendError {}

/// The sentiment research service, one method per endpoint.
#[async_trait::async_trait]
pub trait SentimentBackend: Send + Sync {
    /// Registers a stock and runs its first research pass.
    async fn create(&self, request: &ValidNewStock) -> anyhow::Result<Stock>;

    /// Runs a new research pass for an existing stock.
    async fn update(&self, id: &str, num_of_articles: u32) -> anyhow::Result<Stock>;

    async fn get_all(&self) -> anyhow::Result<Vec<Stock>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_names_endpoint_and_status() {
        let err = BackendError {
            endpoint: Endpoint::Update,
            status: Some(502),
            detail: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request to /update failed (status=502): bad gateway"
        );

        let err = BackendError {
            endpoint: Endpoint::GetAll,
            status: None,
            detail: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "request to /get_all failed: connection refused");
    }
}
