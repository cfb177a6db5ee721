use crate::domain::sentiment::{self, Sentiment};
use crate::domain::wire;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CLIENT_ONLY_KEYS: &[&str] = &["isResearching"];

/// A tracked stock as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    #[serde(deserialize_with = "wire::text")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub stock_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub exchange_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub articles_count: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub created_at: String,
    #[serde(default, deserialize_with = "wire::seq_or_null")]
    pub history: Vec<ResearchRecord>,

    /// Client-side flag; never read from the backend.
    #[serde(default, skip_deserializing)]
    pub is_researching: bool,

    /// Backend metadata we don't interpret, kept so it round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One sentiment research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRecord {
    pub sentiment: Sentiment,
    #[serde(default, deserialize_with = "wire::text")]
    pub sentiment_score: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub last_researched: String,
}

impl Stock {
    /// Brings a freshly decoded record into its client-side shape.
    ///
    /// `history` is already defaulted by deserialization; this clears the
    /// researching flag and drops client-only keys the backend echoed back.
    pub fn normalize(mut self) -> Self {
        self.is_researching = false;
        for key in CLIENT_ONLY_KEYS {
            self.extra.remove(*key);
        }
        self
    }

    pub fn articles(&self) -> Option<u32> {
        self.articles_count.trim().parse().ok()
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        crate::time::parse_timestamp(&self.created_at)
    }

    /// The most recent research run (history is kept in backend order, oldest first).
    pub fn latest_research(&self) -> Option<&ResearchRecord> {
        self.history.last()
    }

    pub fn latest_sentiment(&self) -> Option<Sentiment> {
        self.latest_research().map(ResearchRecord::classified)
    }
}

impl ResearchRecord {
    pub fn score(&self) -> Option<f64> {
        sentiment::parse_score(&self.sentiment_score)
    }

    /// Display category derived from the score. Unparseable scores read as neutral.
    pub fn classified(&self) -> Sentiment {
        self.score()
            .map(sentiment::classify)
            .unwrap_or(Sentiment::Neutral)
    }
}
