use crate::domain::sentiment::{self, Sentiment};
use crate::domain::stock::ResearchRecord;
use crate::time::parse_timestamp;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Position in the stock's history.
    pub index: usize,
    pub score: f64,
    pub sentiment: Sentiment,
    /// Label as reported by the backend, which may disagree with `sentiment`.
    pub reported: Sentiment,
    pub researched_at: String,
}

/// Sentiment scores over time, one point per research run, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentSeries {
    pub points: Vec<SeriesPoint>,
}

impl SentimentSeries {
    /// Points are ordered by `last_researched`. Records with unreadable
    /// timestamps sort first and keep their relative history order.
    pub fn from_history(history: &[ResearchRecord]) -> Self {
        let mut points: Vec<SeriesPoint> = history
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let Some(score) = record.score() else {
                    tracing::debug!(
                        index,
                        raw = %record.sentiment_score,
                        "skipping research record with unparseable score"
                    );
                    return None;
                };
                Some(SeriesPoint {
                    index,
                    score,
                    sentiment: sentiment::classify(score),
                    reported: record.sentiment,
                    researched_at: record.last_researched.clone(),
                })
            })
            .collect();

        points.sort_by_key(|p| parse_timestamp(&p.researched_at));
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn min_score(&self) -> Option<f64> {
        self.points.iter().map(|p| p.score).reduce(f64::min)
    }

    pub fn max_score(&self) -> Option<f64> {
        self.points.iter().map(|p| p.score).reduce(f64::max)
    }
}
