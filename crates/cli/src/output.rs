use sentidash_core::chart::SentimentSeries;
use sentidash_core::domain::Stock;
use sentidash_core::store::StoreState;
use sentidash_core::time::display_timestamp;
use std::fmt::Write;

const BAR_HALF_WIDTH: usize = 20;

fn latest_summary(stock: &Stock) -> String {
    match stock.latest_research() {
        Some(record) => match record.score() {
            Some(score) => format!("{} ({score:+.2})", record.classified()),
            None => record.classified().to_string(),
        },
        None => "not researched".to_string(),
    }
}

pub fn render_list(state: &StoreState) -> String {
    if state.stocks.is_empty() {
        return "No stocks tracked yet.\n".to_string();
    }

    let id_w = state
        .stocks
        .iter()
        .map(|s| s.id.chars().count())
        .max()
        .unwrap_or(0)
        .max(2);
    let name_w = state
        .stocks
        .iter()
        .map(|s| s.stock_name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_w$}  {:<name_w$}  {:<10}  {:>8}  SENTIMENT",
        "ID", "NAME", "EXCHANGE", "ARTICLES"
    );
    for stock in &state.stocks {
        let _ = writeln!(
            out,
            "{:<id_w$}  {:<name_w$}  {:<10}  {:>8}  {}",
            stock.id,
            stock.stock_name,
            stock.exchange_name,
            stock.articles_count,
            latest_summary(stock)
        );
    }
    out
}

pub fn render_stock(stock: &Stock) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", stock.stock_name, stock.exchange_name);
    let _ = writeln!(out, "  id:        {}", stock.id);
    let _ = writeln!(out, "  articles:  {}", stock.articles_count);
    let _ = writeln!(out, "  added:     {}", display_timestamp(&stock.created_at));
    let _ = writeln!(out, "  sentiment: {}", latest_summary(stock));
    let _ = writeln!(out, "  runs:      {}", stock.history.len());
    out
}

/// Horizontal bar centred on zero: negative scores grow left, positive right.
fn bar(score: f64) -> String {
    let filled = (score.abs().min(1.0) * BAR_HALF_WIDTH as f64).round() as usize;
    let empty = BAR_HALF_WIDTH - filled;
    if score < 0.0 {
        format!(
            "{}{}|{}",
            " ".repeat(empty),
            "#".repeat(filled),
            " ".repeat(BAR_HALF_WIDTH)
        )
    } else {
        format!(
            "{}|{}{}",
            " ".repeat(BAR_HALF_WIDTH),
            "#".repeat(filled),
            " ".repeat(empty)
        )
    }
}

pub fn render_chart(stock: &Stock) -> String {
    let series = SentimentSeries::from_history(&stock.history);
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", stock.stock_name, stock.exchange_name);

    if series.is_empty() {
        out.push_str("No research history yet.\n");
        return out;
    }

    for point in &series.points {
        let _ = writeln!(
            out,
            "{:<20}  {:+.2}  {}  {}",
            display_timestamp(&point.researched_at),
            point.score,
            bar(point.score),
            point.sentiment
        );
    }

    if let (Some(min), Some(max)) = (series.min_score(), series.max_score()) {
        let _ = writeln!(out, "range {min:+.2} .. {max:+.2} over {} runs", series.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentidash_core::domain::{ResearchRecord, Sentiment};
    use serde_json::Map;

    fn stock(id: &str, scores: &[&str]) -> Stock {
        Stock {
            id: id.to_string(),
            stock_name: "Apple".to_string(),
            exchange_name: "NASDAQ".to_string(),
            articles_count: "10".to_string(),
            created_at: "2026-03-01T10:00:00Z".to_string(),
            history: scores
                .iter()
                .map(|s| ResearchRecord {
                    sentiment: Sentiment::Neutral,
                    sentiment_score: s.to_string(),
                    last_researched: "2026-03-02T10:00:00Z".to_string(),
                })
                .collect(),
            is_researching: false,
            extra: Map::new(),
        }
    }

    #[test]
    fn bar_grows_from_the_centre() {
        assert_eq!(bar(0.0), format!("{}|{}", " ".repeat(20), " ".repeat(20)));
        assert_eq!(
            bar(0.5),
            format!("{}|{}{}", " ".repeat(20), "#".repeat(10), " ".repeat(10))
        );
        assert_eq!(
            bar(-1.0),
            format!("{}|{}", "#".repeat(20), " ".repeat(20))
        );
        assert_eq!(bar(3.0).matches('#').count(), 20);
    }

    #[test]
    fn list_shows_latest_classified_sentiment() {
        let state = StoreState {
            stocks: vec![stock("1", &["-0.4", "0.05"]), stock("2", &[])],
            is_loading: false,
            error: None,
        };
        let out = render_list(&state);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].ends_with("neutral (+0.05)"));
        assert!(lines[2].ends_with("not researched"));
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(render_list(&StoreState::default()), "No stocks tracked yet.\n");
    }

    #[test]
    fn chart_has_one_row_per_point_and_a_range() {
        let out = render_chart(&stock("1", &["-0.6", "0.3"]));
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("negative"));
        assert!(lines[2].ends_with("positive"));
        assert_eq!(lines[3], "range -0.60 .. +0.30 over 2 runs");
    }

    #[test]
    fn chart_without_history() {
        let out = render_chart(&stock("1", &[]));
        assert!(out.ends_with("No research history yet.\n"));
    }

    #[test]
    fn stock_summary_includes_runs() {
        let out = render_stock(&stock("abc", &["0.9"]));
        assert!(out.contains("id:        abc"));
        assert!(out.contains("sentiment: positive (+0.90)"));
        assert!(out.contains("runs:      1"));
    }
}
