//! Server-rendered HTML for the dashboard.
//!
//! Render functions are pure: they take a store snapshot plus form state and
//! return markup. Every string that came from the backend or the user is
//! escaped on the way out.

use sentidash_core::chart::SentimentSeries;
use sentidash_core::domain::request::{ARTICLES_RANGE, MAX_EXCHANGE_LEN, MAX_NAME_LEN};
use sentidash_core::domain::sentiment::{NEGATIVE_THRESHOLD, POSITIVE_THRESHOLD};
use sentidash_core::domain::{Field, FieldErrors, NewStockRequest, ResearchRequest, Sentiment, Stock};
use sentidash_core::store::StoreState;
use chrono::{DateTime, Utc};
use sentidash_core::time::{display_timestamp, relative_age};
use std::fmt::Write;

const DEFAULT_ADD_ARTICLES: u32 = 25;
const FALLBACK_RESEARCH_ARTICLES: u32 = 15;

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 240.0;
const CHART_PAD: f64 = 28.0;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #0f1115; color: #e6e6e6; }
main { max-width: 1100px; margin: 0 auto; padding: 24px; }
a { color: #8ab4f8; }
.banner { background: #5c1d1d; border: 1px solid #a33; padding: 10px 14px; border-radius: 6px; display: flex; justify-content: space-between; align-items: center; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(240px, 1fr)); gap: 16px; margin-top: 16px; }
.card { background: #181b22; border: 1px solid #2a2f3a; border-radius: 8px; padding: 14px; }
.card h2 { font-size: 1.1rem; margin: 0 0 4px; }
.exchange { color: #9aa0a6; font-size: 0.85rem; }
.badge { display: inline-block; padding: 2px 8px; border-radius: 10px; font-size: 0.8rem; font-weight: 600; }
.positive { background: #1e4620; color: #8be28f; }
.neutral { background: #3a3a3a; color: #d0d0d0; }
.negative { background: #4a1c1c; color: #f28b82; }
.muted { color: #9aa0a6; }
.researching { color: #fdd663; }
.error { color: #f28b82; font-size: 0.85rem; }
dl { display: grid; grid-template-columns: auto 1fr; gap: 2px 10px; font-size: 0.85rem; }
dt { color: #9aa0a6; }
form.inline { display: flex; gap: 6px; align-items: center; margin-top: 8px; }
input { background: #0f1115; color: #e6e6e6; border: 1px solid #2a2f3a; border-radius: 4px; padding: 4px 6px; }
input[type=number] { width: 70px; }
details.modal { background: #181b22; border: 1px solid #2a2f3a; border-radius: 8px; padding: 10px 14px; margin-top: 16px; }
table { border-collapse: collapse; width: 100%; margin-top: 16px; }
th, td { border-bottom: 1px solid #2a2f3a; padding: 6px 8px; text-align: left; }
svg .guide { stroke: #3a3f4b; stroke-dasharray: 4 4; }
svg .axis { stroke: #555; }
svg .line { fill: none; stroke: #8ab4f8; stroke-width: 2; }
svg circle.positive { fill: #8be28f; }
svg circle.neutral { fill: #d0d0d0; }
svg circle.negative { fill: #f28b82; }
svg text { fill: #9aa0a6; font-size: 11px; }
"#;

/// Form input and errors carried into a re-render after a failed submit.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub add: NewStockRequest,
    pub add_errors: FieldErrors,
    pub research: Option<ResearchFormState>,
}

#[derive(Debug, Clone)]
pub struct ResearchFormState {
    pub stock_id: String,
    pub input: ResearchRequest,
    pub errors: FieldErrors,
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn stock_path(id: &str) -> String {
    format!("/stocks/{}", urlencoding::encode(id))
}

pub fn sentiment_class(sentiment: Sentiment) -> &'static str {
    sentiment.as_str()
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title),
    )
}

fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(
            "<div class=\"banner\" role=\"alert\"><span>{}</span>\
             <form method=\"post\" action=\"/error/dismiss\"><button type=\"submit\">Dismiss</button></form></div>",
            escape(message)
        ),
        None => String::new(),
    }
}

fn field_error(errors: &FieldErrors, field: Field) -> String {
    errors
        .get(field)
        .map(|msg| format!("<div class=\"error\">{}</div>", escape(msg)))
        .unwrap_or_default()
}

fn badge(stock: &Stock) -> String {
    match stock.latest_research() {
        Some(record) => {
            let sentiment = record.classified();
            let score = record
                .score()
                .map(|s| format!(" {s:+.2}"))
                .unwrap_or_default();
            format!(
                "<span class=\"badge {}\">{}{}</span>",
                sentiment_class(sentiment),
                sentiment,
                score
            )
        }
        None => "<span class=\"badge neutral\">not researched</span>".to_string(),
    }
}

fn add_form(forms: &FormState) -> String {
    let input = &forms.add;
    let errors = &forms.add_errors;
    let open = if errors.is_empty() { "" } else { " open" };
    let articles = if input.num_of_articles.is_empty() {
        DEFAULT_ADD_ARTICLES.to_string()
    } else {
        input.num_of_articles.clone()
    };

    format!(
        "<details class=\"modal\"{open}>\n<summary>Add stock</summary>\n\
         <form method=\"post\" action=\"/stocks\">\n\
         <p><label>Name <input name=\"name\" value=\"{name}\" maxlength=\"{max_name}\" required></label>{name_err}</p>\n\
         <p><label>Exchange <input name=\"exchange\" value=\"{exchange}\" maxlength=\"{max_exchange}\" required></label>{exchange_err}</p>\n\
         <p><label>Articles <input type=\"number\" name=\"num_of_articles\" value=\"{articles}\" min=\"{min}\" max=\"{max}\"></label>{articles_err}</p>\n\
         <button type=\"submit\">Add</button>\n</form>\n</details>",
        name = escape(&input.name),
        max_name = MAX_NAME_LEN,
        name_err = field_error(errors, Field::Name),
        exchange = escape(&input.exchange),
        max_exchange = MAX_EXCHANGE_LEN,
        exchange_err = field_error(errors, Field::Exchange),
        articles = escape(&articles),
        min = ARTICLES_RANGE.start(),
        max = ARTICLES_RANGE.end(),
        articles_err = field_error(errors, Field::NumOfArticles),
    )
}

fn research_form(stock: &Stock, forms: &FormState) -> String {
    if stock.is_researching {
        return "<p class=\"researching\">Researching…</p>".to_string();
    }

    let pending = forms
        .research
        .as_ref()
        .filter(|r| r.stock_id == stock.id);
    let value = pending
        .map(|r| r.input.num_of_articles.clone())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| {
            stock
                .articles()
                .filter(|n| *n > 0)
                .unwrap_or(FALLBACK_RESEARCH_ARTICLES)
                .to_string()
        });
    let err = pending
        .map(|r| field_error(&r.errors, Field::NumOfArticles))
        .unwrap_or_default();

    format!(
        "<form class=\"inline\" method=\"post\" action=\"{action}/research\">\
         <input type=\"number\" name=\"num_of_articles\" value=\"{value}\" min=\"{min}\" max=\"{max}\">\
         <button type=\"submit\">Research</button></form>{err}",
        action = escape(&stock_path(&stock.id)),
        value = escape(&value),
        min = ARTICLES_RANGE.start(),
        max = ARTICLES_RANGE.end(),
    )
}

fn stock_card(stock: &Stock, forms: &FormState, now: DateTime<Utc>) -> String {
    let (last_title, last_researched) = match stock.latest_research() {
        Some(r) => {
            let absolute = display_timestamp(&r.last_researched);
            let relative =
                relative_age(&r.last_researched, now).unwrap_or_else(|| absolute.clone());
            (absolute, relative)
        }
        None => (String::new(), "never".to_string()),
    };

    format!(
        "<article class=\"card\">\n<h2><a href=\"{href}\">{name}</a></h2>\n\
         <div class=\"exchange\">{exchange}</div>\n<p>{badge}</p>\n\
         <dl><dt>Articles</dt><dd>{articles}</dd><dt>Added</dt><dd>{created}</dd>\
         <dt>Last</dt><dd title=\"{last_title}\">{last}</dd></dl>\n{research}\n</article>",
        href = escape(&stock_path(&stock.id)),
        name = escape(&stock.stock_name),
        exchange = escape(&stock.exchange_name),
        badge = badge(stock),
        articles = escape(&stock.articles_count),
        created = escape(&display_timestamp(&stock.created_at)),
        last_title = escape(&last_title),
        last = escape(&last_researched),
        research = research_form(stock, forms),
    )
}

pub fn render_index(state: &StoreState, forms: &FormState) -> String {
    render_index_at(state, forms, Utc::now())
}

fn tracked_summary(n: usize) -> String {
    format!("{n} stock{} tracked", if n == 1 { "" } else { "s" })
}

pub fn render_index_at(state: &StoreState, forms: &FormState, now: DateTime<Utc>) -> String {
    let mut body = String::new();
    body.push_str("<h1>Stock sentiment</h1>\n");
    let _ = writeln!(
        body,
        "<p class=\"muted\">{}</p>",
        tracked_summary(state.stocks.len())
    );
    body.push_str(&error_banner(state.error.as_deref()));

    if state.is_loading {
        body.push_str("<p class=\"muted\">Loading…</p>\n");
    }

    body.push_str(&add_form(forms));

    if state.stocks.is_empty() {
        body.push_str("<p class=\"muted\">No stocks tracked yet.</p>\n");
    } else {
        body.push_str("<section class=\"grid\">\n");
        for stock in &state.stocks {
            body.push_str(&stock_card(stock, forms, now));
            body.push('\n');
        }
        body.push_str("</section>\n");
    }

    page("Stock sentiment", &body)
}

pub fn render_detail(stock: &Stock, error: Option<&str>) -> String {
    let series = SentimentSeries::from_history(&stock.history);

    let mut body = String::new();
    body.push_str("<p><a href=\"/\">← All stocks</a></p>\n");
    body.push_str(&error_banner(error));
    let _ = write!(
        body,
        "<h1>{} <span class=\"exchange\">{}</span></h1>\n<p>{}</p>\n",
        escape(&stock.stock_name),
        escape(&stock.exchange_name),
        badge(stock)
    );

    if series.is_empty() {
        body.push_str("<p class=\"muted\">No research history yet.</p>\n");
    } else {
        body.push_str(&render_chart_svg(&series));
    }

    if !stock.history.is_empty() {
        body.push_str(
            "<table>\n<thead><tr><th>Researched</th><th>Reported</th><th>Score</th><th>Display</th></tr></thead>\n<tbody>\n",
        );
        for record in stock.history.iter().rev() {
            let display = record.classified();
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><span class=\"badge {}\">{}</span></td></tr>",
                escape(&display_timestamp(&record.last_researched)),
                record.sentiment,
                escape(&record.sentiment_score),
                sentiment_class(display),
                display
            );
        }
        body.push_str("</tbody>\n</table>\n");
    }

    page(&stock.stock_name, &body)
}

fn score_to_y(score: f64) -> f64 {
    let clamped = score.clamp(-1.0, 1.0);
    CHART_PAD + (1.0 - clamped) / 2.0 * (CHART_HEIGHT - 2.0 * CHART_PAD)
}

fn index_to_x(i: usize, n: usize) -> f64 {
    if n <= 1 {
        return CHART_WIDTH / 2.0;
    }
    CHART_PAD + (i as f64) * (CHART_WIDTH - 2.0 * CHART_PAD) / ((n - 1) as f64)
}

/// Line chart of scores on a fixed [-1, 1] axis, with the classification
/// thresholds drawn as guides.
pub fn render_chart_svg(series: &SentimentSeries) -> String {
    let n = series.len();
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg class=\"chart\" viewBox=\"0 0 {CHART_WIDTH} {CHART_HEIGHT}\" width=\"{CHART_WIDTH}\" height=\"{CHART_HEIGHT}\" role=\"img\" aria-label=\"Sentiment history\">\n"
    );

    let left = CHART_PAD;
    let right = CHART_WIDTH - CHART_PAD;
    let _ = writeln!(
        svg,
        "<line class=\"axis\" x1=\"{left}\" y1=\"{y:.1}\" x2=\"{right}\" y2=\"{y:.1}\"/>",
        y = score_to_y(0.0)
    );
    for (label, value) in [("+0.2", POSITIVE_THRESHOLD), ("-0.2", NEGATIVE_THRESHOLD)] {
        let y = score_to_y(value);
        let _ = writeln!(
            svg,
            "<line class=\"guide\" x1=\"{left}\" y1=\"{y:.1}\" x2=\"{right}\" y2=\"{y:.1}\"/>\
             <text x=\"2\" y=\"{ty:.1}\">{label}</text>",
            ty = y + 4.0
        );
    }
    let _ = writeln!(
        svg,
        "<text x=\"2\" y=\"{:.1}\">+1</text><text x=\"2\" y=\"{:.1}\">-1</text>",
        score_to_y(1.0) + 4.0,
        score_to_y(-1.0) + 4.0
    );

    let coords: Vec<(f64, f64)> = series
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (index_to_x(i, n), score_to_y(p.score)))
        .collect();

    if coords.len() > 1 {
        let points = coords
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(svg, "<polyline class=\"line\" points=\"{points}\"/>");
    }

    for (point, (x, y)) in series.points.iter().zip(&coords) {
        let _ = writeln!(
            svg,
            "<circle class=\"{class}\" cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"4\"><title>{at}: {score:+.2} ({sentiment})</title></circle>",
            class = sentiment_class(point.sentiment),
            at = escape(&display_timestamp(&point.researched_at)),
            score = point.score,
            sentiment = point.sentiment,
        );
    }

    svg.push_str("</svg>\n");
    svg
}

pub fn render_not_found(id: &str) -> String {
    page(
        "Not found",
        &format!(
            "<p><a href=\"/\">← All stocks</a></p>\n<p>No stock with id <code>{}</code>.</p>",
            escape(id)
        ),
    )
}
