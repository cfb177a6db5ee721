use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentidash_core::client::HttpBackend;
use sentidash_core::domain::{FieldErrors, NewStockRequest, ResearchRequest};
use sentidash_core::store::{FetchOutcome, ResearchOutcome, StockStore};

mod output;

const DEFAULT_ADD_ARTICLES: u32 = 25;
const FALLBACK_RESEARCH_ARTICLES: u32 = 15;

#[derive(Debug, Parser)]
#[command(name = "sentidash", about = "Track stock sentiment research from the terminal")]
struct Args {
    /// Sentiment backend base URL. Overrides BACKEND_BASE_URL.
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List tracked stocks with their latest sentiment.
    List,

    /// Track a new stock and run its first research pass.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        exchange: String,
        /// Articles to analyse (1-100).
        #[arg(long, default_value_t = DEFAULT_ADD_ARTICLES.to_string())]
        articles: String,
    },

    /// Run a new research pass for a tracked stock.
    Research {
        #[arg(long)]
        id: String,
        /// Articles to analyse (1-100). Defaults to the stock's last count.
        #[arg(long)]
        articles: Option<String>,
    },

    /// Print a stock's sentiment history.
    Chart {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = sentidash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(url) = args.backend_url {
        settings.backend_base_url = url;
    }

    let backend = HttpBackend::from_settings(&settings)?;
    let store = StockStore::new(Arc::new(backend));

    let res = run(&store, args.command).await;
    if let Err(err) = &res {
        if err.downcast_ref::<FieldErrors>().is_none() {
            sentry_anyhow::capture_anyhow(err);
        }
    }
    res
}

async fn run(store: &StockStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List => {
            load(store).await?;
            print!("{}", output::render_list(&store.snapshot().await));
        }
        Command::Add {
            name,
            exchange,
            articles,
        } => {
            let request = NewStockRequest {
                name,
                exchange,
                num_of_articles: articles,
            };
            let valid = request.validate().map_err(print_field_errors)?;

            let Some(stock) = store.add(&valid).await else {
                anyhow::bail!(store_error(store).await);
            };
            print!("{}", output::render_stock(&stock));
        }
        Command::Research { id, articles } => {
            let requested = articles
                .map(|num_of_articles| ResearchRequest { num_of_articles }.validate())
                .transpose()
                .map_err(print_field_errors)?;

            load(store).await?;
            let num_of_articles = match requested {
                Some(n) => n,
                None => store
                    .get(&id)
                    .await
                    .and_then(|stock| stock.articles())
                    .filter(|n| *n > 0)
                    .unwrap_or(FALLBACK_RESEARCH_ARTICLES),
            };

            tracing::info!(%id, num_of_articles, "research started");
            match store.research(&id, num_of_articles).await {
                ResearchOutcome::Finished => {}
                ResearchOutcome::NotTracked => anyhow::bail!("no stock with id {id}"),
                ResearchOutcome::Failed => anyhow::bail!(store_error(store).await),
            }

            let stock = store
                .get(&id)
                .await
                .with_context(|| format!("stock {id} missing after reload"))?;
            print!("{}", output::render_stock(&stock));
        }
        Command::Chart { id } => {
            load(store).await?;
            let stock = store
                .get(&id)
                .await
                .with_context(|| format!("no stock with id {id}"))?;
            print!("{}", output::render_chart(&stock));
        }
    }
    Ok(())
}

async fn load(store: &StockStore) -> anyhow::Result<()> {
    match store.fetch_all().await {
        FetchOutcome::Failed => anyhow::bail!(store_error(store).await),
        FetchOutcome::Loaded(_) | FetchOutcome::Skipped => Ok(()),
    }
}

async fn store_error(store: &StockStore) -> String {
    store
        .snapshot()
        .await
        .error
        .unwrap_or_else(|| "request failed".to_string())
}

fn print_field_errors(errors: FieldErrors) -> anyhow::Error {
    for (field, message) in errors.iter() {
        eprintln!("  {}: {message}", field.as_str());
    }
    anyhow::Error::new(errors).context("invalid input")
}

fn init_sentry(settings: &sentidash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
