use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentidash_core::client::HttpBackend;
use sentidash_core::domain::{FieldErrors, NewStockRequest, ResearchRequest, Stock};
use sentidash_core::store::{FetchOutcome, ResearchOutcome, StockStore, StoreState};

mod views;

use views::{FormState, ResearchFormState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = sentidash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let backend = HttpBackend::from_settings(&settings)?;
    tracing::info!(
        backend = %backend.base_url(),
        timeout_secs = ?settings.backend_timeout_secs,
        "using sentiment backend"
    );

    let state = AppState {
        store: Arc::new(StockStore::new(Arc::new(backend))),
    };

    let app = router(state);

    let port = sentidash_core::config::listen_port()?;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/stocks", post(add_stock))
        .route("/stocks/:id", get(stock_detail))
        .route("/stocks/:id/research", post(research_stock))
        .route("/error/dismiss", post(dismiss_error))
        .route("/api/stocks", get(api_list).post(api_add))
        .route("/api/stocks/refresh", post(api_refresh))
        .route("/api/stocks/:id", delete(api_delete))
        .route("/api/stocks/:id/research", post(api_research))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Arc<StockStore>,
}

fn report_store_error(snapshot: &StoreState) {
    if let Some(message) = snapshot.error.as_deref() {
        sentry::capture_message(message, sentry::Level::Error);
    }
}

fn render_page(snapshot: &StoreState, forms: &FormState) -> Response {
    let status = if snapshot.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Html(views::render_index(snapshot, forms))).into_response()
}

// Loading the page is the dashboard's "mount": it always reloads the collection.
async fn index(State(state): State<AppState>) -> Response {
    if state.store.fetch_all().await == FetchOutcome::Failed {
        report_store_error(&state.store.snapshot().await);
    }
    render_page(&state.store.snapshot().await, &FormState::default())
}

async fn add_stock(State(state): State<AppState>, Form(input): Form<NewStockRequest>) -> Response {
    let valid = match input.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            tracing::debug!(%errors, "add form rejected");
            let snapshot = state.store.snapshot().await;
            let forms = FormState {
                add: input,
                add_errors: errors,
                research: None,
            };
            let html = views::render_index(&snapshot, &forms);
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response();
        }
    };

    let added = state.store.add(&valid).await;
    let snapshot = state.store.snapshot().await;
    if added.is_none() {
        report_store_error(&snapshot);
        // Keep what the user typed so they can retry.
        let forms = FormState {
            add: input,
            ..FormState::default()
        };
        return render_page(&snapshot, &forms);
    }
    render_page(&snapshot, &FormState::default())
}

async fn research_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(input): Form<ResearchRequest>,
) -> Response {
    let num_of_articles = match input.validate() {
        Ok(n) => n,
        Err(errors) => {
            let snapshot = state.store.snapshot().await;
            let forms = FormState {
                research: Some(ResearchFormState {
                    stock_id: id,
                    input,
                    errors,
                }),
                ..FormState::default()
            };
            let html = views::render_index(&snapshot, &forms);
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response();
        }
    };

    if state.store.research(&id, num_of_articles).await == ResearchOutcome::NotTracked {
        return (StatusCode::NOT_FOUND, Html(views::render_not_found(&id))).into_response();
    }

    // The reconciling reload can fail after the research call succeeded.
    let snapshot = state.store.snapshot().await;
    report_store_error(&snapshot);
    render_page(&snapshot, &FormState::default())
}

async fn stock_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // Deep links can arrive before anything was loaded.
    if state.store.get(&id).await.is_none() {
        state.store.fetch_all().await;
    }

    let snapshot = state.store.snapshot().await;
    match snapshot.get(&id) {
        Some(stock) => Html(views::render_detail(stock, snapshot.error.as_deref())).into_response(),
        None => (StatusCode::NOT_FOUND, Html(views::render_not_found(&id))).into_response(),
    }
}

async fn dismiss_error(State(state): State<AppState>) -> Response {
    state.store.clear_error().await;
    render_page(&state.store.snapshot().await, &FormState::default())
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, error: Option<String>) -> Response {
    let error = error.unwrap_or_else(|| "request failed".to_string());
    (status, Json(ApiError { error })).into_response()
}

async fn api_list(State(state): State<AppState>) -> Json<StoreState> {
    Json(state.store.snapshot().await)
}

async fn api_refresh(State(state): State<AppState>) -> Response {
    let outcome = state.store.fetch_all().await;
    let snapshot = state.store.snapshot().await;
    match outcome {
        FetchOutcome::Failed => {
            report_store_error(&snapshot);
            (StatusCode::BAD_GATEWAY, Json(snapshot)).into_response()
        }
        FetchOutcome::Skipped => (StatusCode::ACCEPTED, Json(snapshot)).into_response(),
        FetchOutcome::Loaded(_) => Json(snapshot).into_response(),
    }
}

async fn api_add(State(state): State<AppState>, Json(input): Json<NewStockRequest>) -> Response {
    let valid = match input.validate() {
        Ok(valid) => valid,
        Err(errors) => return invalid(errors),
    };

    match state.store.add(&valid).await {
        Some(stock) => (StatusCode::CREATED, Json(stock)).into_response(),
        None => {
            let snapshot = state.store.snapshot().await;
            report_store_error(&snapshot);
            api_error(StatusCode::BAD_GATEWAY, snapshot.error)
        }
    }
}

async fn api_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ResearchRequest>,
) -> Response {
    let num_of_articles = match input.validate() {
        Ok(n) => n,
        Err(errors) => return invalid(errors),
    };

    match state.store.research(&id, num_of_articles).await {
        ResearchOutcome::NotTracked => {
            return api_error(StatusCode::NOT_FOUND, Some(format!("no stock with id {id}")));
        }
        ResearchOutcome::Failed => {
            let snapshot = state.store.snapshot().await;
            report_store_error(&snapshot);
            return api_error(StatusCode::BAD_GATEWAY, snapshot.error);
        }
        ResearchOutcome::Finished => report_store_error(&state.store.snapshot().await),
    }

    match state.store.get(&id).await {
        Some(stock) => Json::<Stock>(stock).into_response(),
        None => api_error(StatusCode::NOT_FOUND, Some(format!("no stock with id {id}"))),
    }
}

async fn api_delete(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.store.delete(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

fn invalid(errors: FieldErrors) -> Response {
    #[derive(Serialize)]
    struct Invalid {
        errors: FieldErrors,
    }
    (StatusCode::UNPROCESSABLE_ENTITY, Json(Invalid { errors })).into_response()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
