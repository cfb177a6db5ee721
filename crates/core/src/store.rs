//! Client-side state for the dashboard.
//!
//! `StockStore` owns the stock collection plus the loading and error flags
//! and is shared between request handlers behind an `Arc`. Every mutation
//! goes through one async mutex, which is released before any backend call
//! so a slow request never blocks readers.
//!
//! `fetch_all` is guarded by `is_loading`: a second call while a load is in
//! flight returns without touching the network. `add` and `research` are not
//! excluded; they may race a fetch and the last writer wins.

use crate::client::SentimentBackend;
use crate::domain::request::ValidNewStock;
use crate::domain::stock::Stock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub stocks: Vec<Stock>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl StoreState {
    pub fn get(&self, id: &str) -> Option<&Stock> {
        self.stocks.iter().find(|s| s.id == id)
    }

    fn set_researching(&mut self, id: &str, value: bool) {
        for stock in self.stocks.iter_mut().filter(|s| s.id == id) {
            stock.is_researching = value;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Another fetch was already in flight; nothing was sent.
    Skipped,
    Loaded(usize),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchOutcome {
    /// The id is not in the collection; nothing was sent.
    NotTracked,
    Finished,
    Failed,
}

pub struct StockStore {
    backend: Arc<dyn SentimentBackend>,
    state: Mutex<StoreState>,
}

impl StockStore {
    pub fn new(backend: Arc<dyn SentimentBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Stock> {
        self.state.lock().await.get(id).cloned()
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.error = None;
    }

    pub async fn fetch_all(&self) -> FetchOutcome {
        {
            let mut state = self.state.lock().await;
            if state.is_loading {
                tracing::debug!("fetch_all skipped; a load is already in flight");
                return FetchOutcome::Skipped;
            }
            state.is_loading = true;
            state.error = None;
        }

        let result = self.backend.get_all().await;

        let mut state = self.state.lock().await;
        state.is_loading = false;
        match result {
            Ok(stocks) => {
                state.stocks = stocks.into_iter().map(Stock::normalize).collect();
                tracing::debug!(count = state.stocks.len(), "stocks loaded");
                FetchOutcome::Loaded(state.stocks.len())
            }
            Err(err) => {
                tracing::warn!(error = %err, "fetch_all failed");
                state.error = Some(format!("Failed to load stocks: {err:#}"));
                FetchOutcome::Failed
            }
        }
    }

    /// Creates a stock on the backend and appends it. Returns the stored record.
    pub async fn add(&self, request: &ValidNewStock) -> Option<Stock> {
        {
            let mut state = self.state.lock().await;
            state.is_loading = true;
            state.error = None;
        }

        let result = self.backend.create(request).await;

        let mut state = self.state.lock().await;
        state.is_loading = false;
        match result {
            Ok(stock) => {
                let stock = stock.normalize();
                // A fetch that raced this call may already have brought it in.
                match state.stocks.iter_mut().find(|s| s.id == stock.id) {
                    Some(existing) => *existing = stock.clone(),
                    None => state.stocks.push(stock.clone()),
                }
                tracing::info!(id = %stock.id, name = %stock.stock_name, "stock added");
                Some(stock)
            }
            Err(err) => {
                tracing::warn!(name = %request.name, error = %err, "add failed");
                state.error = Some(format!("Failed to add stock: {err:#}"));
                None
            }
        }
    }

    /// Runs a research pass for `id`, then reloads the whole collection.
    ///
    /// The stock's `is_researching` flag is set before the request goes out
    /// and is false once this returns, whatever the outcome. Ids that are not
    /// in the collection are ignored.
    pub async fn research(&self, id: &str, num_of_articles: u32) -> ResearchOutcome {
        {
            let mut state = self.state.lock().await;
            if state.get(id).is_none() {
                tracing::debug!(%id, "research skipped: stock not tracked");
                return ResearchOutcome::NotTracked;
            }
            state.error = None;
            state.set_researching(id, true);
        }

        match self.backend.update(id, num_of_articles).await {
            Ok(updated) => {
                {
                    let mut state = self.state.lock().await;
                    let updated = updated.normalize();
                    if let Some(existing) = state.stocks.iter_mut().find(|s| s.id == id) {
                        *existing = updated;
                    }
                    state.set_researching(id, false);
                }
                tracing::info!(%id, num_of_articles, "research finished; reloading");
                self.fetch_all().await;
                ResearchOutcome::Finished
            }
            Err(err) => {
                tracing::warn!(%id, error = %err, "research failed");
                let mut state = self.state.lock().await;
                state.set_researching(id, false);
                state.error = Some(format!("Failed to research stock: {err:#}"));
                ResearchOutcome::Failed
            }
        }
    }

    /// Removes a stock from local state only. The backend is not told.
    pub async fn delete(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.stocks.len();
        state.stocks.retain(|s| s.id != id);
        before != state.stocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BackendError, Endpoint};
    use crate::domain::sentiment::Sentiment;
    use crate::domain::stock::ResearchRecord;
    use serde_json::Map;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn stock(id: &str, name: &str) -> Stock {
        Stock {
            id: id.to_string(),
            stock_name: name.to_string(),
            exchange_name: "NASDAQ".to_string(),
            articles_count: "10".to_string(),
            created_at: "2026-03-01T10:00:00Z".to_string(),
            history: Vec::new(),
            is_researching: false,
            extra: Map::new(),
        }
    }

    /// In-memory backend. `hold` parks the next call until `release`.
    #[derive(Default)]
    struct FakeBackend {
        stocks: std::sync::Mutex<Vec<Stock>>,
        fail: AtomicBool,
        hold: AtomicBool,
        gate: Notify,
        create_calls: AtomicUsize,
        update_calls: AtomicUsize,
        get_all_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn with_stocks(stocks: Vec<Stock>) -> Arc<Self> {
            let fake = Self::default();
            *fake.stocks.lock().unwrap() = stocks;
            Arc::new(fake)
        }

        fn release(&self) {
            self.hold.store(false, Ordering::SeqCst);
            self.gate.notify_one();
        }

        async fn wait_if_held(&self) {
            if self.hold.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
        }

        fn check(&self, endpoint: Endpoint) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackendError {
                    endpoint,
                    status: Some(500),
                    detail: "boom".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl SentimentBackend for FakeBackend {
        async fn create(&self, request: &ValidNewStock) -> anyhow::Result<Stock> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_if_held().await;
            self.check(Endpoint::Create)?;
            let mut stocks = self.stocks.lock().unwrap();
            let created = stock(&format!("id-{}", stocks.len() + 1), &request.name);
            stocks.push(created.clone());
            Ok(created)
        }

        async fn update(&self, id: &str, num_of_articles: u32) -> anyhow::Result<Stock> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_if_held().await;
            self.check(Endpoint::Update)?;
            let mut stocks = self.stocks.lock().unwrap();
            let target = stocks
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| anyhow::anyhow!("unknown id {id}"))?;
            target.articles_count = num_of_articles.to_string();
            target.history.push(ResearchRecord {
                sentiment: Sentiment::Positive,
                sentiment_score: "0.5".to_string(),
                last_researched: "2026-03-02T10:00:00Z".to_string(),
            });
            Ok(target.clone())
        }

        async fn get_all(&self) -> anyhow::Result<Vec<Stock>> {
            self.get_all_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_if_held().await;
            self.check(Endpoint::GetAll)?;
            Ok(self.stocks.lock().unwrap().clone())
        }
    }

    async fn wait_for(counter: &AtomicUsize, n: usize) {
        while counter.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    fn valid(name: &str) -> ValidNewStock {
        ValidNewStock {
            name: name.to_string(),
            exchange: "NYSE".to_string(),
            num_of_articles: 10,
        }
    }

    #[tokio::test]
    async fn fetch_all_loads_collection() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple"), stock("2", "Tesla")]);
        let store = StockStore::new(fake.clone());

        assert_eq!(store.fetch_all().await, FetchOutcome::Loaded(2));
        let snap = store.snapshot().await;
        assert_eq!(snap.stocks.len(), 2);
        assert!(!snap.is_loading);
        assert_eq!(snap.error, None);
    }

    #[tokio::test]
    async fn fetch_all_while_loading_sends_nothing() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple")]);
        fake.hold.store(true, Ordering::SeqCst);
        let store = Arc::new(StockStore::new(fake.clone()));

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_all().await }
        });
        wait_for(&fake.get_all_calls, 1).await;
        assert!(store.snapshot().await.is_loading);

        assert_eq!(store.fetch_all().await, FetchOutcome::Skipped);
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);

        fake.release();
        assert_eq!(first.await.unwrap(), FetchOutcome::Loaded(1));
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);
        assert!(!store.snapshot().await.is_loading);
    }

    #[tokio::test]
    async fn failed_fetch_sets_error_and_clears_loading() {
        let fake = FakeBackend::with_stocks(vec![]);
        fake.fail.store(true, Ordering::SeqCst);
        let store = StockStore::new(fake.clone());

        assert_eq!(store.fetch_all().await, FetchOutcome::Failed);
        let snap = store.snapshot().await;
        assert!(!snap.is_loading);
        let message = snap.error.unwrap();
        assert!(message.starts_with("Failed to load stocks"));
        assert!(message.contains("/get_all"));

        // The next attempt clears the banner.
        fake.fail.store(false, Ordering::SeqCst);
        store.fetch_all().await;
        assert_eq!(store.snapshot().await.error, None);
    }

    #[tokio::test]
    async fn add_appends_exactly_once() {
        let fake = FakeBackend::with_stocks(vec![stock("existing", "Apple")]);
        let store = StockStore::new(fake.clone());
        store.fetch_all().await;

        let added = store.add(&valid("Nvidia")).await.unwrap();
        let snap = store.snapshot().await;
        assert_eq!(snap.stocks.iter().filter(|s| s.id == added.id).count(), 1);
        assert_eq!(snap.stocks.len(), 2);
        assert!(!snap.is_loading);
        assert_eq!(fake.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_does_not_duplicate_a_stock_a_fetch_already_loaded() {
        let fake = FakeBackend::with_stocks(vec![]);
        let store = StockStore::new(fake.clone());

        // A racing fetch landed the record before the create response did.
        store.state.lock().await.stocks.push(stock("id-1", "Nvidia"));

        let added = store.add(&valid("Nvidia")).await.unwrap();
        assert_eq!(added.id, "id-1");
        let snap = store.snapshot().await;
        assert_eq!(snap.stocks.len(), 1);
    }

    #[tokio::test]
    async fn failed_add_leaves_collection_unchanged() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple")]);
        let store = StockStore::new(fake.clone());
        store.fetch_all().await;
        let before = store.snapshot().await.stocks;

        fake.fail.store(true, Ordering::SeqCst);
        assert!(store.add(&valid("Nvidia")).await.is_none());

        let snap = store.snapshot().await;
        assert_eq!(snap.stocks, before);
        assert!(snap.error.unwrap().starts_with("Failed to add stock"));
        assert!(!snap.is_loading);
    }

    #[tokio::test]
    async fn research_flag_is_set_then_cleared_on_success() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple"), stock("2", "Tesla")]);
        let store = Arc::new(StockStore::new(fake.clone()));
        store.fetch_all().await;

        fake.hold.store(true, Ordering::SeqCst);
        let task = tokio::spawn({
            let store = store.clone();
            async move { store.research("1", 25).await }
        });
        wait_for(&fake.update_calls, 1).await;

        let snap = store.snapshot().await;
        assert!(snap.get("1").unwrap().is_researching);
        assert!(!snap.get("2").unwrap().is_researching);

        fake.release();
        assert_eq!(task.await.unwrap(), ResearchOutcome::Finished);

        let snap = store.snapshot().await;
        let apple = snap.get("1").unwrap();
        assert!(!apple.is_researching);
        assert_eq!(apple.history.len(), 1);
        assert_eq!(apple.articles(), Some(25));
        // Initial load plus the reconciling reload.
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn research_flag_is_cleared_on_failure() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple")]);
        let store = Arc::new(StockStore::new(fake.clone()));
        store.fetch_all().await;

        fake.hold.store(true, Ordering::SeqCst);
        fake.fail.store(true, Ordering::SeqCst);
        let task = tokio::spawn({
            let store = store.clone();
            async move { store.research("1", 5).await }
        });
        wait_for(&fake.update_calls, 1).await;
        assert!(store.snapshot().await.get("1").unwrap().is_researching);

        fake.release();
        assert_eq!(task.await.unwrap(), ResearchOutcome::Failed);

        let snap = store.snapshot().await;
        assert!(!snap.get("1").unwrap().is_researching);
        assert!(snap.error.unwrap().starts_with("Failed to research stock"));
        // No reload on the error path.
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn research_flag_clears_even_when_reload_is_skipped() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple")]);
        let store = StockStore::new(fake.clone());
        store.fetch_all().await;

        // Pretend another load is in flight so the reconciling reload is a no-op.
        store.state.lock().await.is_loading = true;
        assert_eq!(store.research("1", 5).await, ResearchOutcome::Finished);

        let snap = store.snapshot().await;
        assert!(!snap.get("1").unwrap().is_researching);
        assert_eq!(snap.get("1").unwrap().history.len(), 1);
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn research_on_untracked_id_sends_nothing() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple"), stock("ghost", "Ghost")]);
        let store = StockStore::new(fake.clone());
        store.fetch_all().await;
        store.delete("ghost").await;
        store.state.lock().await.error = Some("stale".to_string());

        assert_eq!(store.research("ghost", 5).await, ResearchOutcome::NotTracked);
        assert_eq!(fake.update_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);

        let snap = store.snapshot().await;
        assert_eq!(snap.error.as_deref(), Some("stale"));
        assert!(snap.stocks.iter().all(|s| !s.is_researching));
    }

    #[tokio::test]
    async fn delete_is_local_only() {
        let fake = FakeBackend::with_stocks(vec![stock("1", "Apple"), stock("2", "Tesla")]);
        let store = StockStore::new(fake.clone());
        store.fetch_all().await;

        assert!(store.delete("1").await);
        assert!(!store.delete("1").await);
        assert_eq!(store.snapshot().await.stocks.len(), 1);
        assert_eq!(fake.stocks.lock().unwrap().len(), 2);
        assert_eq!(fake.get_all_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clear_error_dismisses_banner() {
        let fake = FakeBackend::with_stocks(vec![]);
        fake.fail.store(true, Ordering::SeqCst);
        let store = StockStore::new(fake);
        store.fetch_all().await;
        assert!(store.snapshot().await.error.is_some());

        store.clear_error().await;
        assert_eq!(store.snapshot().await.error, None);
    }
}
