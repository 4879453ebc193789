use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::error::{WatchError, WatchResult};
use crate::models::ledger::{Balance, ChartPoint, ProcessedTransaction};
use crate::models::{ChartRange, DashboardQuery, DashboardView, TransactionPage, TransactionQuery};
use crate::services::explorer::BlockExplorer;
use crate::services::ledger;

/// Everything derived from one successful address load
#[derive(Debug, Clone)]
pub struct AddressSnapshot {
    pub address: String,
    pub price_usd: Decimal,
    pub balance: Balance,
    pub chart: Vec<ChartPoint>,
    pub rows: Vec<ProcessedTransaction>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct WatchState {
    latest_token: u64,
    loading: bool,
    snapshot: Option<Arc<AddressSnapshot>>,
    error: Option<String>,
    in_flight: Option<AbortHandle>,
}

type WatchStates = RwLock<HashMap<Uuid, WatchState>>;

/// Per-user watched address state.
///
/// Each submission gets a token from a monotonically increasing counter.
/// Only the result carrying a user's latest token is applied; a newer
/// submission aborts the older in-flight load. The load task applies its own
/// result, so a caller that stops waiting does not strand the state.
pub struct DashboardService {
    explorer: Arc<dyn BlockExplorer>,
    network: Network,
    page_size: usize,
    next_token: AtomicU64,
    states: Arc<WatchStates>,
}

/// Fetch transactions, UTXOs and price concurrently and derive the snapshot.
/// Any failed fetch fails the whole load.
async fn load_snapshot(explorer: &dyn BlockExplorer, address: &str) -> WatchResult<AddressSnapshot> {
    let (transactions, utxos, price) = tokio::try_join!(
        explorer.get_address_transactions(address),
        explorer.get_address_utxos(address),
        explorer.get_price_usd(),
    )?;

    let price_usd = Decimal::from_f64(price)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| WatchError::Unexpected(format!("Invalid BTC price: {}", price)))?;

    tracing::debug!(
        "Loaded {} transactions and {} UTXOs for {}",
        transactions.len(),
        utxos.len(),
        address
    );

    Ok(AddressSnapshot {
        address: address.to_string(),
        price_usd,
        balance: ledger::compute_balance(&utxos, price_usd),
        chart: ledger::build_chart_series(&transactions, address, price_usd),
        rows: ledger::build_transaction_rows(&transactions, &utxos, address),
        loaded_at: Utc::now(),
    })
}

/// Store the outcome of request `token` if it is still the user's latest
async fn apply_outcome(
    states: &WatchStates,
    user: Uuid,
    token: u64,
    outcome: WatchResult<AddressSnapshot>,
) -> WatchResult<Arc<AddressSnapshot>> {
    let mut states = states.write().await;
    let state = match states.get_mut(&user) {
        Some(state) if state.latest_token == token => state,
        _ => {
            tracing::debug!("Discarding stale result of request {}", token);
            return Err(WatchError::Superseded);
        }
    };

    state.loading = false;
    state.in_flight = None;
    match outcome {
        Ok(snapshot) => {
            let snapshot = Arc::new(snapshot);
            state.snapshot = Some(Arc::clone(&snapshot));
            state.error = None;
            Ok(snapshot)
        }
        Err(err) => {
            tracing::warn!("Request {} for user {} failed: {:?}", token, user, err);
            state.snapshot = None;
            state.error = Some(err.to_string());
            Err(err)
        }
    }
}

impl DashboardService {
    pub fn new(explorer: Arc<dyn BlockExplorer>, network: Network, page_size: usize) -> Self {
        Self {
            explorer,
            network,
            page_size: page_size.max(1),
            next_token: AtomicU64::new(0),
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn explorer_name(&self) -> String {
        self.explorer.provider_name()
    }

    /// Normalize a user-entered address and check it belongs to the configured network
    pub fn validate_address(&self, raw: &str) -> WatchResult<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WatchError::InvalidRequest(
                "Bitcoin address is required.".to_string(),
            ));
        }

        let unchecked = trimmed
            .parse::<Address<NetworkUnchecked>>()
            .map_err(|_| WatchError::InvalidRequest(format!("Invalid Bitcoin address: {}", trimmed)))?;
        let address = unchecked.require_network(self.network).map_err(|_| {
            WatchError::InvalidRequest(format!(
                "Address {} is not valid on {}",
                trimmed, self.network
            ))
        })?;

        Ok(address.to_string())
    }

    /// Load `raw_address` for `user`, replacing whatever was displayed before.
    ///
    /// The load keeps running and updates the user's state even if the
    /// returned future is dropped.
    pub async fn submit_address(
        &self,
        user: Uuid,
        raw_address: &str,
    ) -> WatchResult<Arc<AddressSnapshot>> {
        let address = self.validate_address(raw_address)?;

        let (token, task) = {
            let mut states = self.states.write().await;
            let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;

            let explorer = Arc::clone(&self.explorer);
            let task_states = Arc::clone(&self.states);
            let task_address = address.clone();
            let task = tokio::spawn(async move {
                let outcome = load_snapshot(explorer.as_ref(), &task_address).await;
                apply_outcome(&task_states, user, token, outcome).await
            });

            let state = states.entry(user).or_default();
            if let Some(previous) = state.in_flight.replace(task.abort_handle()) {
                previous.abort();
            }
            state.latest_token = token;
            state.loading = true;
            state.snapshot = None;
            state.error = None;

            (token, task)
        };
        tracing::info!("User {} submitted address {} (request {})", user, address, token);

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Request {} aborted by a newer submission", token);
                Err(WatchError::Superseded)
            }
            Err(e) => {
                let err = WatchError::Unexpected(format!("Address load task failed: {}", e));
                apply_outcome(&self.states, user, token, Err(err)).await
            }
        }
    }

    async fn current(&self, user: Uuid) -> (Option<Arc<AddressSnapshot>>, bool, Option<String>) {
        let states = self.states.read().await;
        match states.get(&user) {
            Some(state) => (state.snapshot.clone(), state.loading, state.error.clone()),
            None => (None, false, None),
        }
    }

    fn page_of(&self, snapshot: Option<&AddressSnapshot>, query: &TransactionQuery) -> TransactionPage {
        let rows = snapshot.map(|s| s.rows.as_slice()).unwrap_or(&[]);
        ledger::transaction_page(rows, query.filter, query.sort_spec(), query.page, self.page_size)
    }

    fn chart_of(&self, snapshot: Option<&AddressSnapshot>, range: ChartRange) -> Vec<ChartPoint> {
        snapshot
            .map(|s| ledger::filter_chart_range(&s.chart, range, Utc::now()))
            .unwrap_or_default()
    }

    pub async fn view(&self, user: Uuid, query: &DashboardQuery) -> DashboardView {
        let (snapshot, loading, error) = self.current(user).await;
        let snapshot = snapshot.as_deref();

        DashboardView {
            address: snapshot.map(|s| s.address.clone()),
            balance: snapshot.map(|s| s.balance.clone()),
            price_usd: snapshot.map(|s| s.price_usd),
            loaded_at: snapshot.map(|s| s.loaded_at),
            range: query.range,
            chart: self.chart_of(snapshot, query.range),
            transactions: self.page_of(snapshot, &query.table),
            loading,
            error,
        }
    }

    pub async fn transactions(&self, user: Uuid, query: &TransactionQuery) -> TransactionPage {
        let (snapshot, _, _) = self.current(user).await;
        self.page_of(snapshot.as_deref(), query)
    }

    pub async fn chart(&self, user: Uuid, range: ChartRange) -> Vec<ChartPoint> {
        let (snapshot, _, _) = self.current(user).await;
        self.chart_of(snapshot.as_deref(), range)
    }

    /// Drop the user's state and abort any load in flight
    pub async fn clear(&self, user: Uuid) {
        if let Some(state) = self.states.write().await.remove(&user) {
            if let Some(task) = state.in_flight {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExplorerError, Resource};
    use crate::models::ledger::{
        ConfirmationStatus, RawTransaction, TxInput, TxOutput, UnspentOutput,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    const GENESIS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const SLOW: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";

    #[derive(Default)]
    struct StubExplorer {
        fail: Option<Resource>,
        slow_address: Option<&'static str>,
        slow_for: Duration,
        network_down: bool,
    }

    #[async_trait]
    impl BlockExplorer for StubExplorer {
        fn provider_name(&self) -> String {
            "stub".to_string()
        }

        async fn get_address_transactions(
            &self,
            address: &str,
        ) -> Result<Vec<RawTransaction>, ExplorerError> {
            if self.slow_address == Some(address) {
                tokio::time::sleep(self.slow_for).await;
            }
            if self.fail == Some(Resource::Transactions) {
                return Err(ExplorerError::Status {
                    resource: Resource::Transactions,
                    status: 400,
                });
            }
            Ok(vec![
                RawTransaction {
                    txid: "funding".into(),
                    status: ConfirmationStatus {
                        confirmed: true,
                        block_time: Some(1_700_000_000),
                    },
                    inputs: vec![TxInput { prevout: None }],
                    outputs: vec![TxOutput {
                        address: Some(address.to_string()),
                        value: 80_000_000,
                    }],
                },
                RawTransaction {
                    txid: "incoming".into(),
                    status: ConfirmationStatus {
                        confirmed: false,
                        block_time: None,
                    },
                    inputs: vec![],
                    outputs: vec![TxOutput {
                        address: Some(address.to_string()),
                        value: 5_000,
                    }],
                },
            ])
        }

        async fn get_address_utxos(
            &self,
            _address: &str,
        ) -> Result<Vec<UnspentOutput>, ExplorerError> {
            if self.fail == Some(Resource::Utxos) {
                return Err(ExplorerError::Status {
                    resource: Resource::Utxos,
                    status: 500,
                });
            }
            Ok(vec![
                UnspentOutput { value: 50_000_000 },
                UnspentOutput { value: 30_000_000 },
            ])
        }

        async fn get_price_usd(&self) -> Result<f64, ExplorerError> {
            if self.fail == Some(Resource::Prices) {
                return Err(ExplorerError::Status {
                    resource: Resource::Prices,
                    status: 503,
                });
            }
            if self.network_down {
                return Err(ExplorerError::Network {
                    resource: Resource::Prices,
                    message: "connection refused".into(),
                });
            }
            Ok(60_000.0)
        }
    }

    fn service(explorer: StubExplorer) -> DashboardService {
        DashboardService::new(Arc::new(explorer), Network::Bitcoin, 9)
    }

    #[tokio::test]
    async fn test_submit_builds_snapshot() {
        let dashboard = service(StubExplorer::default());
        let user = Uuid::new_v4();

        let snapshot = dashboard.submit_address(user, &format!(" {} ", GENESIS)).await.unwrap();
        assert_eq!(snapshot.address, GENESIS);
        assert_eq!(snapshot.balance.btc, Decimal::new(8, 1));
        assert_eq!(snapshot.balance.usd, Decimal::from(48_000));
        assert_eq!(snapshot.chart.len(), 1);
        assert_eq!(snapshot.rows.len(), 2);

        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert_eq!(view.address.as_deref(), Some(GENESIS));
        assert_eq!(view.price_usd, Some(Decimal::from(60_000)));
        assert_eq!(view.loaded_at, Some(snapshot.loaded_at));
        assert!(!view.loading);
        assert!(view.error.is_none());
        assert_eq!(view.transactions.pagination.total, 2);
        assert_eq!(view.transactions.data[0].txid, "incoming");
    }

    #[tokio::test]
    async fn test_failed_fetch_clears_state() {
        for resource in [Resource::Transactions, Resource::Utxos, Resource::Prices] {
            let dashboard = service(StubExplorer {
                fail: Some(resource),
                ..StubExplorer::default()
            });
            let user = Uuid::new_v4();

            let err = dashboard.submit_address(user, GENESIS).await.unwrap_err();
            assert_eq!(err.to_string(), resource.failure_message());

            let view = dashboard.view(user, &DashboardQuery::default()).await;
            assert!(view.address.is_none());
            assert!(view.balance.is_none());
            assert!(view.chart.is_empty());
            assert!(view.transactions.data.is_empty());
            assert_eq!(view.error.as_deref(), Some(resource.failure_message()));
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_generic() {
        let dashboard = service(StubExplorer {
            network_down: true,
            ..StubExplorer::default()
        });
        let user = Uuid::new_v4();

        let err = dashboard.submit_address(user, GENESIS).await.unwrap_err();
        assert!(matches!(err, WatchError::Unexpected(_)));

        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert!(view.address.is_none());
        assert_eq!(view.error.as_deref(), Some("An unexpected error occurred."));
    }

    #[tokio::test]
    async fn test_load_completes_after_caller_gives_up() {
        let dashboard = service(StubExplorer {
            slow_address: Some(SLOW),
            slow_for: Duration::from_millis(200),
            ..StubExplorer::default()
        });
        let user = Uuid::new_v4();

        let waited =
            tokio::time::timeout(Duration::from_millis(20), dashboard.submit_address(user, SLOW))
                .await;
        assert!(waited.is_err());
        assert!(dashboard.view(user, &DashboardQuery::default()).await.loading);

        tokio::time::sleep(Duration::from_millis(600)).await;

        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert!(!view.loading);
        assert_eq!(view.address.as_deref(), Some(SLOW));
        assert!(view.error.is_none());
        assert_eq!(view.transactions.pagination.total, 2);
    }

    #[tokio::test]
    async fn test_invalid_address_leaves_state_untouched() {
        let dashboard = service(StubExplorer::default());
        let user = Uuid::new_v4();
        dashboard.submit_address(user, GENESIS).await.unwrap();

        for bad in ["", "   ", "not-an-address", "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn"] {
            assert!(matches!(
                dashboard.submit_address(user, bad).await,
                Err(WatchError::InvalidRequest(_))
            ));
        }

        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert_eq!(view.address.as_deref(), Some(GENESIS));
    }

    #[tokio::test]
    async fn test_newer_submission_supersedes_older() {
        let dashboard = Arc::new(service(StubExplorer {
            slow_address: Some(SLOW),
            slow_for: Duration::from_secs(30),
            ..StubExplorer::default()
        }));
        let user = Uuid::new_v4();

        let slow = {
            let dashboard = Arc::clone(&dashboard);
            tokio::spawn(async move { dashboard.submit_address(user, SLOW).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fast = dashboard.submit_address(user, GENESIS).await.unwrap();
        assert_eq!(fast.address, GENESIS);

        let stale = slow.await.unwrap();
        assert!(matches!(stale, Err(WatchError::Superseded)));

        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert_eq!(view.address.as_deref(), Some(GENESIS));
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let dashboard = service(StubExplorer::default());
        let user = Uuid::new_v4();
        dashboard.submit_address(user, GENESIS).await.unwrap();

        let late = load_snapshot(&StubExplorer::default(), SLOW).await;
        assert!(matches!(
            apply_outcome(&dashboard.states, user, 0, late).await,
            Err(WatchError::Superseded)
        ));
        let view = dashboard.view(user, &DashboardQuery::default()).await;
        assert_eq!(view.address.as_deref(), Some(GENESIS));
    }

    #[tokio::test]
    async fn test_users_are_isolated_and_clear_resets() {
        let dashboard = service(StubExplorer::default());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        dashboard.submit_address(alice, GENESIS).await.unwrap();

        assert!(dashboard.view(bob, &DashboardQuery::default()).await.address.is_none());
        assert_eq!(dashboard.chart(alice, ChartRange::OneDay).await.len(), 0);
        assert_eq!(
            dashboard.transactions(alice, &TransactionQuery::default()).await.data.len(),
            2
        );

        dashboard.clear(alice).await;
        assert!(dashboard.view(alice, &DashboardQuery::default()).await.address.is_none());
    }
}
