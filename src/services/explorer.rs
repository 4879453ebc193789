//! Block explorer client (Esplora API as served by mempool.space)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ExplorerError, Resource};
use crate::models::ledger::{RawTransaction, UnspentOutput};

/// Source of address history, unspent outputs and the current BTC price
#[async_trait]
pub trait BlockExplorer: Send + Sync {
    fn provider_name(&self) -> String;

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<RawTransaction>, ExplorerError>;

    async fn get_address_utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, ExplorerError>;

    /// Current USD price of one bitcoin
    async fn get_price_usd(&self) -> Result<f64, ExplorerError>;
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(rename = "USD")]
    usd: f64,
}

/// mempool.space (or any Esplora-compatible) provider
#[derive(Debug, Clone)]
pub struct MempoolSpaceProvider {
    base_url: String,
    client: Client,
}

impl MempoolSpaceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExplorerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExplorerError::Client(e.to_string()))?;

        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// GET `{base_url}{path}` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: Resource,
        path: &str,
    ) -> Result<T, ExplorerError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Explorer request: GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExplorerError::Network {
                resource,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Explorer returned {} for {}", status, url);
            return Err(ExplorerError::Status {
                resource,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| ExplorerError::Parse {
            resource,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BlockExplorer for MempoolSpaceProvider {
    fn provider_name(&self) -> String {
        "mempool.space".to_string()
    }

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<RawTransaction>, ExplorerError> {
        self.get_json(Resource::Transactions, &format!("/address/{}/txs", address))
            .await
    }

    async fn get_address_utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, ExplorerError> {
        self.get_json(Resource::Utxos, &format!("/address/{}/utxo", address))
            .await
    }

    async fn get_price_usd(&self) -> Result<f64, ExplorerError> {
        let prices: PriceResponse = self.get_json(Resource::Prices, "/v1/prices").await?;
        Ok(prices.usd)
    }
}
