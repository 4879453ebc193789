// Ledger data model: explorer wire types and the derived dashboard values

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Satoshis per bitcoin. The only divisor used for sat -> BTC conversion.
pub const SATS_PER_BTC: i64 = 100_000_000;

/// Transaction as returned by `GET /address/{address}/txs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub status: ConfirmationStatus,
    #[serde(rename = "vin", default)]
    pub inputs: Vec<TxInput>,
    #[serde(rename = "vout", default)]
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

/// Transaction input; `prevout` is the output being spent (absent for coinbase)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub prevout: Option<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(rename = "scriptpubkey_address", default)]
    pub address: Option<String>,
    pub value: u64,
}

/// Entry of `GET /address/{address}/utxo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub value: u64,
}

impl RawTransaction {
    /// Block time of a confirmed transaction.
    ///
    /// A transaction flagged confirmed but carrying no block time is treated
    /// as unconfirmed: it has no position on the timeline.
    pub fn confirmation_time(&self) -> Option<i64> {
        if self.status.confirmed {
            self.status.block_time
        } else {
            None
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation_time().is_some()
    }
}

impl TxOutput {
    pub fn belongs_to(&self, address: &str) -> bool {
        self.address.as_deref() == Some(address)
    }
}

/// Current balance of the watched address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub btc: Decimal,
    pub usd: Decimal,
}

/// One sample of the historical balance chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Short label, e.g. "Mar 05"
    pub date: String,
    /// Running BTC balance after this transaction
    pub balance: Decimal,
    /// Long label, e.g. "TUE MAR 05 2024"
    pub full_date: String,
    /// Balance at today's price, e.g. "$1,234.56"
    pub usd_balance: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Send => "SEND",
            Direction::Receive => "RECEIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Completed,
    Pending,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Completed => "Completed",
            TxStatus::Pending => "Pending",
        }
    }
}

/// One row of the transaction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTransaction {
    pub txid: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub date: Option<DateTime<Utc>>,
    /// Signed net amount in BTC
    pub amount: Decimal,
    /// BTC balance after this transaction (hypothetical for pending rows)
    pub balance: Decimal,
    pub status: TxStatus,
}
