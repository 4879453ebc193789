// API request/response models
pub mod ledger;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use ledger::{Balance, ChartPoint, ProcessedTransaction};

/// Custom deserializer to convert string to u64
fn deserialize_string_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    s.parse::<u64>().map_err(serde::de::Error::custom)
}

fn default_page() -> u64 {
    1
}

/// Which rows of the transaction table to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirectionFilter {
    #[default]
    All,
    Sent,
    Received,
}

/// Column the transaction table is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    #[serde(rename = "type")]
    Direction,
    Amount,
    Balance,
    Status,
    Txid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Time window of the holdings chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChartRange {
    #[serde(rename = "1 D", alias = "1D")]
    OneDay,
    #[serde(rename = "1 WK", alias = "1WK")]
    OneWeek,
    #[default]
    #[serde(rename = "1 MO", alias = "1MO")]
    OneMonth,
    #[serde(rename = "3 MO", alias = "3MO")]
    ThreeMonths,
    #[serde(rename = "1 YR", alias = "1YR")]
    OneYear,
}

/// Query parameters for GET /dashboard/transactions
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionQuery {
    #[serde(default)]
    pub filter: DirectionFilter,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "default_page", deserialize_with = "deserialize_string_to_u64")]
    pub page: u64,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            filter: DirectionFilter::default(),
            sort: SortKey::default(),
            direction: SortDirection::default(),
            page: default_page(),
        }
    }
}

impl TransactionQuery {
    pub fn sort_spec(&self) -> SortSpec {
        SortSpec {
            key: self.sort,
            direction: self.direction,
        }
    }
}

/// Query parameters for GET /dashboard/chart
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartQuery {
    #[serde(default)]
    pub range: ChartRange,
}

/// Query parameters for GET /dashboard
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub range: ChartRange,
    #[serde(flatten)]
    pub table: TransactionQuery,
}

/// Pagination metadata for responses
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Response structure with pagination
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: T,
    pub pagination: PaginationMeta,
}

pub type TransactionPage = PaginatedResponse<Vec<ProcessedTransaction>>;

/// Request body for POST /dashboard/address
#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

/// Everything the dashboard renders for the signed-in user
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub address: Option<String>,
    pub balance: Option<Balance>,
    /// BTC price in USD used for every USD figure in this view
    pub price_usd: Option<Decimal>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub range: ChartRange,
    pub chart: Vec<ChartPoint>,
    pub transactions: TransactionPage,
    pub loading: bool,
    pub error: Option<String>,
}

/// Response for POST /api/check-email-allowed
#[derive(Debug, Serialize)]
pub struct CheckEmailResponse {
    #[serde(rename = "isAllowed")]
    pub is_allowed: bool,
}

/// Request body for POST /auth/sign-in
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub sent: bool,
    pub resend_after_secs: u64,
}

/// Query parameters for GET /auth/verify
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_query_defaults() {
        let query: DashboardQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.range, ChartRange::OneMonth);
        assert_eq!(query.table.filter, DirectionFilter::All);
        assert_eq!(query.table.sort, SortKey::Date);
        assert_eq!(query.table.direction, SortDirection::Desc);
        assert_eq!(query.table.page, 1);
    }

    #[test]
    fn test_dashboard_query_parses_strings() {
        let query: DashboardQuery = serde_json::from_value(serde_json::json!({
            "range": "1 YR",
            "filter": "RECEIVED",
            "sort": "type",
            "direction": "asc",
            "page": "3"
        }))
        .unwrap();
        assert_eq!(query.range, ChartRange::OneYear);
        assert_eq!(query.table.filter, DirectionFilter::Received);
        assert_eq!(query.table.sort, SortKey::Direction);
        assert_eq!(query.table.direction, SortDirection::Asc);
        assert_eq!(query.table.page, 3);
    }

    #[test]
    fn test_chart_range_accepts_compact_alias() {
        let range: ChartRange = serde_json::from_str("\"3MO\"").unwrap();
        assert_eq!(range, ChartRange::ThreeMonths);
    }
}
