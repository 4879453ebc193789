// Ledger reconstruction: balance, chart series and transaction table
// derived from the raw explorer data of one watched address.
//
// Everything here is a pure function of its inputs.

use std::cmp::{Ordering, Reverse};

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::ledger::{
    Balance, ChartPoint, Direction, ProcessedTransaction, RawTransaction, TxStatus,
    UnspentOutput, SATS_PER_BTC,
};
use crate::models::{
    ChartRange, DirectionFilter, PaginationMeta, SortDirection, SortKey, SortSpec,
    TransactionPage,
};

/// Rows per page of the transaction table
pub const DEFAULT_PAGE_SIZE: usize = 9;

pub fn sats_to_btc(sats: i64) -> Decimal {
    Decimal::from(sats) / Decimal::from(SATS_PER_BTC)
}

/// Sum of satoshi amounts, saturating at `i64::MAX` for malformed input
fn total_sats(values: impl Iterator<Item = u64>) -> i64 {
    let total = values.fold(0u64, u64::saturating_add);
    i64::try_from(total).unwrap_or(i64::MAX)
}

/// Net effect of a transaction on `address` in satoshis (received - spent)
pub fn net_sats(tx: &RawTransaction, address: &str) -> i64 {
    let value_in = total_sats(
        tx.inputs
            .iter()
            .filter_map(|input| input.prevout.as_ref())
            .filter(|prevout| prevout.belongs_to(address))
            .map(|prevout| prevout.value),
    );
    let value_out = total_sats(
        tx.outputs
            .iter()
            .filter(|output| output.belongs_to(address))
            .map(|output| output.value),
    );

    value_out.saturating_sub(value_in)
}

fn utxo_total_sats(utxos: &[UnspentOutput]) -> i64 {
    total_sats(utxos.iter().map(|utxo| utxo.value))
}

/// Current balance: sum of unspent outputs, valued at `price_usd` per BTC
pub fn compute_balance(utxos: &[UnspentOutput], price_usd: Decimal) -> Balance {
    let btc = sats_to_btc(utxo_total_sats(utxos));
    Balance {
        btc,
        usd: btc * price_usd,
    }
}

/// Running balance after each confirmed transaction, oldest first.
///
/// USD values use today's price for every point; there is no historical
/// price lookup.
pub fn build_chart_series(
    transactions: &[RawTransaction],
    address: &str,
    price_usd: Decimal,
) -> Vec<ChartPoint> {
    let mut confirmed: Vec<(i64, &RawTransaction)> = transactions
        .iter()
        .filter_map(|tx| tx.confirmation_time().map(|time| (time, tx)))
        .collect();
    confirmed.sort_by_key(|(time, _)| *time);

    let mut running_sats: i64 = 0;
    confirmed
        .into_iter()
        .map(|(time, tx)| {
            running_sats = running_sats.saturating_add(net_sats(tx, address));
            let date = timestamp_to_date(time);
            let balance = sats_to_btc(running_sats);

            ChartPoint {
                date: date.format("%b %d").to_string(),
                balance,
                full_date: date.format("%a %b %d %Y").to_string().to_uppercase(),
                usd_balance: format_usd(balance * price_usd),
                timestamp: time,
            }
        })
        .collect()
}

/// Transaction table rows, newest first, each annotated with the balance
/// right after it.
///
/// Confirmed rows walk backward from the current UTXO total, undoing one
/// transaction at a time. Pending rows sort first and show the current
/// total adjusted by their own effect only; they do not move the walk.
pub fn build_transaction_rows(
    transactions: &[RawTransaction],
    utxos: &[UnspentOutput],
    address: &str,
) -> Vec<ProcessedTransaction> {
    let mut ordered: Vec<&RawTransaction> = transactions.iter().collect();
    ordered.sort_by_key(|tx| Reverse(tx.confirmation_time().unwrap_or(i64::MAX)));

    let final_sats = utxo_total_sats(utxos);
    let mut running_sats = final_sats;

    ordered
        .into_iter()
        .map(|tx| {
            let net = net_sats(tx, address);
            let confirmed_at = tx.confirmation_time();

            let balance_after = if confirmed_at.is_some() {
                let after = running_sats;
                running_sats = running_sats.saturating_sub(net);
                after
            } else {
                final_sats.saturating_add(net)
            };

            ProcessedTransaction {
                txid: tx.txid.clone(),
                direction: if net > 0 {
                    Direction::Receive
                } else {
                    Direction::Send
                },
                date: confirmed_at.map(timestamp_to_date),
                amount: sats_to_btc(net),
                balance: sats_to_btc(balance_after),
                status: if confirmed_at.is_some() {
                    TxStatus::Completed
                } else {
                    TxStatus::Pending
                },
            }
        })
        .collect()
}

fn matches_filter(filter: DirectionFilter, direction: Direction) -> bool {
    match filter {
        DirectionFilter::All => true,
        DirectionFilter::Sent => direction == Direction::Send,
        DirectionFilter::Received => direction == Direction::Receive,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

// Undated (pending) rows go last when ascending and first when descending.
fn compare_dates(
    a: Option<&DateTime<Utc>>,
    b: Option<&DateTime<Utc>>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(b), direction),
        (Some(_), None) => directed(Ordering::Less, direction),
        (None, Some(_)) => directed(Ordering::Greater, direction),
        (None, None) => Ordering::Equal,
    }
}

fn compare_rows(a: &ProcessedTransaction, b: &ProcessedTransaction, sort: SortSpec) -> Ordering {
    let ordering = match sort.key {
        SortKey::Date => return compare_dates(a.date.as_ref(), b.date.as_ref(), sort.direction),
        SortKey::Direction => a.direction.as_str().cmp(b.direction.as_str()),
        SortKey::Amount => a.amount.cmp(&b.amount),
        SortKey::Balance => a.balance.cmp(&b.balance),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::Txid => a.txid.cmp(&b.txid),
    };
    directed(ordering, sort.direction)
}

pub fn filtered_count(rows: &[ProcessedTransaction], filter: DirectionFilter) -> usize {
    rows.iter()
        .filter(|row| matches_filter(filter, row.direction))
        .count()
}

pub fn total_pages(count: usize, page_size: usize) -> u64 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size) as u64
}

/// Clamp a requested page into `[1, total_pages]` (page 1 when there are no rows)
pub fn clamp_page(page: u64, total_pages: u64) -> u64 {
    page.clamp(1, total_pages.max(1))
}

/// Filter, stable-sort and slice the rows for one page of the table.
///
/// `page` is 1-based and expected to be clamped already.
pub fn select_display_page(
    rows: &[ProcessedTransaction],
    filter: DirectionFilter,
    sort: SortSpec,
    page: u64,
    page_size: usize,
) -> Vec<ProcessedTransaction> {
    let mut selected: Vec<&ProcessedTransaction> = rows
        .iter()
        .filter(|row| matches_filter(filter, row.direction))
        .collect();
    selected.sort_by(|a, b| compare_rows(a, b, sort));

    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size);
    selected
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect()
}

/// One page of the table together with its pagination metadata
pub fn transaction_page(
    rows: &[ProcessedTransaction],
    filter: DirectionFilter,
    sort: SortSpec,
    requested_page: u64,
    page_size: usize,
) -> TransactionPage {
    let total = filtered_count(rows, filter);
    let pages = total_pages(total, page_size);
    let page = clamp_page(requested_page, pages);

    TransactionPage {
        data: select_display_page(rows, filter, sort, page, page_size),
        pagination: PaginationMeta {
            total: total as u64,
            page,
            limit: page_size as u64,
            total_pages: pages,
        },
    }
}

impl ChartRange {
    /// Earliest instant shown for this range
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            ChartRange::OneDay => now.checked_sub_signed(Duration::days(7)),
            ChartRange::OneWeek => now.checked_sub_signed(Duration::days(28)),
            ChartRange::OneMonth => now.checked_sub_months(Months::new(6)),
            ChartRange::ThreeMonths => now.checked_sub_months(Months::new(18)),
            ChartRange::OneYear => now.checked_sub_months(Months::new(72)),
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Chart points inside the window of `range` ending at `now`
pub fn filter_chart_range(
    points: &[ChartPoint],
    range: ChartRange,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let start = range.window_start(now).timestamp();
    points
        .iter()
        .filter(|point| point.timestamp >= start)
        .cloned()
        .collect()
}

/// Format a USD amount as "$1,234.56" ("-$1,234.56" when negative)
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

fn timestamp_to_date(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
