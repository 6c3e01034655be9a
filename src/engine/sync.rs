//! # engine::sync
//!
//! **Sync Engine** — หนึ่ง cycle ของการ mirror closed trades ไปที่ store
//!
//! ## Flow
//! ```text
//! 1. fetch deals ใน lookback window      (ว่าง → publish status แล้วจบ)
//! 2. กรองเฉพาะ closing deals (entry = OUT)  (ว่าง → จบ ไม่เขียนอะไร)
//! 3. อ่าน trades/ ครั้งเดียว → set ของ ticket ที่ sync แล้ว
//! 4. อ่าน balance ปัจจุบันครั้งเดียว (snapshot เดียวทั้ง cycle)
//! 5. เรียงตามเวลา (stable) → ข้าม ticket ที่มีแล้ว → map → เขียน trades/<ticket>
//! 6. publish connected status
//! ```
//!
//! ไม่มี cursor เก็บไว้ใน process — "sync แล้วหรือยัง" ดูจาก store อย่างเดียว
//! รันซ้ำกี่รอบ (หรือ crash กลางทาง) ผลสุดท้ายใน store ก็เหมือนรันครั้งเดียว

use std::collections::HashSet;

use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::engine::status::StatusPublisher;
use crate::error::SyncError;
use crate::models::{AccountHandle, Deal, TradeRecord, TICKET_FIELD};
use crate::source::DealSource;
use crate::store::{Store, TRADES_PATH};

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Deals returned by the terminal (all entry kinds)
    pub fetched: usize,
    pub closing: usize,
    /// Already present in the store
    pub skipped: usize,
    pub written: usize,
    /// Writes abandoned this cycle; retried next cycle
    pub failed:  usize,
}

// ─── Pure Helpers ─────────────────────────────────────────────────────────────

/// Tickets already in `trades/`.  Only object entries carrying a numeric
/// `mt5Ticket` count; anything else is ignored.
pub fn existing_tickets(subtree: &Map<String, Value>) -> HashSet<u64> {
    subtree
        .values()
        .filter_map(|entry| entry.as_object())
        .filter_map(|record| record.get(TICKET_FIELD))
        .filter_map(Value::as_u64)
        .collect()
}

/// Closing deals only, oldest first.  Equal timestamps keep source order.
pub fn closing_deals_chronological(deals: Vec<Deal>) -> Vec<Deal> {
    let mut closing: Vec<Deal> = deals.into_iter().filter(Deal::is_closing).collect();
    closing.sort_by_key(|d| d.time);
    closing
}

/// `current balance - (profit + commission + swap)` of this deal alone.
///
/// Every deal in a cycle is measured against the same balance snapshot; the
/// P/L of other deals closed in between is not walked back.  Downstream
/// consumers read `startingBalance` with exactly these semantics.
#[inline]
pub fn starting_balance(current_balance: Decimal, deal: &Deal) -> Decimal {
    current_balance - deal.net_profit()
}

// ─── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncEngine {
    window: Duration,
    status: StatusPublisher,
}

impl SyncEngine {
    pub fn new(window_days: u32, status: StatusPublisher) -> Self {
        Self {
            window: Duration::days(i64::from(window_days)),
            status,
        }
    }

    pub async fn run_cycle(
        &self,
        source: &dyn DealSource,
        store: &dyn Store,
        handle: &AccountHandle,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        // ── 1. Fetch ──────────────────────────────────────────────────────────
        let deals = source.fetch_closed_deals(handle, self.window).await?;
        report.fetched = deals.len();

        if deals.is_empty() {
            info!("No deals to sync");
            self.status.publish_connected(source, store, handle).await;
            return Ok(report);
        }

        // ── 2. Closing deals only ─────────────────────────────────────────────
        let closing = closing_deals_chronological(deals);
        report.closing = closing.len();

        if closing.is_empty() {
            info!("No closed positions found");
            return Ok(report);
        }

        info!(count = closing.len(), "Found closed positions");

        // ── 3. Existing tickets ───────────────────────────────────────────────
        let existing = existing_tickets(&store.read_subtree(TRADES_PATH).await?);

        // ── 4. Balance snapshot ───────────────────────────────────────────────
        let balance = source.current_balance(handle).await?;

        // ── 5. Write what's missing ───────────────────────────────────────────
        for deal in &closing {
            if existing.contains(&deal.ticket) {
                report.skipped += 1;
                continue;
            }

            let record = TradeRecord::from_deal(deal, starting_balance(balance, deal));

            let value = match serde_json::to_value(&record) {
                Ok(value) => value,
                Err(e) => {
                    error!(ticket = deal.ticket, error = %e, "Failed to serialize trade record");
                    report.failed += 1;
                    continue;
                }
            };

            match store.write_child(TRADES_PATH, &record.key(), &value).await {
                Ok(()) => {
                    info!(
                        ticket      = deal.ticket,
                        symbol      = %record.symbol,
                        profit_loss = %record.profit_loss,
                        "✅ Synced trade"
                    );
                    report.written += 1;
                }
                Err(e) => {
                    error!(ticket = deal.ticket, error = %e, "❌ Trade write failed — will retry next cycle");
                    report.failed += 1;
                }
            }
        }

        debug!(skipped = report.skipped, "Already-synced tickets skipped");

        // ── 6. Status ─────────────────────────────────────────────────────────
        self.status.publish(store, true, balance).await;

        info!(written = report.written, failed = report.failed, "Synced {} new trades", report.written);
        Ok(report)
    }
}
