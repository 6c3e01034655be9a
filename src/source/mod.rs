//! # source — Deal Source Adapter
//!
//! Capability ที่ห่อ MT5 terminal: login, health probe, ดึง deal history,
//! อ่าน balance ปัจจุบัน
//!
//! ## Implementations
//! 1. [`bridge::BridgeSource`] — MT5 bridge EA ผ่าน HTTP (`MT5_BASE_URL`)
//! 2. [`mock::MockTerminal`]   — in-process terminal (`MT5_BASE_URL=mock`) สำหรับ dev/test

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::error::{AuthError, SourceUnavailable};
use crate::models::{AccountHandle, AccountInfo, Credentials, Deal};

pub mod bridge;
pub mod mock;

pub use bridge::BridgeSource;
pub use mock::MockTerminal;

#[async_trait]
pub trait DealSource: Send + Sync {
    /// Establish a terminal session.  Any previous session is shut down first.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccountHandle, AuthError>;

    /// Non-blocking probe.  Never errors: any failure simply reads as `false`.
    async fn is_healthy(&self, handle: &AccountHandle) -> bool;

    /// All deals (opening and closing) with time in `[now - window, now]`.
    /// No deals is an empty `Vec`, not an error.
    async fn fetch_closed_deals(
        &self,
        handle: &AccountHandle,
        window: Duration,
    ) -> Result<Vec<Deal>, SourceUnavailable>;

    async fn account_info(&self, handle: &AccountHandle) -> Result<AccountInfo, SourceUnavailable>;

    async fn current_balance(&self, handle: &AccountHandle) -> Result<Decimal, SourceUnavailable> {
        Ok(self.account_info(handle).await?.balance)
    }

    /// Give the session back to the terminal.
    async fn release(&self, handle: AccountHandle);
}

/// `[now - window, now]`.  A window reaching past the representable calendar
/// fails the query instead of panicking the monitor loop.
pub(crate) fn window_bounds(window: Duration) -> Result<(DateTime<Utc>, DateTime<Utc>), SourceUnavailable> {
    let to = Utc::now();
    let from = to.checked_sub_signed(window).ok_or_else(|| {
        SourceUnavailable::new("history_deals", format!("lookback window of {} days is out of range", window.num_days()))
    })?;
    Ok((from, to))
}
