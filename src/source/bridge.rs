//! # source::bridge
//!
//! **MT5 Bridge Adapter** — คุยกับ MT5 terminal ผ่าน bridge EA ทาง HTTP
//!
//! ## Bridge API Contract (ฝั่ง EA / Python bridge)
//! ```text
//! POST /login            {"login": 123, "password": "...", "server": "..."}
//!                        → {"ok": true} | {"ok": false, "error": "..."}
//! GET  /account          → {"login": 123, "balance": 1000.0, "company": "...", "server": "..."}
//! GET  /history/deals?from=<unix>&to=<unix>
//!                        → [{"ticket": 1, "symbol": "EURUSD", "type": 0, "entry": 1,
//!                            "volume": 0.1, "profit": 5.0, "commission": -0.5,
//!                            "swap": 0.0, "time": 1735689600}, ...] | null
//! POST /shutdown         → {"ok": true}
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, SourceUnavailable};
use crate::models::{AccountHandle, AccountInfo, Credentials, Deal, DealEntry, DealType};
use crate::source::{window_bounds, DealSource};

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LoginRequest<'a> {
    login:    u64,
    password: &'a str,
    server:   &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    ok:    bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeAccount {
    login:   u64,
    balance: Decimal,
    #[serde(default)]
    company: String,
    #[serde(default)]
    server:  String,
}

#[derive(Debug, Deserialize)]
struct BridgeDeal {
    ticket:     u64,
    symbol:     String,
    #[serde(rename = "type")]
    deal_type:  u32,
    entry:      u32,
    volume:     Decimal,
    profit:     Decimal,
    #[serde(default)]
    commission: Decimal,
    #[serde(default)]
    swap:       Decimal,
    /// unix seconds
    time:       i64,
}

impl BridgeDeal {
    fn into_deal(self) -> Option<Deal> {
        let Some(entry) = DealEntry::from_code(self.entry) else {
            warn!(ticket = self.ticket, entry = self.entry, "Unknown deal entry code — skipped");
            return None;
        };
        let Some(time) = DateTime::<Utc>::from_timestamp(self.time, 0) else {
            warn!(ticket = self.ticket, time = self.time, "Deal time out of range — skipped");
            return None;
        };

        Some(Deal {
            ticket:     self.ticket,
            symbol:     self.symbol,
            deal_type:  DealType::from_code(self.deal_type),
            entry,
            volume:     self.volume,
            profit:     self.profit,
            commission: self.commission,
            swap:       self.swap,
            time,
        })
    }
}

// ─── BridgeSource ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BridgeSource {
    client:   reqwest::Client,
    base_url: String,
}

impl BridgeSource {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_account(&self) -> Result<AccountInfo, SourceUnavailable> {
        let url = format!("{}/account", self.base_url);

        let resp = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceUnavailable::new("account_info", format!("bridge unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceUnavailable::new("account_info", format!("HTTP {status}: {body}")));
        }

        let account: BridgeAccount = resp
            .json()
            .await
            .map_err(|e| SourceUnavailable::new("account_info", format!("parse error: {e}")))?;

        Ok(AccountInfo {
            login:   account.login,
            balance: account.balance,
            company: account.company,
            server:  account.server,
        })
    }

    /// Best effort — bridge ที่ไม่มี session ก็ตอบ ok อยู่แล้ว
    async fn shutdown_session(&self) {
        let url = format!("{}/shutdown", self.base_url);
        if let Err(e) = self.client.post(&url).send().await {
            debug!(error = %e, "Bridge shutdown request failed (ignored)");
        }
    }
}

#[async_trait]
impl DealSource for BridgeSource {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccountHandle, AuthError> {
        // ── 1. Reset any previous terminal session ────────────────────────────
        self.shutdown_session().await;

        // ── 2. Login ──────────────────────────────────────────────────────────
        let url = format!("{}/login", self.base_url);
        let body = LoginRequest {
            login:    credentials.login,
            password: &credentials.password,
            server:   &credentials.server,
        };

        let resp = self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "MT5 bridge unreachable");
                AuthError::unreachable(format!("{url}: {e}"))
            })?;

        let status = resp.status();
        if status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::unreachable(format!("HTTP {status}: {text}")));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::unreachable(format!("login response parse error: {e}")))?;

        if !status.is_success() || !login.ok {
            let reason = login.error.unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AuthError::rejected(credentials.login, reason));
        }

        // ── 3. Session ใช้ได้จริงก็ต่อเมื่ออ่าน account info ได้ ─────────────────
        let info = match self.get_account().await {
            Ok(info) => info,
            Err(e) => {
                self.shutdown_session().await;
                return Err(AuthError::NoAccountInfo(e.reason));
            }
        };

        info!(
            account = info.login,
            server  = %info.server,
            balance = %info.balance,
            company = %info.company,
            "✅ Connected to MT5 account"
        );

        Ok(AccountHandle::from_info(&info))
    }

    async fn is_healthy(&self, _handle: &AccountHandle) -> bool {
        match self.get_account().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn fetch_closed_deals(
        &self,
        _handle: &AccountHandle,
        window: Duration,
    ) -> Result<Vec<Deal>, SourceUnavailable> {
        let (from, to) = window_bounds(window)?;
        let (from, to) = (from.timestamp(), to.timestamp());
        let url = format!("{}/history/deals", self.base_url);

        let resp = self.client
            .get(&url)
            .query(&[("from", from), ("to", to)])
            .send()
            .await
            .map_err(|e| SourceUnavailable::new("history_deals", format!("bridge unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceUnavailable::new("history_deals", format!("HTTP {status}: {body}")));
        }

        // terminal คืน None เมื่อไม่มี deal ในช่วงเวลา → bridge ส่ง null มา
        let raw: Option<Vec<BridgeDeal>> = resp
            .json()
            .await
            .map_err(|e| SourceUnavailable::new("history_deals", format!("parse error: {e}")))?;

        let deals: Vec<Deal> = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(BridgeDeal::into_deal)
            .collect();

        debug!(count = deals.len(), from, to, "Deals fetched from bridge");
        Ok(deals)
    }

    async fn account_info(&self, _handle: &AccountHandle) -> Result<AccountInfo, SourceUnavailable> {
        self.get_account().await
    }

    async fn release(&self, handle: AccountHandle) {
        self.shutdown_session().await;
        info!(account = handle.login, "MT5 connection closed");
    }
}
