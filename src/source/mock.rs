//! # source::mock
//!
//! In-process MT5 terminal สำหรับ dev / test โดยไม่ต้องมี MT5 จริง
//! (`MT5_BASE_URL=mock`)
//!
//! รองรับการจำลองความล้มเหลว: login fail N ครั้ง, session หลุด,
//! query deal / account ล้มเหลว

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{AuthError, SourceUnavailable};
use crate::models::{AccountHandle, AccountInfo, Credentials, Deal, DealEntry, DealType};
use crate::source::{window_bounds, DealSource};

#[derive(Debug)]
struct MockInner {
    account:         AccountInfo,
    deals:           Vec<Deal>,
    session_open:    bool,
    healthy:         bool,
    failing_logins:  u32,
    fetch_failing:   bool,
    account_failing: bool,
    login_attempts:  u32,
    releases:        u32,
}

#[derive(Debug)]
pub struct MockTerminal {
    inner: Mutex<MockInner>,
}

impl MockTerminal {
    pub fn new(login: u64, server: &str, balance: Decimal) -> Self {
        Self {
            inner: Mutex::new(MockInner {
                account: AccountInfo {
                    login,
                    balance,
                    company: "Mock Broker Ltd.".to_string(),
                    server: server.to_string(),
                },
                deals:           Vec::new(),
                session_open:    false,
                healthy:         true,
                failing_logins:  0,
                fetch_failing:   false,
                account_failing: false,
                login_attempts:  0,
                releases:        0,
            }),
        }
    }

    /// Terminal ที่มี history ตัวอย่างหนึ่ง position (in + out) ภายในชั่วโมงที่ผ่านมา
    pub fn demo(credentials: &Credentials) -> Self {
        let mut terminal = Self::new(credentials.login, &credentials.server, Decimal::new(1_025_50, 2));
        let now = Utc::now();
        let open = Deal {
            ticket:     100_001,
            symbol:     "XAUUSD".to_string(),
            deal_type:  DealType::Buy,
            entry:      DealEntry::In,
            volume:     Decimal::new(10, 2),
            profit:     Decimal::ZERO,
            commission: Decimal::new(-35, 2),
            swap:       Decimal::ZERO,
            time:       now - Duration::minutes(45),
        };
        let close = Deal {
            ticket:     100_002,
            deal_type:  DealType::Sell,
            entry:      DealEntry::Out,
            profit:     Decimal::new(26_20, 2),
            time:       now - Duration::minutes(5),
            ..open.clone()
        };
        terminal.inner.get_mut().deals.extend([open, close]);
        terminal
    }
}

// ─── Test hooks ───────────────────────────────────────────────────────────────

#[cfg(test)]
impl MockTerminal {
    pub async fn push_deal(&self, deal: Deal) {
        self.inner.lock().await.deals.push(deal);
    }

    pub async fn set_balance(&self, balance: Decimal) {
        self.inner.lock().await.account.balance = balance;
    }

    /// `false` = จำลอง terminal หลุด (health probe fail)
    pub async fn set_healthy(&self, healthy: bool) {
        self.inner.lock().await.healthy = healthy;
    }

    pub async fn fail_next_logins(&self, count: u32) {
        self.inner.lock().await.failing_logins = count;
    }

    pub async fn set_fetch_failing(&self, failing: bool) {
        self.inner.lock().await.fetch_failing = failing;
    }

    pub async fn set_account_failing(&self, failing: bool) {
        self.inner.lock().await.account_failing = failing;
    }

    pub async fn login_attempts(&self) -> u32 {
        self.inner.lock().await.login_attempts
    }

    pub async fn releases(&self) -> u32 {
        self.inner.lock().await.releases
    }

    pub async fn session_open(&self) -> bool {
        self.inner.lock().await.session_open
    }
}

#[async_trait]
impl DealSource for MockTerminal {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccountHandle, AuthError> {
        let mut inner = self.inner.lock().await;
        inner.login_attempts += 1;
        inner.session_open = false;

        if inner.failing_logins > 0 {
            inner.failing_logins -= 1;
            return Err(AuthError::unreachable("mock terminal offline"));
        }
        if credentials.login != inner.account.login {
            return Err(AuthError::rejected(credentials.login, "unknown account"));
        }

        inner.session_open = true;
        inner.healthy = true;
        info!(account = inner.account.login, "🎭 [MOCK] Terminal session opened");
        Ok(AccountHandle::from_info(&inner.account))
    }

    async fn is_healthy(&self, _handle: &AccountHandle) -> bool {
        let inner = self.inner.lock().await;
        inner.session_open && inner.healthy
    }

    async fn fetch_closed_deals(
        &self,
        _handle: &AccountHandle,
        window: Duration,
    ) -> Result<Vec<Deal>, SourceUnavailable> {
        let inner = self.inner.lock().await;
        if inner.fetch_failing {
            return Err(SourceUnavailable::new("history_deals", "mock terminal query failed"));
        }

        let (from, to) = window_bounds(window)?;
        Ok(inner.deals
            .iter()
            .filter(|d| d.time >= from && d.time <= to)
            .cloned()
            .collect())
    }

    async fn account_info(&self, _handle: &AccountHandle) -> Result<AccountInfo, SourceUnavailable> {
        let inner = self.inner.lock().await;
        if inner.account_failing {
            return Err(SourceUnavailable::new("account_info", "mock terminal query failed"));
        }
        Ok(inner.account.clone())
    }

    async fn release(&self, handle: AccountHandle) {
        let mut inner = self.inner.lock().await;
        inner.session_open = false;
        inner.releases += 1;
        info!(account = handle.login, "🎭 [MOCK] Terminal session released");
    }
}
