//! # engine::supervisor
//!
//! **Connection Supervisor** — เจ้าของ terminal session, retry counter และ
//! reconnect/backoff policy ห่อทุก sync cycle ด้วย health check
//!
//! ## State Machine
//! ```text
//!                 AuthSucceeded                  HealthLost
//!  Disconnected ───────────────▶ Connected ─────────────────▶ Reconnecting{0}
//!       │                          ▲   │ HealthOk → sync + poll      │
//!       │ AuthFailed → Abort       │   └──────────◀──────────────────┤
//!       ▼                          └──────── AuthSucceeded ──────────┘
//!     (exit)                       AuthFailed: retries+1 < max → short backoff
//!                                              retries+1 = max → long backoff, retries = 0
//! ```
//!
//! [`transition`] เป็น pure function ของ (state, event) → (state, action)
//! ส่วน [`Supervisor::run`] เป็นแค่ตัวขับ I/O รอบ ๆ มัน

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::status::StatusPublisher;
use crate::engine::sync::SyncEngine;
use crate::error::AuthError;
use crate::models::{AccountHandle, Credentials};
use crate::source::DealSource;
use crate::store::Store;

// ─── State Machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// `retries` = consecutive failed logins since the last reset
    Reconnecting { retries: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    HealthOk,
    HealthLost,
    AuthSucceeded,
    AuthFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run one sync cycle, then wait the poll interval
    SyncThenPoll,
    /// Publish connected, then sync and poll
    Resume,
    /// Publish disconnected, drop the stale session, log in again right away
    Reconnect,
    /// Publish disconnected, then wait before the next login attempt
    Backoff(Duration),
    /// Initial login failed — leave without entering the loop
    Abort,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries:   u32,
    pub short_backoff: Duration,
    pub long_backoff:  Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries:   3,
            short_backoff: Duration::from_secs(5),
            long_backoff:  Duration::from_secs(30),
        }
    }
}

pub fn transition(
    state: ConnectionState,
    event: Event,
    policy: &RetryPolicy,
) -> (ConnectionState, Action) {
    use ConnectionState::*;

    match (state, event) {
        (Disconnected, Event::AuthSucceeded) => (Connected, Action::Resume),
        (Disconnected, Event::AuthFailed) => (Disconnected, Action::Abort),

        (Connected, Event::HealthOk) => (Connected, Action::SyncThenPoll),
        (Connected, Event::HealthLost) => (Reconnecting { retries: 0 }, Action::Reconnect),

        (Reconnecting { .. }, Event::AuthSucceeded) => (Connected, Action::Resume),
        (Reconnecting { retries }, Event::AuthFailed) => {
            let retries = retries + 1;
            if retries >= policy.max_retries {
                (Reconnecting { retries: 0 }, Action::Backoff(policy.long_backoff))
            } else {
                (Reconnecting { retries }, Action::Backoff(policy.short_backoff))
            }
        }

        (state, _) => (state, Action::Nothing),
    }
}

// ─── Supervisor ───────────────────────────────────────────────────────────────

pub struct Supervisor {
    source:        Arc<dyn DealSource>,
    store:         Arc<dyn Store>,
    credentials:   Credentials,
    engine:        SyncEngine,
    status:        StatusPublisher,
    policy:        RetryPolicy,
    poll_interval: Duration,
    state:         ConnectionState,
    handle:        Option<AccountHandle>,
}

impl Supervisor {
    pub fn new(
        source: Arc<dyn DealSource>,
        store: Arc<dyn Store>,
        credentials: Credentials,
        engine: SyncEngine,
        policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        let status = StatusPublisher::new(&credentials);
        Self {
            source,
            store,
            credentials,
            engine,
            status,
            policy,
            poll_interval,
            state: ConnectionState::Disconnected,
            handle: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `Disconnected → Connected`.  A failed first login is fatal to the caller.
    pub async fn start(&mut self) -> Result<(), AuthError> {
        let result = self.source.authenticate(&self.credentials).await;
        let event = if result.is_ok() { Event::AuthSucceeded } else { Event::AuthFailed };

        match self.apply(event) {
            Action::Abort => Err(result.err().unwrap_or_else(|| AuthError::unreachable("login failed"))),
            _ => {
                if let Ok(handle) = &result {
                    info!(
                        account = handle.login,
                        server  = %handle.server,
                        company = %handle.company,
                        "Terminal session established"
                    );
                }
                self.handle = result.ok();
                self.publish_connected().await;
                Ok(())
            }
        }
    }

    /// Health check → reconnect → sync → sleep, until `shutdown` flips to
    /// `true` (or its sender goes away).  Releases the terminal session on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.poll_interval, "🔄 Monitoring MT5 for new trades...");

        loop {
            if stop_requested(&shutdown) {
                info!("⏹️  Monitoring stopped");
                break;
            }

            let event = match self.state {
                ConnectionState::Connected => self.probe().await,
                ConnectionState::Disconnected | ConnectionState::Reconnecting { .. } => {
                    self.authenticate().await
                }
            };

            match self.apply(event) {
                Action::SyncThenPoll => {
                    self.sync().await;
                    pause(self.poll_interval, &mut shutdown).await;
                }
                Action::Resume => {
                    info!("✅ Reconnected successfully!");
                    self.publish_connected().await;
                    self.sync().await;
                    pause(self.poll_interval, &mut shutdown).await;
                }
                Action::Reconnect => {
                    self.status.publish_disconnected(&*self.store).await;
                    if let Some(stale) = self.handle.take() {
                        self.source.release(stale).await;
                    }
                }
                Action::Backoff(delay) => {
                    self.status.publish_disconnected(&*self.store).await;
                    pause(delay, &mut shutdown).await;
                }
                Action::Abort => break,
                Action::Nothing => {}
            }
        }

        self.shutdown().await;
    }

    fn apply(&mut self, event: Event) -> Action {
        let (next, action) = transition(self.state, event, &self.policy);

        match (self.state, next, action) {
            (ConnectionState::Connected, ConnectionState::Reconnecting { .. }, _) => {
                warn!(max_retries = self.policy.max_retries, "⚠️  Lost connection to MT5");
            }
            (_, _, Action::Backoff(delay)) if delay == self.policy.long_backoff => {
                error!(
                    max_retries = self.policy.max_retries,
                    wait        = ?delay,
                    "❌ Max reconnection attempts reached — check that the MT5 terminal is running, logged in and online"
                );
            }
            (_, ConnectionState::Reconnecting { retries }, Action::Backoff(delay)) => {
                warn!(
                    attempt = retries,
                    max_retries = self.policy.max_retries,
                    wait = ?delay,
                    "Reconnect failed — waiting before retry"
                );
            }
            _ => {}
        }

        self.state = next;
        action
    }

    async fn probe(&self) -> Event {
        let healthy = match &self.handle {
            Some(handle) => self.source.is_healthy(handle).await,
            None => false,
        };
        if healthy { Event::HealthOk } else { Event::HealthLost }
    }

    async fn authenticate(&mut self) -> Event {
        info!("🔄 Attempting to reconnect to MT5...");
        match self.source.authenticate(&self.credentials).await {
            Ok(handle) => {
                self.handle = Some(handle);
                Event::AuthSucceeded
            }
            Err(e) => {
                error!(error = %e, "MT5 login failed");
                Event::AuthFailed
            }
        }
    }

    async fn sync(&self) {
        let Some(handle) = &self.handle else { return };

        match self.engine.run_cycle(&*self.source, &*self.store, handle).await {
            Ok(report) => debug!(
                fetched = report.fetched,
                closing = report.closing,
                written = report.written,
                "Sync cycle complete"
            ),
            Err(e) => error!(error = %e, "❌ Sync cycle failed — will retry next interval"),
        }
    }

    async fn publish_connected(&self) {
        if let Some(handle) = &self.handle {
            self.status.publish_connected(&*self.source, &*self.store, handle).await;
        }
    }

    async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.release(handle).await;
        }
        self.state = ConnectionState::Disconnected;
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleep that wakes early on a shutdown signal.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::models::{ConnectionStatus, Deal, DealEntry, DealType};
    use crate::source::MockTerminal;
    use crate::store::{MemoryStore, STATUS_PATH, TRADES_PATH};

    const LOGIN: u64 = 777;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries:   3,
            short_backoff: Duration::from_secs(5),
            long_backoff:  Duration::from_secs(30),
        }
    }

    fn credentials() -> Credentials {
        Credentials { login: LOGIN, password: "pw".to_string(), server: "Demo".to_string() }
    }

    // ── Pure transitions ──────────────────────────────────────────────────────

    #[test]
    fn test_startup_transitions() {
        assert_eq!(
            transition(ConnectionState::Disconnected, Event::AuthSucceeded, &policy()),
            (ConnectionState::Connected, Action::Resume)
        );
        assert_eq!(
            transition(ConnectionState::Disconnected, Event::AuthFailed, &policy()),
            (ConnectionState::Disconnected, Action::Abort)
        );
    }

    #[test]
    fn test_connected_transitions() {
        assert_eq!(
            transition(ConnectionState::Connected, Event::HealthOk, &policy()),
            (ConnectionState::Connected, Action::SyncThenPoll)
        );
        assert_eq!(
            transition(ConnectionState::Connected, Event::HealthLost, &policy()),
            (ConnectionState::Reconnecting { retries: 0 }, Action::Reconnect)
        );
    }

    #[test]
    fn test_bounded_retry_then_reset() {
        let p = policy();
        let mut state = ConnectionState::Reconnecting { retries: 0 };
        let mut actions = Vec::new();

        for _ in 0..4 {
            let (next, action) = transition(state, Event::AuthFailed, &p);
            state = next;
            actions.push((state, action));
        }

        assert_eq!(actions, vec![
            (ConnectionState::Reconnecting { retries: 1 }, Action::Backoff(p.short_backoff)),
            (ConnectionState::Reconnecting { retries: 2 }, Action::Backoff(p.short_backoff)),
            (ConnectionState::Reconnecting { retries: 0 }, Action::Backoff(p.long_backoff)),
            // หลัง reset เริ่ม short-backoff ใหม่จากศูนย์
            (ConnectionState::Reconnecting { retries: 1 }, Action::Backoff(p.short_backoff)),
        ]);
    }

    #[test]
    fn test_reconnect_success_resets_counter() {
        assert_eq!(
            transition(ConnectionState::Reconnecting { retries: 2 }, Event::AuthSucceeded, &policy()),
            (ConnectionState::Connected, Action::Resume)
        );
    }

    #[test]
    fn test_irrelevant_events_are_ignored() {
        let state = ConnectionState::Reconnecting { retries: 1 };
        assert_eq!(transition(state, Event::HealthOk, &policy()), (state, Action::Nothing));
        assert_eq!(
            transition(ConnectionState::Connected, Event::AuthFailed, &policy()),
            (ConnectionState::Connected, Action::Nothing)
        );
    }

    // ── Driven loop ───────────────────────────────────────────────────────────

    fn fast_policy(long_backoff: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries:   3,
            short_backoff: Duration::from_millis(1),
            long_backoff,
        }
    }

    fn build(
        terminal: &Arc<MockTerminal>,
        store: &Arc<MemoryStore>,
        policy: RetryPolicy,
    ) -> Supervisor {
        Supervisor::new(
            terminal.clone(),
            store.clone(),
            credentials(),
            SyncEngine::new(30, StatusPublisher::new(&credentials())),
            policy,
            Duration::from_millis(5),
        )
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !check().await {
            assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn status(store: &MemoryStore) -> Option<ConnectionStatus> {
        store.get(STATUS_PATH).await.map(|v| serde_json::from_value(v).unwrap())
    }

    fn closing_deal(ticket: u64) -> Deal {
        Deal {
            ticket,
            symbol:     "BTCUSD".to_string(),
            deal_type:  DealType::Sell,
            entry:      DealEntry::Out,
            volume:     dec!(0.01),
            profit:     dec!(12.5),
            commission: Decimal::ZERO,
            swap:       Decimal::ZERO,
            time:       Utc::now() - chrono::Duration::minutes(1),
        }
    }

    #[tokio::test]
    async fn test_start_fails_on_bad_login() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(100)));
        terminal.fail_next_logins(1).await;
        let store = Arc::new(MemoryStore::new());
        let mut supervisor = build(&terminal, &store, policy());

        assert!(supervisor.start().await.is_err());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_syncs_then_stops_cleanly() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(1000)));
        terminal.push_deal(closing_deal(42)).await;
        let store = Arc::new(MemoryStore::new());

        let mut supervisor = build(&terminal, &store, policy());
        supervisor.start().await.unwrap();
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(stop_rx));

        let s = &*store;
        wait_until(move || async move { s.get(&format!("{TRADES_PATH}/42")).await.is_some() }).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        assert!(!terminal.session_open().await);
        assert_eq!(terminal.releases().await, 1);
        assert!(status(&store).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_failed_cycle_retries_without_reconnect() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(1000)));
        terminal.push_deal(closing_deal(77)).await;
        terminal.set_fetch_failing(true).await;
        let store = Arc::new(MemoryStore::new());
        store.set_read_failing(true).await;

        let mut supervisor = build(&terminal, &store, policy());
        supervisor.start().await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(stop_rx));

        // several 5 ms polls with the deal query failing
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(terminal.login_attempts().await, 1);
        assert_eq!(terminal.releases().await, 0);
        assert!(store.get(&format!("{TRADES_PATH}/77")).await.is_none());

        // deals readable again, trades/ still not
        terminal.set_fetch_failing(false).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(terminal.login_attempts().await, 1);
        assert_eq!(terminal.releases().await, 0);
        assert!(store.get(&format!("{TRADES_PATH}/77")).await.is_none());

        store.set_read_failing(false).await;
        let s = &*store;
        wait_until(move || async move { s.get(&format!("{TRADES_PATH}/77")).await.is_some() }).await;

        stop_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(terminal.login_attempts().await, 1);
        // only the final shutdown
        assert_eq!(terminal.releases().await, 1);
        assert!(status(&store).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_reconnects_after_health_loss() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(500)));
        let store = Arc::new(MemoryStore::new());

        let mut supervisor = build(&terminal, &store, fast_policy(Duration::from_millis(5)));
        supervisor.start().await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        terminal.fail_next_logins(2).await;
        terminal.set_healthy(false).await;
        let task = tokio::spawn(supervisor.run(stop_rx));

        // 1 startup + 2 failures + 1 success
        let (t, s) = (&*terminal, &*store);
        wait_until(move || async move { t.login_attempts().await >= 4 && t.session_open().await }).await;
        terminal.push_deal(closing_deal(9)).await;
        wait_until(move || async move { s.get(&format!("{TRADES_PATH}/9")).await.is_some() }).await;

        stop_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(terminal.login_attempts().await, 4);
        // stale session + final shutdown
        assert_eq!(terminal.releases().await, 2);
        assert!(status(&store).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_backoff() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(500)));
        let store = Arc::new(MemoryStore::new());

        let mut supervisor = build(&terminal, &store, fast_policy(Duration::from_secs(3600)));
        supervisor.start().await.unwrap();

        terminal.fail_next_logins(u32::MAX).await;
        terminal.set_healthy(false).await;
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(stop_rx));

        // 1 startup + 3 failures → now sleeping in the long backoff
        let t = &*terminal;
        wait_until(move || async move { t.login_attempts().await >= 4 }).await;
        let status = status(&store).await.unwrap();
        assert!(!status.connected);
        assert_eq!(status.balance, Decimal::ZERO);

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("supervisor did not stop during backoff")
            .unwrap();

        assert_eq!(terminal.login_attempts().await, 4);
    }

    #[tokio::test]
    async fn test_dropped_stop_sender_ends_loop() {
        let terminal = Arc::new(MockTerminal::new(LOGIN, "Demo", dec!(500)));
        let store = Arc::new(MemoryStore::new());
        let mut supervisor = build(&terminal, &store, policy());
        supervisor.start().await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        tokio::time::timeout(Duration::from_secs(2), supervisor.run(stop_rx))
            .await
            .expect("loop kept running without a stop sender");
        assert_eq!(terminal.releases().await, 1);
    }
}
