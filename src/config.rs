//! # config — อ่าน Config จาก Environment Variables
//!
//! ทุกตัวมีค่า default — ตัวเลขที่ตั้งมาแต่ parse ไม่ได้ถือเป็น startup error

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::engine::supervisor::RetryPolicy;
use crate::models::Credentials;

/// Config ทั้งหมดที่ synchronizer ต้องการ
#[derive(Clone)]
pub struct Config {
    /// MT5 login / password / server
    pub credentials:   Credentials,
    /// URL ของ MT5 bridge EA หรือ `"mock"`
    pub mt5_base_url:  String,
    /// Realtime Database root URL หรือ `"memory"`
    pub firebase_url:  String,
    /// Database secret / ID token (ส่งเป็น `?auth=`)
    pub firebase_auth: Option<String>,
    /// รอบเวลา poll ระหว่าง sync cycles
    pub poll_interval: Duration,
    /// ย้อนหลังกี่วันตอนดึง deal history
    pub lookback_days: u32,
    pub retry:         RetryPolicy,
    /// Timeout ต่อ request (bridge + store)
    pub http_timeout:  Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("credentials", &self.credentials)
            .field("mt5_base_url", &self.mt5_base_url)
            .field("firebase_url", &self.firebase_url)
            .field("firebase_auth", &self.firebase_auth.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("lookback_days", &self.lookback_days)
            .field("retry", &self.retry)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let credentials = Credentials {
            login:    parse_or(&lookup, "MT5_ACCOUNT", 0)?,
            password: var("MT5_PASSWORD", ""),
            server:   var("MT5_SERVER", "MetaQuotes-Demo"),
        };

        let retry = RetryPolicy {
            max_retries:   parse_or(&lookup, "RECONNECT_MAX_RETRIES", 3)?,
            short_backoff: Duration::from_secs(parse_or(&lookup, "RECONNECT_SHORT_BACKOFF_SECS", 5)?),
            long_backoff:  Duration::from_secs(parse_or(&lookup, "RECONNECT_LONG_BACKOFF_SECS", 30)?),
        };

        Ok(Self {
            credentials,
            mt5_base_url:  var("MT5_BASE_URL", "http://localhost:8081"),
            firebase_url:  var("FIREBASE_DB_URL", "memory"),
            firebase_auth: lookup("FIREBASE_AUTH").filter(|s| !s.is_empty()),
            poll_interval: Duration::from_secs(parse_or(&lookup, "SYNC_INTERVAL_SECS", 10)?),
            lookback_days: parse_or(&lookup, "SYNC_LOOKBACK_DAYS", 30)?,
            retry,
            http_timeout:  Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10)?),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}
