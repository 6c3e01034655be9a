//! # models::status
//!
//! [`ConnectionStatus`] — singleton document at `mt5Status`, overwritten
//! wholesale on every health check and every sync cycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected:   bool,
    /// Milliseconds since epoch
    pub last_update: i64,
    pub account:     u64,
    pub server:      String,
    /// 0 เมื่ออ่าน balance จาก terminal ไม่ได้
    pub balance:     Decimal,
}

impl ConnectionStatus {
    pub fn new(connected: bool, account: u64, server: &str, balance: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            connected,
            last_update: at.timestamp_millis(),
            account,
            server: server.to_string(),
            balance,
        }
    }
}
