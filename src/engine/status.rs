//! # engine::status
//!
//! เขียน `mt5Status` — ทั้ง Sync Engine และ Supervisor ใช้ร่วมกัน
//! การเขียน status ที่ล้มเหลวแค่ log ไว้ ไม่ทำให้ cycle ล้ม

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use crate::models::{AccountHandle, ConnectionStatus, Credentials};
use crate::source::DealSource;
use crate::store::{Store, STATUS_PATH};

#[derive(Debug, Clone)]
pub struct StatusPublisher {
    account: u64,
    server:  String,
}

impl StatusPublisher {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            account: credentials.login,
            server:  credentials.server.clone(),
        }
    }

    pub async fn publish(&self, store: &dyn Store, connected: bool, balance: Decimal) {
        let status = ConnectionStatus::new(connected, self.account, &self.server, balance, Utc::now());

        let value = match serde_json::to_value(&status) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "Failed to serialize connection status");
                return;
            }
        };

        match store.write_document(STATUS_PATH, &value).await {
            Ok(()) => debug!(connected, balance = %balance, "Status published"),
            Err(e) => error!(error = %e, "Error updating status"),
        }
    }

    /// Connected status ที่อ่าน balance สดจาก terminal (0 ถ้าอ่านไม่ได้)
    pub async fn publish_connected(
        &self,
        source: &dyn DealSource,
        store: &dyn Store,
        handle: &AccountHandle,
    ) {
        let balance = match source.current_balance(handle).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Balance unavailable for status — publishing 0");
                Decimal::ZERO
            }
        };
        self.publish(store, true, balance).await;
    }

    pub async fn publish_disconnected(&self, store: &dyn Store) {
        self.publish(store, false, Decimal::ZERO).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn credentials() -> Credentials {
        Credentials { login: 4242, password: "pw".to_string(), server: "Demo-Server".to_string() }
    }

    #[tokio::test]
    async fn test_publish_overwrites_status() {
        let store = MemoryStore::new();
        let publisher = StatusPublisher::new(&credentials());

        publisher.publish(&store, true, dec!(1500.25)).await;
        publisher.publish_disconnected(&store).await;

        let status: ConnectionStatus =
            serde_json::from_value(store.get(STATUS_PATH).await.unwrap()).unwrap();
        assert!(!status.connected);
        assert_eq!(status.account, 4242);
        assert_eq!(status.server, "Demo-Server");
        assert_eq!(status.balance, Decimal::ZERO);
        assert!(status.last_update > 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = MemoryStore::new();
        store.fail_writes_to(STATUS_PATH).await;
        StatusPublisher::new(&credentials()).publish(&store, true, dec!(1)).await;
        assert_eq!(store.write_count().await, 0);
    }
}
