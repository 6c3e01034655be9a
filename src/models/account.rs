//! # models::account
//!
//! Login credentials and the terminal session handle.
//!
//! The MT5 terminal keeps one global session per process.  Instead of treating
//! that as ambient state, every successful login hands back an
//! [`AccountHandle`] which the Connection Supervisor owns and gives back to the
//! source on shutdown / reconnect.

use rust_decimal::Decimal;

// ─── Credentials ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Credentials {
    pub login:    u64,
    pub password: String,
    pub server:   String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

// ─── AccountInfo ──────────────────────────────────────────────────────────────

/// Snapshot of `account_info()` from the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub login:   u64,
    pub balance: Decimal,
    pub company: String,
    pub server:  String,
}

// ─── AccountHandle ────────────────────────────────────────────────────────────

/// Proof of an authenticated terminal session.
///
/// Not `Clone`: there is exactly one live session, released by value through
/// `DealSource::release`.
#[derive(Debug, PartialEq)]
pub struct AccountHandle {
    pub login:   u64,
    pub server:  String,
    pub company: String,
}

impl AccountHandle {
    pub fn from_info(info: &AccountInfo) -> Self {
        Self {
            login:   info.login,
            server:  info.server.clone(),
            company: info.company.clone(),
        }
    }
}
