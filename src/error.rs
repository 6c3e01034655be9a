//! # error
//!
//! Error taxonomy ของ synchronizer — แยกตามชั้นที่ล้มเหลว
//!
//! * [`AuthError`]          — login เข้า terminal ไม่สำเร็จ (fatal ตอน startup เท่านั้น)
//! * [`SourceUnavailable`]  — login ได้ แต่ query ตัวใดตัวหนึ่งล้มเหลว → cycle นั้นล้ม
//! * [`StoreError`]         — อ่าน/เขียน remote store ไม่สำเร็จ → ticket นั้นรอ cycle ถัดไป
//! * [`SyncError`]          — ผลรวมของ cycle ที่ Sync Engine คืนให้ Supervisor

use thiserror::Error;

// ─── AuthError ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    /// ติดต่อ terminal / bridge ไม่ได้เลย
    #[error("Terminal unreachable: {0}")]
    Unreachable(String),

    /// Terminal ตอบกลับ แต่ปฏิเสธ credentials
    #[error("Login rejected for account #{login}: {reason}")]
    Rejected { login: u64, reason: String },

    /// Login ผ่าน แต่ดึง account info ต่อไม่ได้ — ถือว่า session ใช้ไม่ได้
    #[error("Account info unavailable after login: {0}")]
    NoAccountInfo(String),
}

impl AuthError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    pub fn rejected(login: u64, reason: impl Into<String>) -> Self {
        Self::Rejected { login, reason: reason.into() }
    }
}

// ─── SourceUnavailable ────────────────────────────────────────────────────────

/// Query ไปที่ terminal ล้มเหลว (deal history / account info)
#[derive(Debug, Error)]
#[error("Terminal query `{operation}` failed: {reason}")]
pub struct SourceUnavailable {
    pub operation: &'static str,
    pub reason:    String,
}

impl SourceUnavailable {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self { operation, reason: reason.into() }
    }
}

// ─── StoreError ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network / transport error
    #[error("Store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store ตอบกลับด้วย HTTP status ที่ไม่ใช่ 2xx
    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Body ที่ได้มา parse ไม่ได้ หรือ serialize value ไม่ได้
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path / key ว่าง หรือมีอักขระที่ Firebase ไม่อนุญาต
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    /// ใช้โดย MemoryStore เวลาจำลองความล้มเหลว
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api { status, message: message.into() }
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }
}

// ─── SyncError ────────────────────────────────────────────────────────────────

/// Error ระดับ cycle — การเขียน ticket รายตัวที่ล้มเหลวไม่ขึ้นมาถึงนี่
/// (นับไว้ใน `SyncReport::failed` แทน)
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceUnavailable),

    #[error(transparent)]
    Store(#[from] StoreError),
}
