//! # models::deal
//!
//! Defines [`Deal`] — one atomic event from the MT5 deal history
//! (`HistoryDealsGet`).  A position produces at least two deals: an `In` deal
//! when it opens and one or more `Out` deals when it is closed.
//!
//! Deals are immutable once the terminal returns them; the synchronizer only
//! ever reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// ─── DealType ─────────────────────────────────────────────────────────────────

/// Side of the deal, decoded from MT5's `ENUM_DEAL_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealType {
    Buy,
    Sell,
}

impl DealType {
    /// `DEAL_TYPE_BUY` = 0; every other code is rendered as a sell.
    pub fn from_code(code: u32) -> Self {
        if code == 0 { DealType::Buy } else { DealType::Sell }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Buy  => "BUY",
            DealType::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for DealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── DealEntry ────────────────────────────────────────────────────────────────

/// `ENUM_DEAL_ENTRY` — ทิศทางของ deal เทียบกับ position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealEntry {
    /// 0 — เปิด position
    In,
    /// 1 — ปิด position (ตัวเดียวที่ถูก sync)
    Out,
    /// 2 — reverse
    InOut,
    /// 3 — ปิดด้วย opposite position
    OutBy,
}

impl DealEntry {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(DealEntry::In),
            1 => Some(DealEntry::Out),
            2 => Some(DealEntry::InOut),
            3 => Some(DealEntry::OutBy),
            _ => None,
        }
    }
}

// ─── Deal ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    /// Terminal-assigned ticket, unique per account.
    pub ticket:     u64,
    pub symbol:     String,
    pub deal_type:  DealType,
    pub entry:      DealEntry,
    pub volume:     Decimal,
    pub profit:     Decimal,
    pub commission: Decimal,
    pub swap:       Decimal,
    /// Second precision, as the terminal reports it.
    pub time:       DateTime<Utc>,
}

impl Deal {
    /// Realised P/L of this deal: `profit + commission + swap`.
    #[inline]
    pub fn net_profit(&self) -> Decimal {
        self.profit + self.commission + self.swap
    }

    /// Only `Out` deals close a position and realise P/L.
    #[inline]
    pub fn is_closing(&self) -> bool {
        self.entry == DealEntry::Out
    }
}
