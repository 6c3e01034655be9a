//! # models::trade
//!
//! [`TradeRecord`] — the canonical document written to `trades/<ticket>`,
//! plus the pure mapper that builds one from a closing [`Deal`].
//!
//! The field names are camelCase because the dashboard reads the Realtime
//! Database directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Deal;

/// Field that identifies an already-synced record inside `trades/`.
pub const TICKET_FIELD: &str = "mt5Ticket";

// ─── TradeRecord ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub trade_number:     u64,
    /// Reconstructed, not recorded — ดู `engine::sync::starting_balance`
    pub starting_balance: Decimal,
    pub profit_loss:      Decimal,
    pub note:             String,
    /// Milliseconds since epoch
    pub timestamp:        i64,
    /// `YYYY-MM-DD` (UTC)
    pub date:             String,
    pub id:               String,
    pub mt5_ticket:       u64,
    pub symbol:           String,
    pub volume:           Decimal,
}

impl TradeRecord {
    /// Trade Record Mapper.
    ///
    /// Pure: no I/O and no failure path.  The same `(deal, starting_balance)`
    /// always produces the same record.
    pub fn from_deal(deal: &Deal, starting_balance: Decimal) -> Self {
        let volume = deal.volume.normalize();

        Self {
            trade_number:     deal.ticket,
            starting_balance: starting_balance.round_dp(2),
            profit_loss:      deal.net_profit().round_dp(2),
            note:             format!("{} | {} | Vol: {}", deal.symbol, deal.deal_type, volume_label(volume)),
            timestamp:        deal.time.timestamp_millis(),
            date:             deal.time.format("%Y-%m-%d").to_string(),
            id:               deal.ticket.to_string(),
            mt5_ticket:       deal.ticket,
            symbol:           deal.symbol.clone(),
            volume,
        }
    }

    /// Key of this record under `trades/`.
    #[inline]
    pub fn key(&self) -> String {
        self.mt5_ticket.to_string()
    }
}

/// Lots as the terminal script printed them: `1.0`, `0.1`, `0.25`.
fn volume_label(volume: Decimal) -> String {
    let mut label = volume.normalize();
    if label.scale() == 0 {
        label.rescale(1);
    }
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealEntry, DealType};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn make_deal() -> Deal {
        Deal {
            ticket:     987654321,
            symbol:     "XAUUSD".to_string(),
            deal_type:  DealType::Sell,
            entry:      DealEntry::Out,
            volume:     dec!(0.10),
            profit:     dec!(125.40),
            commission: dec!(-3.50),
            swap:       dec!(-0.456),
            time:       Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 58).unwrap(),
        }
    }

    #[test]
    fn test_maps_all_fields() {
        let record = TradeRecord::from_deal(&make_deal(), dec!(1000.004));

        assert_eq!(record.trade_number, 987654321);
        assert_eq!(record.mt5_ticket, 987654321);
        assert_eq!(record.id, "987654321");
        assert_eq!(record.key(), "987654321");
        assert_eq!(record.starting_balance, dec!(1000.00));
        assert_eq!(record.profit_loss, dec!(121.44));
        assert_eq!(record.note, "XAUUSD | SELL | Vol: 0.1");
        assert_eq!(record.timestamp, 1_741_996_798_000);
        assert_eq!(record.date, "2025-03-14");
        assert_eq!(record.symbol, "XAUUSD");
        assert_eq!(record.volume, dec!(0.1));
    }

    #[test]
    fn test_note_keeps_one_decimal_for_whole_lots() {
        let deal = Deal { volume: dec!(1.00), ..make_deal() };
        let record = TradeRecord::from_deal(&deal, dec!(500));
        assert_eq!(record.note, "XAUUSD | SELL | Vol: 1.0");
        assert_eq!(record.volume, dec!(1));

        assert_eq!(volume_label(dec!(2)), "2.0");
        assert_eq!(volume_label(dec!(0.250)), "0.25");
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let deal = make_deal();
        let a = serde_json::to_string(&TradeRecord::from_deal(&deal, dec!(500))).unwrap();
        let b = serde_json::to_string(&TradeRecord::from_deal(&deal, dec!(500))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(TradeRecord::from_deal(&make_deal(), dec!(500))).unwrap();
        assert_eq!(value[TICKET_FIELD], serde_json::json!(987654321u64));
        assert!(value.get("startingBalance").is_some());
        assert!(value.get("profitLoss").is_some());
        assert!(value.get("tradeNumber").is_some());
    }
}
