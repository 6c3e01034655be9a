//! Domain models shared across the synchronizer.

pub mod account;
pub mod deal;
pub mod status;
pub mod trade;

pub use account::{AccountHandle, AccountInfo, Credentials};
pub use deal::{Deal, DealEntry, DealType};
pub use status::ConnectionStatus;
pub use trade::{TradeRecord, TICKET_FIELD};
