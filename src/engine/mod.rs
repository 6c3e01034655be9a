//! Sync Engine, Connection Supervisor and the status publisher they share.

pub mod status;
pub mod supervisor;
pub mod sync;
