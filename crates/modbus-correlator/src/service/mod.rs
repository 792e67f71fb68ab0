//! Service Layer
//!
//! Orchestrates the transaction table, the statistics aggregator and the
//! registered observers behind the public correlator API.

pub mod correlator;

pub use correlator::{Correlator, ModbusResponse, PendingResponse};
