//! # Modbus Correlator
//!
//! Request/response correlation for a Modbus/TCP client connection.
//!
//! Modbus/TCP lets a client put many requests on one socket before any
//! answer comes back. Responses arrive asynchronously, identified only by
//! the 16-bit transaction id in the MBAP header. This crate matches each
//! arriving frame to the caller waiting for it, enforces the response
//! timeout, and keeps round-trip statistics.
//!
//! ## Architecture
//!
//! Hexagonal layout (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): no I/O
//!   - `TransactionTable`: slot per id, Pending / Fulfilled / TimedOut
//!   - `TransactionIdAllocator`: wrapping id counter that skips busy ids
//!   - `StatisticsAggregator`: count, fastest, average, slowest set, lost
//!   - `CorrelatorConfig` / `CorrelatorConfigBuilder`
//!
//! - **Ports Layer** (`ports/`)
//!   - `FrameSink`: inbound, implemented by the correlator, fed by the
//!     connection's read loop
//!   - `RequestTransport`: outbound, puts a request on the wire
//!   - `ResponseObserver`: outbound, notified of delivered and late frames
//!
//! - **Service Layer** (`service/`)
//!   - `Correlator`: register, await, dispatch, report
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `spawn_dispatcher`: drives a `FrameSink` from an mpsc of decoded frames
//!   - `spawn_sweeper`: periodically reclaims expired timeout reservations
//!   - `ChannelObserver`: forwards delivered frames to an mpsc subscriber
//!
//! ## Invariants
//!
//! - At most one outstanding request per transaction id.
//! - Every successful wait yields exactly the frame whose header carries
//!   the awaited id.
//! - A waiter is never blocked past its deadline by an id that never
//!   receives a frame.
//! - A timed-out id is reserved until its late frame arrives or its grace
//!   period ends, so a straggler is never handed to a newer request.
//!
//! ## Usage Example
//!
//! ```ignore
//! use modbus_correlator::{spawn_dispatcher, Correlator, CorrelatorConfig};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! let correlator = Arc::new(Correlator::new(CorrelatorConfig::default())?);
//! let (frames_tx, frames_rx) = mpsc::channel(256);
//! spawn_dispatcher(correlator.clone(), frames_rx);
//! // hand frames_tx to the socket read loop
//!
//! let response = correlator
//!     .send_and_await(&transport, read_holding_registers(0, 10), None)
//!     .await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{
    spawn_dispatcher, spawn_sweeper, ChannelObserver, DispatchSummary, InboundEvent,
    SweeperHandle,
};
pub use domain::{
    CorrelatorConfig, CorrelatorConfigBuilder, PendingRequest, Resolution, ResolveOutcome,
    SlotState, StatisticsAggregator, StatisticsSnapshot, TransactionIdAllocator,
    TransactionTable,
};
pub use error::{ConfigError, CorrelatorError, TransportError};
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{FrameSink, RequestTransport, ResponseObserver};
pub use service::{Correlator, ModbusResponse, PendingResponse};
