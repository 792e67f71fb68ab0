//! Port definitions (traits) for the correlator.

pub mod inbound;
pub mod outbound;

pub use inbound::FrameSink;
pub use outbound::{RequestTransport, ResponseObserver};
