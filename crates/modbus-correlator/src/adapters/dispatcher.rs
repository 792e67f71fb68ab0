//! Inbound dispatch loop
//!
//! The connection owner decodes frames and pushes them, together with any
//! connection errors, into an mpsc channel. This loop is the single path
//! that feeds them to the correlator, in arrival order.

use modbus_types::DecodedFrame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::ResolveOutcome;
use crate::error::TransportError;
use crate::ports::FrameSink;

/// One item from the connection: a decoded frame or an error.
pub type InboundEvent<R> = Result<DecodedFrame<R>, TransportError>;

/// Counts of what the dispatch loop saw before its channel closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: u64,
    pub late_arrivals: u64,
    pub unmatched: u64,
    pub transport_errors: u64,
}

/// Feed every inbound event to `sink` until the sender side closes.
pub async fn dispatch_loop<S, R>(
    sink: Arc<S>,
    mut inbound: mpsc::Receiver<InboundEvent<R>>,
) -> DispatchSummary
where
    S: FrameSink<R> + ?Sized,
{
    let mut summary = DispatchSummary::default();
    debug!("Inbound dispatcher started");

    while let Some(event) = inbound.recv().await {
        match event {
            Ok(frame) => match sink.on_frame_arrived(frame) {
                ResolveOutcome::Delivered { .. } => summary.delivered += 1,
                ResolveOutcome::LateArrival { .. } => summary.late_arrivals += 1,
                ResolveOutcome::Unmatched => summary.unmatched += 1,
            },
            Err(err) => {
                summary.transport_errors += 1;
                sink.on_transport_error(&err);
            }
        }
    }

    info!(
        delivered = summary.delivered,
        late_arrivals = summary.late_arrivals,
        unmatched = summary.unmatched,
        transport_errors = summary.transport_errors,
        "Inbound channel closed, dispatcher stopped"
    );
    summary
}

pub fn spawn_dispatcher<S, R>(
    sink: Arc<S>,
    inbound: mpsc::Receiver<InboundEvent<R>>,
) -> JoinHandle<DispatchSummary>
where
    S: FrameSink<R> + ?Sized + 'static,
    R: Send + 'static,
{
    tokio::spawn(dispatch_loop(sink, inbound))
}
