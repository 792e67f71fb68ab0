//! Inbound Ports (Driving Ports)
//!
//! The single inbound dispatch path pushes every decoded frame, and every
//! error the connection reports, through this port.

use modbus_types::DecodedFrame;

use crate::domain::ResolveOutcome;
use crate::error::TransportError;

/// Receiver of decoded frames (Driving Port)
pub trait FrameSink<R>: Send + Sync {
    /// Route one decoded frame to whoever is waiting for it.
    fn on_frame_arrived(&self, frame: DecodedFrame<R>) -> ResolveOutcome;

    /// The connection reported an error. Pending transactions are left to
    /// their own deadlines.
    fn on_transport_error(&self, error: &TransportError);
}
