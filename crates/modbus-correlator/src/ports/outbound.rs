//! Outbound Ports (Driven Ports)
//!
//! What the correlator needs from its surroundings: a way to put a request
//! on the wire, and optional listeners for delivered responses.

use async_trait::async_trait;
use modbus_types::{DecodedFrame, TransactionId};

use crate::error::TransportError;

/// Send primitive owned by the connection (Driven Port)
///
/// Encodes the request with the given transaction id in its MBAP header and
/// writes it out. Connection management stays with the implementor.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    type Request: Send;

    async fn transmit(
        &self,
        transaction_id: TransactionId,
        request: Self::Request,
    ) -> Result<(), TransportError>;
}

/// Out-of-band listener for responses (Driven Port)
///
/// Observers are called on the inbound dispatch path after the transaction
/// table lock has been released. They should return quickly.
pub trait ResponseObserver<R>: Send + Sync {
    /// A frame was delivered to its waiting caller.
    fn on_response(&self, frame: &DecodedFrame<R>);

    /// A frame arrived for a transaction that had already timed out.
    fn on_late_arrival(&self, _transaction_id: TransactionId) {}
}
