//! # Decoded Frames
//!
//! What the inbound dispatch path hands to the correlator: an MBAP header
//! plus either a function response or an exception response.

use crate::exception::ExceptionResponse;
use crate::transaction::TransactionId;
use serde::{Deserialize, Serialize};

/// Protocol identifier carried by every Modbus/TCP frame.
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Modbus Application Protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbapHeader {
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    /// Byte count of the remainder of the frame, unit id included.
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn new(transaction_id: TransactionId, unit_id: u8, length: u16) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length,
            unit_id,
        }
    }
}

/// Body of a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload<R> {
    /// Regular function response.
    Normal(R),
    /// Server reported an exception.
    Exception(ExceptionResponse),
}

impl<R> Payload<R> {
    pub fn is_exception(&self) -> bool {
        matches!(self, Payload::Exception(_))
    }

    /// Convert into a `Result`, exceptions becoming the error side.
    pub fn into_result(self) -> Result<R, ExceptionResponse> {
        match self {
            Payload::Normal(response) => Ok(response),
            Payload::Exception(exception) => Err(exception),
        }
    }
}

/// A frame as decoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedFrame<R> {
    pub header: MbapHeader,
    pub payload: Payload<R>,
}

impl<R> DecodedFrame<R> {
    pub fn new(header: MbapHeader, payload: Payload<R>) -> Self {
        Self { header, payload }
    }

    /// Frame carrying a regular response.
    ///
    /// The header length is left at zero; decoded frames are not re-encoded.
    pub fn response(transaction_id: TransactionId, unit_id: u8, response: R) -> Self {
        Self::new(
            MbapHeader::new(transaction_id, unit_id, 0),
            Payload::Normal(response),
        )
    }

    /// Frame carrying an exception response.
    pub fn exception(
        transaction_id: TransactionId,
        unit_id: u8,
        exception: ExceptionResponse,
    ) -> Self {
        // unit id + function code + exception code
        Self::new(
            MbapHeader::new(transaction_id, unit_id, 3),
            Payload::Exception(exception),
        )
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id
    }

    pub fn unit_id(&self) -> u8 {
        self.header.unit_id
    }

    pub fn is_exception(&self) -> bool {
        self.payload.is_exception()
    }
}
