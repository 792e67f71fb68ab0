//! # Modbus Types Crate
//!
//! Decoded Modbus/TCP frames as handed to the response correlator by the
//! connection owner.
//!
//! ## Design Principles
//!
//! - **Decoded only**: nothing here touches bytes on a socket. The transport
//!   frames and decodes; these types are what it produces.
//! - **Generic payload**: function-specific response bodies are the
//!   protocol layer's business, so frames are generic over `R`.
//! - **Exceptions are data**: an exception response is a normal frame whose
//!   payload is [`Payload::Exception`]. Classifying it is the protocol
//!   layer's job, surfacing it is the correlator's.

pub mod exception;
pub mod frame;
pub mod transaction;

pub use exception::{ExceptionCode, ExceptionResponse, EXCEPTION_FLAG};
pub use frame::{DecodedFrame, MbapHeader, Payload, MODBUS_PROTOCOL_ID};
pub use transaction::{TransactionId, DEFAULT_RESPONSE_TIMEOUT_MS, TRANSACTION_ID_SPACE};
