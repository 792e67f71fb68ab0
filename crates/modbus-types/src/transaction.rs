//! # Transaction Identifiers
//!
//! The MBAP header carries a 16-bit transaction identifier that the server
//! echoes back. Identifiers are reused once a transaction completes, so an
//! id alone never names a request for longer than one round trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of distinct transaction identifiers a 16-bit header can carry.
pub const TRANSACTION_ID_SPACE: u32 = 1 << 16;

/// Default time a client waits for a synchronous response.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2_000;

/// Transaction identifier from the MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u16);

impl TransactionId {
    /// Create from the raw header value.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw header value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// The identifier following this one inside a space of `space_size` ids.
    ///
    /// Wraps to zero at the end of the space.
    pub fn next_in(self, space_size: u32) -> Self {
        let next = (u32::from(self.0) + 1) % space_size.clamp(1, TRANSACTION_ID_SPACE);
        Self(next as u16)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for TransactionId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<TransactionId> for u16 {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

impl From<TransactionId> for u32 {
    fn from(id: TransactionId) -> Self {
        u32::from(id.0)
    }
}
