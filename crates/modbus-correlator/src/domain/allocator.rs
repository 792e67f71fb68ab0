//! Round-robin transaction id allocation
//!
//! Ids advance by one and wrap at the end of the configured space. An id
//! still held by the transaction table, for any reason, is skipped.

use modbus_types::{TransactionId, TRANSACTION_ID_SPACE};

#[derive(Debug, Clone)]
pub struct TransactionIdAllocator {
    next: TransactionId,
    space_size: u32,
}

impl TransactionIdAllocator {
    /// `space_size` is clamped to `1..=65536`.
    pub fn new(space_size: u32) -> Self {
        Self {
            next: TransactionId::new(0),
            space_size: space_size.clamp(1, TRANSACTION_ID_SPACE),
        }
    }

    pub fn space_size(&self) -> u32 {
        self.space_size
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        u32::from(id) < self.space_size
    }

    /// Hand out the next id for which `is_free` holds.
    ///
    /// Visits each id of the space at most once; `None` means every id is
    /// taken.
    pub fn next_free(
        &mut self,
        mut is_free: impl FnMut(TransactionId) -> bool,
    ) -> Option<TransactionId> {
        for _ in 0..self.space_size {
            let candidate = self.next;
            self.next = candidate.next_in(self.space_size);
            if is_free(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
