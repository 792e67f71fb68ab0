//! Transaction Table - per-id slot state shared by callers and the inbound path.
//!
//! Each transaction id in use owns exactly one slot:
//!
//! ```text
//! unused -> Pending -> Fulfilled -> unused   (frame consumed by its caller)
//!                   -> TimedOut  -> unused   (late frame, or sweep after the grace period)
//! ```
//!
//! A timed-out id is not freed straight away. It stays reserved so that a
//! response arriving after the deadline is classified as late instead of
//! being handed to a newer request that was given the same id.
//!
//! All transitions happen under one table-wide lock. The lock is never held
//! across an `.await`.

use crate::domain::allocator::TransactionIdAllocator;
use crate::domain::config::CorrelatorConfig;
use crate::error::CorrelatorError;
use modbus_types::TransactionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Stand-in horizon for deadlines and reservations that would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + after`, capped at a far-future instant instead of overflowing.
fn instant_after(start: Instant, after: Duration) -> Instant {
    start
        .checked_add(after)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Pending and Fulfilled slots carry the generation of the registration
/// that owns them, so a stale guard for a reused id cannot touch them.
enum Slot<F> {
    Pending {
        generation: u64,
        started_at: Instant,
        waker: oneshot::Sender<()>,
    },
    Fulfilled {
        generation: u64,
        started_at: Instant,
        arrived_at: Instant,
        frame: F,
    },
    TimedOut {
        started_at: Instant,
        reserved_until: Instant,
    },
}

impl<F> Slot<F> {
    fn state(&self) -> SlotState {
        match self {
            Slot::Pending { .. } => SlotState::Pending,
            Slot::Fulfilled { .. } => SlotState::Fulfilled,
            Slot::TimedOut { .. } => SlotState::TimedOut,
        }
    }

    fn generation(&self) -> Option<u64> {
        match self {
            Slot::Pending { generation, .. } | Slot::Fulfilled { generation, .. } => {
                Some(*generation)
            }
            Slot::TimedOut { .. } => None,
        }
    }

    /// Free, or a reservation whose grace period has run out.
    fn is_reclaimable(&self, now: Instant) -> bool {
        matches!(self, Slot::TimedOut { reserved_until, .. } if now >= *reserved_until)
    }
}

/// Public view of a slot's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Fulfilled,
    TimedOut,
}

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Stored for the waiting caller.
    Delivered { waited: Duration },
    /// The caller had already given up; the reservation is now cleared.
    LateArrival { waited: Duration },
    /// Nobody registered this id, or it was already cleaned up.
    Unmatched,
}

/// What a waiting caller observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<F> {
    Delivered { frame: F, waited: Duration },
    TimedOut,
}

struct TableState<F> {
    slots: HashMap<TransactionId, Slot<F>>,
    allocator: TransactionIdAllocator,
    next_generation: u64,
}

impl<F> TableState<F> {
    fn owned_by(&self, id: TransactionId, generation: u64) -> bool {
        self.slots.get(&id).and_then(Slot::generation) == Some(generation)
    }
}

pub struct TransactionTable<F> {
    state: Mutex<TableState<F>>,
    retention_factor: u32,
    /// Reservation length for requests abandoned without a deadline.
    default_grace: Duration,
}

impl<F> TransactionTable<F> {
    pub fn new(space_size: u32, response_timeout: Duration, retention_factor: u32) -> Self {
        let retention_factor = retention_factor.max(1);
        Self {
            state: Mutex::new(TableState {
                slots: HashMap::new(),
                allocator: TransactionIdAllocator::new(space_size),
                next_generation: 0,
            }),
            retention_factor,
            default_grace: response_timeout.saturating_mul(retention_factor),
        }
    }

    pub fn from_config(config: &CorrelatorConfig) -> Self {
        Self::new(
            config.transaction_id_space_size,
            config.response_timeout(),
            config.timed_out_retention_factor,
        )
    }

    /// Register `id` as pending from `now`.
    ///
    /// A timed-out id whose grace period has passed is reclaimed; the
    /// returned request reports that through
    /// [`PendingRequest::reclaimed_reservation`].
    pub fn begin_pending(
        &self,
        id: TransactionId,
        now: Instant,
    ) -> Result<PendingRequest<'_, F>, CorrelatorError> {
        let mut state = self.state.lock();

        if !state.allocator.contains(id) {
            return Err(CorrelatorError::TransactionIdOutOfRange {
                transaction_id: id,
                space_size: state.allocator.space_size(),
            });
        }

        let reclaimed = match state.slots.get(&id) {
            None => false,
            Some(slot) if slot.is_reclaimable(now) => true,
            Some(Slot::TimedOut { .. }) => {
                return Err(CorrelatorError::TransactionIdReserved { transaction_id: id })
            }
            Some(_) => return Err(CorrelatorError::AlreadyPending { transaction_id: id }),
        };

        Ok(self.insert_pending(&mut state, id, now, reclaimed))
    }

    /// Allocate the next free id and register it as pending.
    pub fn begin_next(&self, now: Instant) -> Result<PendingRequest<'_, F>, CorrelatorError> {
        let mut state = self.state.lock();
        let TableState {
            slots, allocator, ..
        } = &mut *state;
        let space_size = allocator.space_size();

        let id = allocator
            .next_free(|id| slots.get(&id).map_or(true, |slot| slot.is_reclaimable(now)))
            .ok_or(CorrelatorError::IdSpaceExhausted { space_size })?;
        let reclaimed = slots.contains_key(&id);

        Ok(self.insert_pending(&mut state, id, now, reclaimed))
    }

    fn insert_pending(
        &self,
        state: &mut TableState<F>,
        id: TransactionId,
        now: Instant,
        reclaimed: bool,
    ) -> PendingRequest<'_, F> {
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);

        let (waker, wake) = oneshot::channel();
        state.slots.insert(
            id,
            Slot::Pending {
                generation,
                started_at: now,
                waker,
            },
        );
        trace!(transaction_id = %id, reclaimed, "Registered pending transaction");

        PendingRequest {
            table: self,
            transaction_id: id,
            generation,
            started_at: now,
            wake,
            reclaimed_reservation: reclaimed,
            settled: false,
        }
    }

    /// Route one inbound frame.
    pub fn resolve(&self, id: TransactionId, frame: F, now: Instant) -> ResolveOutcome {
        self.resolve_with(id, frame, now, |_| ()).0
    }

    /// Route one inbound frame and, only if it is delivered, hand back a
    /// copy for out-of-band listeners.
    pub fn resolve_and_copy(
        &self,
        id: TransactionId,
        frame: F,
        now: Instant,
    ) -> (ResolveOutcome, Option<F>)
    where
        F: Clone,
    {
        self.resolve_with(id, frame, now, F::clone)
    }

    fn resolve_with<C>(
        &self,
        id: TransactionId,
        frame: F,
        now: Instant,
        copy: impl FnOnce(&F) -> C,
    ) -> (ResolveOutcome, Option<C>) {
        let mut state = self.state.lock();
        let Some(slot) = state.slots.remove(&id) else {
            return (ResolveOutcome::Unmatched, None);
        };

        match slot {
            Slot::Pending {
                generation,
                started_at,
                waker,
            } => {
                let copied = copy(&frame);
                state.slots.insert(
                    id,
                    Slot::Fulfilled {
                        generation,
                        started_at,
                        arrived_at: now,
                        frame,
                    },
                );
                drop(state);
                // The receiver lives in the PendingRequest, which moves the
                // slot out of Pending before it goes away.
                let _ = waker.send(());
                let outcome = ResolveOutcome::Delivered {
                    waited: now.saturating_duration_since(started_at),
                };
                (outcome, Some(copied))
            }
            Slot::TimedOut { started_at, .. } => {
                let outcome = ResolveOutcome::LateArrival {
                    waited: now.saturating_duration_since(started_at),
                };
                (outcome, None)
            }
            fulfilled @ Slot::Fulfilled { .. } => {
                // Duplicate answer for a frame nobody has consumed yet.
                state.slots.insert(id, fulfilled);
                (ResolveOutcome::Unmatched, None)
            }
        }
    }

    /// Decide the outcome for a waiter whose wake-up or deadline fired.
    fn settle(
        &self,
        id: TransactionId,
        generation: u64,
        now: Instant,
        grace: Duration,
    ) -> Resolution<F> {
        let mut state = self.state.lock();
        if !state.owned_by(id, generation) {
            // Cleaned up, and possibly handed to a newer request since.
            return Resolution::TimedOut;
        }

        match state.slots.remove(&id) {
            Some(Slot::Fulfilled {
                started_at,
                arrived_at,
                frame,
                ..
            }) => Resolution::Delivered {
                frame,
                waited: arrived_at.saturating_duration_since(started_at),
            },
            Some(Slot::Pending { started_at, .. }) => {
                state.slots.insert(
                    id,
                    Slot::TimedOut {
                        started_at,
                        reserved_until: instant_after(now, grace),
                    },
                );
                Resolution::TimedOut
            }
            Some(timed_out @ Slot::TimedOut { .. }) => {
                state.slots.insert(id, timed_out);
                Resolution::TimedOut
            }
            None => Resolution::TimedOut,
        }
    }

    /// The waiter went away without settling.
    fn abandon(&self, id: TransactionId, generation: u64, now: Instant) {
        let mut state = self.state.lock();
        if !state.owned_by(id, generation) {
            return;
        }

        match state.slots.get(&id).map(Slot::state) {
            Some(SlotState::Pending) => {
                if let Some(Slot::Pending { started_at, .. }) = state.slots.remove(&id) {
                    state.slots.insert(
                        id,
                        Slot::TimedOut {
                            started_at,
                            reserved_until: instant_after(now, self.default_grace),
                        },
                    );
                }
                debug!(transaction_id = %id, "Abandoned pending transaction, reserving id");
            }
            Some(SlotState::Fulfilled) => {
                state.slots.remove(&id);
                debug!(transaction_id = %id, "Abandoned fulfilled transaction, frame discarded");
            }
            Some(SlotState::TimedOut) | None => {}
        }
    }

    /// Drop a pending or fulfilled slot outright.
    fn release(&self, id: TransactionId, generation: u64) {
        let mut state = self.state.lock();
        if state.owned_by(id, generation) {
            state.slots.remove(&id);
        }
    }

    /// Release a fulfilled slot whose frame will not be consumed.
    ///
    /// Returns whether a slot was released; a second call is a no-op.
    pub fn cleanup_fulfilled(&self, id: TransactionId) -> bool {
        let mut state = self.state.lock();
        if matches!(state.slots.get(&id), Some(Slot::Fulfilled { .. })) {
            state.slots.remove(&id);
            true
        } else {
            false
        }
    }

    /// Remove timed-out reservations whose grace period has passed.
    ///
    /// Returns the reclaimed ids.
    pub fn sweep_expired(&self, now: Instant) -> Vec<TransactionId> {
        let mut state = self.state.lock();
        let mut swept = Vec::new();

        state.slots.retain(|id, slot| {
            if slot.is_reclaimable(now) {
                swept.push(*id);
                false
            } else {
                true
            }
        });

        swept
    }

    pub fn state(&self, id: TransactionId) -> Option<SlotState> {
        self.state.lock().slots.get(&id).map(Slot::state)
    }

    /// Number of ids currently held, in any state.
    pub fn occupancy(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn pending_count(&self) -> usize {
        self.count(SlotState::Pending)
    }

    pub fn timed_out_count(&self) -> usize {
        self.count(SlotState::TimedOut)
    }

    fn count(&self, wanted: SlotState) -> usize {
        self.state
            .lock()
            .slots
            .values()
            .filter(|slot| slot.state() == wanted)
            .count()
    }

    pub fn space_size(&self) -> u32 {
        self.state.lock().allocator.space_size()
    }

    fn grace_for(&self, timeout: Duration) -> Duration {
        timeout.saturating_mul(self.retention_factor)
    }
}

/// A caller's claim on one pending transaction.
///
/// Dropping it before the transaction settles (for example because the
/// awaiting future was cancelled) counts as an immediate timeout: the id
/// stays reserved and a later frame is classified as late.
#[must_use = "dropping a PendingRequest times the transaction out"]
pub struct PendingRequest<'a, F> {
    table: &'a TransactionTable<F>,
    transaction_id: TransactionId,
    generation: u64,
    started_at: Instant,
    wake: oneshot::Receiver<()>,
    reclaimed_reservation: bool,
    settled: bool,
}

impl<F> std::fmt::Debug for PendingRequest<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("transaction_id", &self.transaction_id)
            .field("generation", &self.generation)
            .field("started_at", &self.started_at)
            .field("reclaimed_reservation", &self.reclaimed_reservation)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

impl<'a, F> PendingRequest<'a, F> {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Deadline `timeout` after registration. Timeouts too large to
    /// represent wait until a far-future instant instead.
    pub fn deadline_after(&self, timeout: Duration) -> Instant {
        instant_after(self.started_at, timeout)
    }

    /// Whether registering this request cleared an expired timeout
    /// reservation on the same id.
    pub fn reclaimed_reservation(&self) -> bool {
        self.reclaimed_reservation
    }

    /// Suspend until the frame arrives or `deadline` passes.
    ///
    /// If the deadline and the frame race, the table decides: a frame that
    /// was stored before the timeout transition wins.
    pub async fn await_resolution(mut self, deadline: Instant) -> Resolution<F> {
        // Either wake-up only ends the wait; the slot state is authoritative.
        let _ = tokio::time::timeout_at(deadline, &mut self.wake).await;

        let grace = self
            .table
            .grace_for(deadline.saturating_duration_since(self.started_at));
        self.settled = true;
        self.table
            .settle(self.transaction_id, self.generation, Instant::now(), grace)
    }

    /// Give the id back without waiting, e.g. when the request never left.
    pub fn release(mut self) {
        self.settled = true;
        self.table.release(self.transaction_id, self.generation);
    }
}

impl<F> Drop for PendingRequest<'_, F> {
    fn drop(&mut self) {
        if !self.settled {
            self.table
                .abandon(self.transaction_id, self.generation, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn id(value: u16) -> TransactionId {
        TransactionId::new(value)
    }

    fn table() -> TransactionTable<&'static str> {
        TransactionTable::new(64, ms(50), 3)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_before_deadline_delivers() {
        let table = table();
        let start = Instant::now();
        let pending = table.begin_pending(id(7), start).unwrap();

        let (resolution, outcome) = tokio::join!(pending.await_resolution(start + ms(50)), async {
            tokio::time::sleep(ms(30)).await;
            table.resolve(id(7), "F", Instant::now())
        });

        assert_eq!(outcome, ResolveOutcome::Delivered { waited: ms(30) });
        assert_eq!(
            resolution,
            Resolution::Delivered {
                frame: "F",
                waited: ms(30)
            }
        );
        assert_eq!(table.occupancy(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_after_deadline_is_late() {
        let table = table();
        let start = Instant::now();
        let pending = table.begin_pending(id(9), start).unwrap();

        let resolution = pending.await_resolution(start + ms(50)).await;
        assert_eq!(resolution, Resolution::TimedOut);
        assert_eq!(table.state(id(9)), Some(SlotState::TimedOut));

        tokio::time::sleep(ms(30)).await;
        let outcome = table.resolve(id(9), "G", Instant::now());
        assert_eq!(outcome, ResolveOutcome::LateArrival { waited: ms(80) });
        assert_eq!(table.state(id(9)), None);

        // Cleared exactly once.
        assert_eq!(table.resolve(id(9), "G", Instant::now()), ResolveOutcome::Unmatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fulfilled_slot_wins_over_elapsed_deadline() {
        let table = table();
        let start = Instant::now();
        let pending = table.begin_pending(id(3), start).unwrap();

        table.resolve(id(3), "early", start);
        tokio::time::sleep(ms(100)).await;

        let resolution = pending.await_resolution(start + ms(50)).await;
        assert!(matches!(resolution, Resolution::Delivered { frame: "early", .. }));
    }

    #[test]
    fn test_unmatched_frame_changes_nothing() {
        let table = table();
        let outcome = table.resolve(id(42), "H", Instant::now());
        assert_eq!(outcome, ResolveOutcome::Unmatched);
        assert_eq!(table.occupancy(), 0);
    }

    #[tokio::test]
    async fn test_second_begin_while_pending_fails() {
        let table = table();
        let _pending = table.begin_pending(id(1), Instant::now()).unwrap();

        let err = table.begin_pending(id(1), Instant::now()).err();
        assert_eq!(
            err,
            Some(CorrelatorError::AlreadyPending {
                transaction_id: id(1)
            })
        );
    }

    #[tokio::test]
    async fn test_begin_while_fulfilled_fails() {
        let table = table();
        let _pending = table.begin_pending(id(1), Instant::now()).unwrap();
        table.resolve(id(1), "F", Instant::now());

        assert!(matches!(
            table.begin_pending(id(1), Instant::now()),
            Err(CorrelatorError::AlreadyPending { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_id_rejected() {
        let table = table();
        assert!(matches!(
            table.begin_pending(id(64), Instant::now()),
            Err(CorrelatorError::TransactionIdOutOfRange { space_size: 64, .. })
        ));
    }

    #[tokio::test]
    async fn test_cleanup_fulfilled_is_idempotent() {
        let table = table();
        let pending = table.begin_pending(id(5), Instant::now()).unwrap();
        table.resolve(id(5), "F", Instant::now());

        assert!(table.cleanup_fulfilled(id(5)));
        assert!(!table.cleanup_fulfilled(id(5)));
        assert_eq!(table.occupancy(), 0);

        // The guard finds nothing left to reclaim.
        drop(pending);
        assert_eq!(table.occupancy(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_ignores_pending_slot() {
        let table = table();
        let _pending = table.begin_pending(id(5), Instant::now()).unwrap();
        assert!(!table.cleanup_fulfilled(id(5)));
        assert_eq!(table.state(id(5)), Some(SlotState::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_reserves_id() {
        let table = table();
        let pending = table.begin_pending(id(11), Instant::now()).unwrap();
        drop(pending);

        assert_eq!(table.state(id(11)), Some(SlotState::TimedOut));
        assert!(matches!(
            table.resolve(id(11), "late", Instant::now()),
            ResolveOutcome::LateArrival { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_await_reserves_id() {
        let table = table();
        let start = Instant::now();
        let pending = table.begin_pending(id(12), start).unwrap();

        let cancelled =
            tokio::time::timeout(ms(10), pending.await_resolution(start + ms(50))).await;
        assert!(cancelled.is_err());
        assert_eq!(table.state(id(12)), Some(SlotState::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserved_id_refused_until_grace_passes() {
        let table = table();
        let start = Instant::now();
        let pending = table.begin_pending(id(2), start).unwrap();
        assert_eq!(
            pending.await_resolution(start + ms(50)).await,
            Resolution::TimedOut
        );

        assert!(matches!(
            table.begin_pending(id(2), Instant::now()),
            Err(CorrelatorError::TransactionIdReserved { .. })
        ));

        // Grace is three timeouts after the deadline.
        tokio::time::sleep(ms(150)).await;
        let pending = table.begin_pending(id(2), Instant::now()).unwrap();
        assert!(pending.reclaimed_reservation());
        assert_eq!(table.state(id(2)), Some(SlotState::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reclaims_only_expired() {
        let table = table();
        let start = Instant::now();
        drop(table.begin_pending(id(1), start).unwrap());
        tokio::time::sleep(ms(100)).await;
        drop(table.begin_pending(id(2), Instant::now()).unwrap());

        assert!(table.sweep_expired(Instant::now()).is_empty());

        tokio::time::sleep(ms(60)).await;
        assert_eq!(table.sweep_expired(Instant::now()), vec![id(1)]);
        assert_eq!(table.state(id(2)), Some(SlotState::TimedOut));
        assert_eq!(table.timed_out_count(), 1);
    }

    #[tokio::test]
    async fn test_begin_next_skips_held_ids() {
        let table: TransactionTable<()> = TransactionTable::new(4, ms(50), 3);
        let _held = table.begin_pending(id(0), Instant::now()).unwrap();

        let first = table.begin_next(Instant::now()).unwrap();
        let second = table.begin_next(Instant::now()).unwrap();
        assert_eq!(first.transaction_id(), id(1));
        assert_eq!(second.transaction_id(), id(2));
        assert_eq!(table.pending_count(), 3);
    }

    #[tokio::test]
    async fn test_begin_next_exhausts_space() {
        let table: TransactionTable<()> = TransactionTable::new(2, ms(50), 3);
        let _a = table.begin_next(Instant::now()).unwrap();
        let _b = table.begin_next(Instant::now()).unwrap();

        assert!(matches!(
            table.begin_next(Instant::now()),
            Err(CorrelatorError::IdSpaceExhausted { space_size: 2 })
        ));
    }

    #[tokio::test]
    async fn test_stale_guard_leaves_reused_id_alone() {
        let table = table();
        let now = Instant::now();

        let first = table.begin_pending(id(5), now).unwrap();
        table.resolve(id(5), "A", now);
        assert!(table.cleanup_fulfilled(id(5)));

        let second = table.begin_pending(id(5), now).unwrap();
        drop(first);
        assert_eq!(table.state(id(5)), Some(SlotState::Pending));

        assert_eq!(
            table.resolve(id(5), "B", now),
            ResolveOutcome::Delivered {
                waited: Duration::ZERO
            }
        );
        assert!(matches!(
            second.await_resolution(now + ms(50)).await,
            Resolution::Delivered { frame: "B", .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_waiter_times_out_without_touching_reused_id() {
        let table = table();
        let start = Instant::now();

        let first = table.begin_pending(id(6), start).unwrap();
        table.resolve(id(6), "A", start);
        assert!(table.cleanup_fulfilled(id(6)));
        let second = table.begin_pending(id(6), start).unwrap();

        tokio::time::sleep(ms(60)).await;
        assert_eq!(
            first.await_resolution(start + ms(50)).await,
            Resolution::TimedOut
        );
        assert_eq!(table.state(id(6)), Some(SlotState::Pending));

        second.release();
        assert_eq!(table.state(id(6)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeouts_do_not_overflow() {
        let table: TransactionTable<&'static str> =
            TransactionTable::new(64, Duration::MAX, u32::MAX);
        let start = Instant::now();

        let pending = table.begin_pending(id(1), start).unwrap();
        let deadline = pending.deadline_after(Duration::MAX);
        assert!(deadline > start + ms(1_000));
        table.resolve(id(1), "F", start);
        assert!(matches!(
            pending.await_resolution(deadline).await,
            Resolution::Delivered { frame: "F", .. }
        ));

        drop(table.begin_pending(id(2), start).unwrap());
        assert_eq!(table.state(id(2)), Some(SlotState::TimedOut));
        assert!(table.sweep_expired(Instant::now()).is_empty());
    }

    #[tokio::test]
    async fn test_copy_only_for_delivered_frames() {
        let table: TransactionTable<String> = TransactionTable::new(64, ms(50), 3);
        let now = Instant::now();
        let _pending = table.begin_pending(id(1), now).unwrap();

        assert_eq!(
            table.resolve_and_copy(id(9), "stray".to_string(), now),
            (ResolveOutcome::Unmatched, None)
        );
        let (outcome, copy) = table.resolve_and_copy(id(1), "F".to_string(), now);
        assert!(matches!(outcome, ResolveOutcome::Delivered { .. }));
        assert_eq!(copy.as_deref(), Some("F"));

        // Duplicate for a frame not yet consumed.
        assert_eq!(
            table.resolve_and_copy(id(1), "again".to_string(), now),
            (ResolveOutcome::Unmatched, None)
        );
    }

    #[tokio::test]
    async fn test_release_frees_id() {
        let table = table();
        let pending = table.begin_pending(id(8), Instant::now()).unwrap();
        pending.release();
        assert_eq!(table.state(id(8)), None);
    }
}
