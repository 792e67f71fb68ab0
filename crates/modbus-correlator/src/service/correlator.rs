//! Correlator Service
//!
//! Turns asynchronous frame delivery into "send a request, get its
//! response" for any number of concurrent callers sharing one connection.
//!
//! Flow:
//! 1. Caller registers a transaction id (`register` / `register_next`)
//! 2. Caller transmits the request carrying that id
//! 3. The inbound dispatch path calls `on_frame_arrived` for every frame
//! 4. Caller's `await_response` returns the response, a timeout, or the
//!    server's exception
//!
//! Lock discipline: the transaction table lock is always released before
//! the statistics lock or the observer list is touched.

use modbus_types::{DecodedFrame, MbapHeader, Payload, TransactionId};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{
    CorrelatorConfig, PendingRequest, Resolution, ResolveOutcome, StatisticsAggregator,
    StatisticsSnapshot, TransactionTable,
};
use crate::error::{ConfigError, CorrelatorError, TransportError};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{FrameSink, RequestTransport, ResponseObserver};

/// Pending claim on a transaction id, as handed out by a [`Correlator`].
pub type PendingResponse<'a, R> = PendingRequest<'a, DecodedFrame<R>>;

/// A successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse<R> {
    pub header: MbapHeader,
    pub body: R,
    /// Time between registration and arrival of the frame.
    pub round_trip: Duration,
}

impl<R> ModbusResponse<R> {
    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id
    }
}

/// Request/response correlator for one connection
pub struct Correlator<R> {
    config: CorrelatorConfig,
    table: TransactionTable<DecodedFrame<R>>,
    statistics: StatisticsAggregator,
    /// Copy-on-write, so notifying never holds the lock.
    observers: RwLock<Arc<Vec<Arc<dyn ResponseObserver<R>>>>>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<R> Correlator<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new(config: CorrelatorConfig) -> Result<Self, ConfigError> {
        Self::with_metrics(config, Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(
        config: CorrelatorConfig,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            table: TransactionTable::from_config(&config),
            statistics: StatisticsAggregator::with_capacity(config.slow_set_capacity),
            observers: RwLock::new(Arc::new(Vec::new())),
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn table(&self) -> &TransactionTable<DecodedFrame<R>> {
        &self.table
    }

    /// Register an observer for delivered responses.
    ///
    /// Safe to call from inside an observer callback.
    pub fn subscribe(&self, observer: Arc<dyn ResponseObserver<R>>) {
        let mut observers = self.observers.write();
        let mut updated = Vec::clone(&observers);
        updated.push(observer);
        *observers = Arc::new(updated);
    }

    /// Claim a caller-chosen transaction id.
    pub fn register(&self, id: TransactionId) -> Result<PendingResponse<'_, R>, CorrelatorError> {
        let pending = self.table.begin_pending(id, Instant::now())?;
        Ok(self.admit(pending))
    }

    /// Claim the next free transaction id.
    pub fn register_next(&self) -> Result<PendingResponse<'_, R>, CorrelatorError> {
        let pending = self.table.begin_next(Instant::now())?;
        Ok(self.admit(pending))
    }

    fn admit<'a>(&self, pending: PendingResponse<'a, R>) -> PendingResponse<'a, R> {
        if pending.reclaimed_reservation() {
            debug!(
                transaction_id = %pending.transaction_id(),
                "Reclaimed expired timeout reservation"
            );
            self.record_reclaimed(1);
        }
        pending
    }

    /// Wait for the response to a registered transaction.
    ///
    /// `timeout` defaults to the configured response timeout and is counted
    /// from registration.
    pub async fn await_response(
        &self,
        pending: PendingResponse<'_, R>,
        timeout: Option<Duration>,
    ) -> Result<ModbusResponse<R>, CorrelatorError> {
        let timeout = timeout.unwrap_or_else(|| self.config.response_timeout());
        let transaction_id = pending.transaction_id();
        let deadline = pending.deadline_after(timeout);

        match pending.await_resolution(deadline).await {
            Resolution::Delivered { frame, waited } => match frame.payload {
                Payload::Normal(body) => Ok(ModbusResponse {
                    header: frame.header,
                    body,
                    round_trip: waited,
                }),
                Payload::Exception(exception) => {
                    self.metrics.record_protocol_error(&exception);
                    debug!(
                        transaction_id = %transaction_id,
                        function_code = exception.function_code,
                        exception_code = u8::from(exception.exception_code),
                        "Server answered with exception"
                    );
                    Err(CorrelatorError::ProtocolError {
                        transaction_id,
                        exception,
                    })
                }
            },
            Resolution::TimedOut => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                self.metrics.record_timeout();
                error!(
                    transaction_id = %transaction_id,
                    timeout_ms,
                    "Missing response: the server did not answer within the timeout"
                );
                Err(CorrelatorError::NoResponse {
                    transaction_id,
                    timeout_ms,
                })
            }
        }
    }

    /// Allocate an id, transmit the request, and wait for its response.
    ///
    /// A failed transmit frees the id immediately.
    pub async fn send_and_await<T>(
        &self,
        transport: &T,
        request: T::Request,
        timeout: Option<Duration>,
    ) -> Result<ModbusResponse<R>, CorrelatorError>
    where
        T: RequestTransport,
    {
        let pending = self.register_next()?;
        let transaction_id = pending.transaction_id();

        if let Err(err) = transport.transmit(transaction_id, request).await {
            pending.release();
            warn!(
                transaction_id = %transaction_id,
                error = %err,
                "Transmit failed, transaction released"
            );
            return Err(err.into());
        }

        self.await_response(pending, timeout).await
    }

    /// Route one decoded frame from the inbound dispatch path.
    pub fn on_frame_arrived(&self, frame: DecodedFrame<R>) -> ResolveOutcome {
        let transaction_id = frame.transaction_id();
        let observers = Arc::clone(&self.observers.read());

        // Only a delivered frame is copied, and only when someone listens.
        let (outcome, observed) = if observers.is_empty() {
            (self.table.resolve(transaction_id, frame, Instant::now()), None)
        } else {
            self.table
                .resolve_and_copy(transaction_id, frame, Instant::now())
        };

        match outcome {
            ResolveOutcome::Delivered { waited } => {
                if self.config.statistics_enabled {
                    self.statistics.record(waited);
                }
                let occupancy = self.table.occupancy();
                self.metrics.record_delivered(waited);
                self.metrics.set_occupancy(occupancy);

                let duration_ms = waited.as_millis() as u64;
                if self.config.verbose_logging_enabled {
                    info!(
                        transaction_id = %transaction_id,
                        duration_ms,
                        occupancy,
                        "Stored response"
                    );
                } else {
                    debug!(
                        transaction_id = %transaction_id,
                        duration_ms,
                        occupancy,
                        "Stored response"
                    );
                }

                if let Some(frame) = observed {
                    for observer in observers.iter() {
                        observer.on_response(&frame);
                    }
                }
            }
            ResolveOutcome::LateArrival { waited } => {
                if self.config.statistics_enabled {
                    self.statistics.record_lost();
                }
                self.metrics.record_late_arrival();
                self.metrics.set_occupancy(self.table.occupancy());
                warn!(
                    transaction_id = %transaction_id,
                    duration_ms = waited.as_millis() as u64,
                    "Response arrived after the request had already timed out"
                );

                for observer in observers.iter() {
                    observer.on_late_arrival(transaction_id);
                }
            }
            ResolveOutcome::Unmatched => {
                self.metrics.record_unmatched();
                trace!(transaction_id = %transaction_id, "Discarded unmatched frame");
            }
        }

        outcome
    }

    /// Log an error reported by the connection owner.
    pub fn on_transport_error(&self, error: &TransportError) {
        error!(
            error = %error,
            pending = self.table.pending_count(),
            "Transport error on correlated connection"
        );
    }

    /// Reclaim timed-out ids whose grace period passed without a late frame.
    ///
    /// Each one counts as a lost request.
    pub fn sweep_expired(&self) -> usize {
        let swept = self.table.sweep_expired(Instant::now());
        if !swept.is_empty() {
            self.record_reclaimed(swept.len());
            self.metrics.set_occupancy(self.table.occupancy());
            debug!(
                reclaimed = swept.len(),
                "Reclaimed expired timeout reservations"
            );
        }
        swept.len()
    }

    fn record_reclaimed(&self, count: usize) {
        if self.config.statistics_enabled {
            for _ in 0..count {
                self.statistics.record_lost();
            }
        }
        self.metrics.record_reclaimed(count);
    }

    /// Release a fulfilled slot whose frame will not be consumed.
    pub fn cleanup_fulfilled(&self, id: TransactionId) -> bool {
        self.table.cleanup_fulfilled(id)
    }

    pub fn statistics_snapshot(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.statistics.reset();
    }

    /// Log a summary of the statistics since the last report, then reset.
    pub fn report_statistics(&self) -> StatisticsSnapshot {
        let snapshot = self.statistics.take_snapshot();

        if snapshot.total_requests == 0 {
            info!(
                lost_requests = snapshot.lost_requests,
                "No Modbus requests completed since the last report"
            );
            return snapshot;
        }

        info!(
            total_requests = snapshot.total_requests,
            average_ms = snapshot.average_duration_ms,
            lost_requests = snapshot.lost_requests,
            fastest_ms = snapshot.fastest_ms,
            slowest_ms = snapshot.slowest_ms,
            "Summary of the last {} Modbus requests",
            snapshot.total_requests
        );
        if let Some(threshold) = snapshot.slow_threshold_ms() {
            info!(
                "{} requests took {} ms or more",
                snapshot.top_slowest_ms.len(),
                threshold
            );
        }

        snapshot
    }
}

impl<R> FrameSink<R> for Correlator<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn on_frame_arrived(&self, frame: DecodedFrame<R>) -> ResolveOutcome {
        Correlator::on_frame_arrived(self, frame)
    }

    fn on_transport_error(&self, error: &TransportError) {
        Correlator::on_transport_error(self, error)
    }
}
