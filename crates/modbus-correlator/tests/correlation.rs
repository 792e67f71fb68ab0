//! # Correlation Integration Tests
//!
//! End-to-end behaviour of the correlator as a connection would drive it:
//! callers register and wait, a single dispatcher feeds decoded frames in,
//! and the sweeper reclaims ids that never got an answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modbus_correlator::{
    spawn_dispatcher, spawn_sweeper, ChannelObserver, Correlator, CorrelatorConfig,
    CorrelatorConfigBuilder, CorrelatorError, InboundEvent, Metrics, RequestTransport,
    ResolveOutcome, SlotState, TransportError,
};
use modbus_types::{DecodedFrame, ExceptionCode, ExceptionResponse, TransactionId};
use tokio::sync::mpsc;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn id(value: u16) -> TransactionId {
    TransactionId::new(value)
}

fn correlator_with_timeout(timeout_ms: u64) -> Arc<Correlator<u16>> {
    let config = CorrelatorConfigBuilder::new()
        .response_timeout_ms(timeout_ms)
        .build()
        .unwrap();
    Arc::new(Correlator::new(config).unwrap())
}

/// Id 7 is answered at 30ms with a 50ms timeout: the caller gets the frame
/// and 30ms is recorded.
#[tokio::test(start_paused = true)]
async fn test_response_before_deadline_is_delivered() {
    let correlator = correlator_with_timeout(50);
    let (frames, inbound) = mpsc::channel::<InboundEvent<u16>>(16);
    let dispatcher = spawn_dispatcher(correlator.clone(), inbound);

    let pending = correlator.register(id(7)).unwrap();
    let server = tokio::spawn(async move {
        tokio::time::sleep(ms(30)).await;
        frames
            .send(Ok(DecodedFrame::response(id(7), 1, 0x1234)))
            .await
            .unwrap();
    });

    let response = correlator.await_response(pending, None).await.unwrap();
    assert_eq!(response.body, 0x1234);
    assert_eq!(response.transaction_id(), id(7));
    assert_eq!(response.round_trip, ms(30));

    server.await.unwrap();
    let summary = dispatcher.await.unwrap();
    assert_eq!(summary.delivered, 1);

    let snapshot = correlator.statistics_snapshot();
    assert_eq!(snapshot.total_requests, 1);
    assert_eq!(snapshot.fastest_ms, Some(30));
    assert_eq!(snapshot.top_slowest_ms, vec![30]);
    assert_eq!(correlator.table().occupancy(), 0);
}

/// Id 9 is never answered in time: NoResponse at 50ms, then the frame at
/// 80ms is late and counted lost.
#[tokio::test(start_paused = true)]
async fn test_late_frame_is_counted_lost() {
    let correlator = correlator_with_timeout(50);
    let start = tokio::time::Instant::now();

    let pending = correlator.register(id(9)).unwrap();
    let err = correlator.await_response(pending, None).await.unwrap_err();
    assert_eq!(start.elapsed(), ms(50));
    assert!(matches!(
        err,
        CorrelatorError::NoResponse { transaction_id, timeout_ms: 50 } if transaction_id == id(9)
    ));
    assert!(err.is_retryable());
    assert_eq!(correlator.table().state(id(9)), Some(SlotState::TimedOut));

    tokio::time::sleep(ms(30)).await;
    let outcome = correlator.on_frame_arrived(DecodedFrame::response(id(9), 1, 0));
    assert_eq!(outcome, ResolveOutcome::LateArrival { waited: ms(80) });

    let snapshot = correlator.statistics_snapshot();
    assert_eq!(snapshot.lost_requests, 1);
    assert_eq!(snapshot.total_requests, 0);
    assert_eq!(correlator.table().occupancy(), 0);
}

/// A frame for id 42 that nobody registered changes nothing.
#[tokio::test]
async fn test_unregistered_frame_is_unmatched() {
    let correlator = correlator_with_timeout(50);
    let pending = correlator.register(id(1)).unwrap();

    let outcome = correlator.on_frame_arrived(DecodedFrame::response(id(42), 1, 0));
    assert_eq!(outcome, ResolveOutcome::Unmatched);
    assert_eq!(correlator.table().occupancy(), 1);
    assert_eq!(correlator.table().state(id(1)), Some(SlotState::Pending));
    assert!(correlator.statistics_snapshot().is_empty());

    pending.release();
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let correlator = correlator_with_timeout(50);
    let pending = correlator.register(id(3)).unwrap();

    let err = correlator.register(id(3)).unwrap_err();
    assert_eq!(err, CorrelatorError::AlreadyPending { transaction_id: id(3) });
    assert!(err.is_usage_error());

    pending.release();
    assert!(correlator.register(id(3)).is_ok());
}

/// Id 5 is answered, its frame discarded unread, and the id handed to a
/// new request. The first request's guard going away must not disturb the
/// second one.
#[tokio::test]
async fn test_reused_id_survives_stale_guard() {
    let correlator = correlator_with_timeout(50);

    let first = correlator.register(id(5)).unwrap();
    correlator.on_frame_arrived(DecodedFrame::response(id(5), 1, 1));
    assert!(correlator.cleanup_fulfilled(id(5)));

    let second = correlator.register(id(5)).unwrap();
    drop(first);
    assert_eq!(correlator.table().state(id(5)), Some(SlotState::Pending));

    let outcome = correlator.on_frame_arrived(DecodedFrame::response(id(5), 1, 2));
    assert!(matches!(outcome, ResolveOutcome::Delivered { .. }));

    let response = correlator.await_response(second, None).await.unwrap();
    assert_eq!(response.body, 2);
    assert_eq!(correlator.statistics_snapshot().lost_requests, 0);
}

#[tokio::test]
async fn test_server_exception_reaches_caller() {
    let correlator = correlator_with_timeout(50);
    let pending = correlator.register(id(11)).unwrap();
    let exception = ExceptionResponse::from_wire(0x83, 0x02);

    correlator.on_frame_arrived(DecodedFrame::exception(id(11), 1, exception));

    match correlator.await_response(pending, None).await {
        Err(CorrelatorError::ProtocolError {
            transaction_id,
            exception,
        }) => {
            assert_eq!(transaction_id, id(11));
            assert_eq!(exception.function_code, 0x03);
            assert_eq!(exception.exception_code, ExceptionCode::IllegalDataAddress);
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

/// Simulated server: answers every request in reverse batch order through
/// the dispatcher channel.
struct ReorderingTransport {
    requests: mpsc::UnboundedSender<(TransactionId, u16)>,
}

#[async_trait]
impl RequestTransport for ReorderingTransport {
    type Request = u16;

    async fn transmit(&self, transaction_id: TransactionId, request: u16) -> Result<(), TransportError> {
        self.requests
            .send((transaction_id, request))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_callers_share_one_dispatcher() {
    const CALLERS: u16 = 64;

    let correlator: Arc<Correlator<u16>> =
        Arc::new(Correlator::new(CorrelatorConfig::default()).unwrap());
    let (frames, inbound) = mpsc::channel::<InboundEvent<u16>>(256);
    let dispatcher = spawn_dispatcher(correlator.clone(), inbound);

    let (requests_tx, mut requests_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(ReorderingTransport {
        requests: requests_tx,
    });

    let server = tokio::spawn(async move {
        let mut batch = Vec::new();
        while let Some(request) = requests_rx.recv().await {
            batch.push(request);
            if batch.len() == usize::from(CALLERS) {
                break;
            }
        }
        for (transaction_id, value) in batch.into_iter().rev() {
            frames
                .send(Ok(DecodedFrame::response(transaction_id, 1, value * 2)))
                .await
                .unwrap();
        }
    });

    let mut callers = Vec::new();
    for value in 0..CALLERS {
        let correlator = correlator.clone();
        let transport = transport.clone();
        callers.push(tokio::spawn(async move {
            correlator
                .send_and_await(transport.as_ref(), value, None)
                .await
                .map(|response| (value, response.body))
        }));
    }

    for caller in callers {
        let (sent, received) = caller.await.unwrap().unwrap();
        assert_eq!(received, sent * 2);
    }

    server.await.unwrap();
    let summary = dispatcher.await.unwrap();
    assert_eq!(summary.delivered, u64::from(CALLERS));
    assert_eq!(summary.unmatched, 0);
    assert_eq!(correlator.statistics_snapshot().total_requests, u64::from(CALLERS));
    assert_eq!(correlator.table().occupancy(), 0);
}

/// A caller that stops waiting early keeps its id reserved; the frame that
/// shows up afterwards is late, not delivered.
#[tokio::test(start_paused = true)]
async fn test_cancelled_wait_reserves_id() {
    let correlator = correlator_with_timeout(100);
    let pending = correlator.register(id(21)).unwrap();

    let cancelled =
        tokio::time::timeout(ms(10), correlator.await_response(pending, None)).await;
    assert!(cancelled.is_err());
    assert_eq!(correlator.table().state(id(21)), Some(SlotState::TimedOut));
    assert!(matches!(
        correlator.register(id(21)),
        Err(CorrelatorError::TransactionIdReserved { .. })
    ));

    let outcome = correlator.on_frame_arrived(DecodedFrame::response(id(21), 1, 0));
    assert!(matches!(outcome, ResolveOutcome::LateArrival { .. }));
    assert_eq!(correlator.statistics_snapshot().lost_requests, 1);
    assert!(correlator.register(id(21)).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_makes_exhausted_space_usable_again() {
    let config = CorrelatorConfigBuilder::new()
        .response_timeout_ms(50)
        .transaction_id_space_size(4)
        .timed_out_retention_factor(2)
        .sweep_interval_ms(25)
        .build()
        .unwrap();
    let metrics = Arc::new(Metrics::new());
    let correlator: Arc<Correlator<u16>> =
        Arc::new(Correlator::with_metrics(config, metrics.clone()).unwrap());
    let sweeper = spawn_sweeper(correlator.clone());

    let pendings: Vec<_> = (0..4).map(|_| correlator.register_next().unwrap()).collect();
    for pending in pendings {
        assert!(correlator.await_response(pending, None).await.is_err());
    }
    assert_eq!(correlator.table().timed_out_count(), 4);
    assert!(matches!(
        correlator.register_next(),
        Err(CorrelatorError::IdSpaceExhausted { space_size: 4 })
    ));

    tokio::time::sleep(ms(200)).await;
    assert_eq!(correlator.table().occupancy(), 0);
    assert_eq!(correlator.statistics_snapshot().lost_requests, 4);
    assert_eq!(metrics.snapshot().reclaimed, 4);

    let pending = correlator.register_next().unwrap();
    assert!(pending.transaction_id().value() < 4);
    pending.release();

    sweeper.shutdown();
}

#[tokio::test]
async fn test_channel_observer_streams_delivered_frames() {
    let correlator = correlator_with_timeout(50);
    let (observer, mut stream) = ChannelObserver::<u16>::new(8);
    correlator.subscribe(Arc::new(observer));

    for raw in [1u16, 2, 3] {
        let pending = correlator.register(id(raw)).unwrap();
        correlator.on_frame_arrived(DecodedFrame::response(id(raw), 1, raw * 10));
        correlator.await_response(pending, None).await.unwrap();
    }
    correlator.on_frame_arrived(DecodedFrame::response(id(99), 1, 0));

    let mut seen = Vec::new();
    while let Ok(frame) = stream.try_recv() {
        seen.push(frame.transaction_id().value());
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_transport_errors_do_not_disturb_pending_requests() {
    let correlator = correlator_with_timeout(50);
    let (frames, inbound) = mpsc::channel::<InboundEvent<u16>>(4);
    let dispatcher = spawn_dispatcher(correlator.clone(), inbound);

    let pending = correlator.register(id(5)).unwrap();
    frames
        .send(Err(TransportError::Io("connection reset".into())))
        .await
        .unwrap();
    frames
        .send(Ok(DecodedFrame::response(id(5), 1, 55)))
        .await
        .unwrap();
    drop(frames);

    let response = correlator.await_response(pending, None).await.unwrap();
    assert_eq!(response.body, 55);

    let summary = dispatcher.await.unwrap();
    assert_eq!(summary.transport_errors, 1);
    assert_eq!(summary.delivered, 1);
}
