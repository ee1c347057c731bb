//! End-to-end ingestion: scripted feed responses through the engine into the
//! registry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;
use tokio::sync::broadcast;

use transitbox::feed::wire::{FeedEntity, FeedHeader, FeedMessage, Position, VehiclePosition};
use transitbox::feed::{
    BoxFuture, FeedFetcher, FeedIngestionEngine, FeedSource, FetchError, IngestionEvent,
};
use transitbox::registry::{RegistryConfig, VehicleRegistry};

const T0: u64 = 1_700_000_000;

struct Script {
    responses: Mutex<VecDeque<Result<Bytes, FetchError>>>,
    calls: AtomicUsize,
}

impl Script {
    fn new(responses: Vec<Result<Bytes, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl FeedFetcher for Script {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(FetchError::Transport {
                        url: url.to_string(),
                        reason: "connection refused".to_string(),
                    })
                })
        })
    }
}

fn vehicle(id: &str, lat: f32, lon: f32, timestamp: u64) -> FeedEntity {
    FeedEntity {
        id: Some(id.to_string()),
        is_deleted: None,
        vehicle: Some(VehiclePosition {
            position: Some(Position {
                latitude: Some(lat),
                longitude: Some(lon),
                ..Default::default()
            }),
            timestamp: Some(timestamp),
            ..Default::default()
        }),
    }
}

fn feed(timestamp: u64, entities: Vec<FeedEntity>) -> Result<Bytes, FetchError> {
    let message = FeedMessage {
        header: Some(FeedHeader {
            gtfs_realtime_version: Some("2.0".to_string()),
            incrementality: None,
            timestamp: Some(timestamp),
        }),
        entity: entities,
    };
    Ok(Bytes::from(message.encode_to_vec()))
}

async fn completed(rx: &mut broadcast::Receiver<IngestionEvent>) -> IngestionEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("event before timeout")
            .expect("channel open");
        if matches!(
            event,
            IngestionEvent::CycleCompleted { .. }
                | IngestionEvent::FetchFailed { .. }
                | IngestionEvent::DecodeFailed { .. }
        ) {
            return event;
        }
    }
}

/// V1 reported at t=0, absent from the feed at t=10s.
async fn run_vanishing_vehicle(stale_after: Duration) -> Arc<VehicleRegistry> {
    let script = Script::new(vec![
        feed(T0, vec![vehicle("V1", 35.0, 139.0, T0)]),
        feed(T0 + 10, vec![vehicle("V2", 35.1, 139.1, T0 + 10)]),
    ]);
    let registry = Arc::new(VehicleRegistry::new(RegistryConfig::with_stale_after(
        stale_after,
    )));
    let engine = FeedIngestionEngine::new(script.clone(), Arc::clone(&registry));
    let mut rx = engine.subscribe();

    engine.start(
        FeedSource::custom("https://feeds.example/vp.pb"),
        Duration::from_millis(10_000),
    );
    completed(&mut rx).await;
    completed(&mut rx).await;
    engine.stop();

    assert_eq!(script.calls.load(Ordering::SeqCst), 2);
    registry
}

#[tokio::test(start_paused = true)]
async fn test_vehicle_kept_within_threshold() {
    let registry = run_vanishing_vehicle(Duration::from_secs(15)).await;

    let ids: Vec<String> = registry.list_at(T0 + 10).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["V1".to_string(), "V2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_vehicle_hidden_at_threshold() {
    let registry = run_vanishing_vehicle(Duration::from_secs(10)).await;

    let ids: Vec<String> = registry.list_at(T0 + 10).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["V2".to_string()]);
    // Flagged, not deleted.
    assert!(registry.get("V1").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_failures_keep_last_good_state() {
    let mut responses = vec![feed(T0, vec![vehicle("V1", 35.0, 139.0, T0)])];
    for _ in 0..5 {
        responses.push(Ok(Bytes::from_static(b"\x0a\xff")));
    }
    let script = Script::new(responses);
    let registry = Arc::new(VehicleRegistry::new(RegistryConfig::without_staleness()));
    let engine = FeedIngestionEngine::new(script.clone(), Arc::clone(&registry));
    let mut rx = engine.subscribe();

    engine.start(FeedSource::preset(0), Duration::from_secs(10));
    assert!(matches!(
        completed(&mut rx).await,
        IngestionEvent::CycleCompleted { .. }
    ));
    for _ in 0..5 {
        assert!(matches!(
            completed(&mut rx).await,
            IngestionEvent::DecodeFailed { .. }
        ));
    }
    // Script exhausted: transport errors from here on.
    for _ in 0..3 {
        assert!(matches!(
            completed(&mut rx).await,
            IngestionEvent::FetchFailed { .. }
        ));
    }
    assert!(engine.is_running());
    assert_eq!(registry.get("V1").map(|r| r.latitude), Some(35.0));

    let telemetry = engine.metrics().snapshot();
    assert_eq!(telemetry.decode_failures, 5);
    assert_eq!(telemetry.fetch_failures, 3);
    engine.stop();
}
