//! Synchronization bridge between the engine and the externally owned
//! case-state store.
//!
//! The store updates asynchronously and out of band; the bridge caches the
//! latest snapshot it hears on the bus and lets the route block, bounded,
//! until an externally reported completion percentage is reached.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::bus::{Signal, SignalBus};
use crate::types::CaseSnapshot;

/// Coarse safety-net poll of the store, in case a bus update is missed.
pub const THRESHOLD_POLL: Duration = Duration::from_millis(250);
pub const DEFAULT_THRESHOLD_TIMEOUT: Duration = Duration::from_secs(9);

/// Read-only view of the external case record. The engine never mutates
/// case state; all mutation happens through flows outside this crate.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn current_case(&self) -> Option<CaseSnapshot>;
}

/// In-memory store used by the headless host and tests.
#[derive(Default)]
pub struct MemoryCaseStore {
    snapshot: RwLock<Option<CaseSnapshot>>,
}

impl MemoryCaseStore {
    pub fn set(&self, snapshot: CaseSnapshot) {
        *self.snapshot.write().unwrap() = Some(snapshot);
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn current_case(&self) -> Option<CaseSnapshot> {
        self.snapshot.read().unwrap().clone()
    }
}

pub struct SyncBridge {
    bus: SignalBus,
    store: Arc<dyn CaseStore>,
    latest: Arc<RwLock<Option<CaseSnapshot>>>,
}

impl SyncBridge {
    /// Create the bridge and start caching `caseUpdate` snapshots from the
    /// bus. The cache task exits when the bus closes.
    pub fn spawn(bus: SignalBus, store: Arc<dyn CaseStore>) -> Arc<Self> {
        let latest = Arc::new(RwLock::new(None));
        let mut rx = bus.subscribe();
        let cache = Arc::clone(&latest);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(Signal::CaseUpdate(snapshot)) => {
                        debug!(percent = snapshot.percent, "bridge: case snapshot cached");
                        *cache.write().unwrap() = Some(snapshot);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "bridge: lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Arc::new(Self { bus, store, latest })
    }

    pub fn latest_percent(&self) -> Option<f64> {
        self.latest.read().unwrap().as_ref().map(|s| s.percent)
    }

    /// Resolve `true` as soon as the externally reported completion
    /// percentage reaches `threshold`, `false` once `timeout` elapses.
    ///
    /// Resolves immediately on a satisfying cached snapshot; otherwise a
    /// temporary bus listener races a coarse store poll, and both paths
    /// end when this future does, so the listener is torn down exactly
    /// once.
    pub async fn wait_for_percent_at_least(&self, threshold: f64, timeout: Duration) -> bool {
        if self.latest_percent().map_or(false, |p| p >= threshold) {
            return true;
        }

        let mut rx = self.bus.subscribe();
        let mut listening = true;
        let mut poll = tokio::time::interval(THRESHOLD_POLL.min(timeout));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    info!(threshold, ?timeout, "threshold wait timed out");
                    return false;
                }
                event = rx.recv(), if listening => match event {
                    Ok(Signal::CaseUpdate(snapshot)) => {
                        *self.latest.write().unwrap() = Some(snapshot.clone());
                        if snapshot.percent >= threshold {
                            return true;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => listening = false,
                },
                _ = poll.tick() => {
                    if let Some(snapshot) = self.store.current_case().await {
                        if snapshot.percent >= threshold {
                            *self.latest.write().unwrap() = Some(snapshot);
                            return true;
                        }
                    }
                }
            }
        }
    }

    // One-shot panel coordination. Sibling panels subscribe to the bus;
    // nothing here holds a reference to them.

    pub fn open_tracker(&self) {
        self.bus.publish(Signal::TrackerOpen);
    }

    pub fn close_tracker(&self) {
        self.bus.publish(Signal::TrackerClose);
    }

    pub fn open_ops(&self) {
        self.bus.publish(Signal::OpsOpen);
    }

    pub fn request_upload_demo(&self) {
        self.bus.publish(Signal::UploadDemo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_immediately_on_satisfying_cache() {
        let bus = SignalBus::default();
        let store = Arc::new(MemoryCaseStore::default());
        let bridge = SyncBridge::spawn(bus.clone(), store);

        bus.publish(Signal::CaseUpdate(CaseSnapshot {
            percent: 100.0,
            ..CaseSnapshot::default()
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let start = tokio::time::Instant::now();
        assert!(
            bridge
                .wait_for_percent_at_least(100.0, Duration::from_secs(5))
                .await
        );
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn resolves_on_late_update_without_waiting_out_the_timeout() {
        let bus = SignalBus::default();
        let store = Arc::new(MemoryCaseStore::default());
        let bridge = SyncBridge::spawn(bus.clone(), store);

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            publisher.publish(Signal::CaseUpdate(CaseSnapshot {
                percent: 100.0,
                stage: "done".to_string(),
                missing: vec![],
            }));
        });

        let start = tokio::time::Instant::now();
        assert!(
            bridge
                .wait_for_percent_at_least(100.0, Duration::from_secs(5))
                .await
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn store_poll_catches_a_missed_bus_update() {
        let bus = SignalBus::default();
        let store = Arc::new(MemoryCaseStore::default());
        let bridge = SyncBridge::spawn(bus.clone(), Arc::clone(&store) as Arc<dyn CaseStore>);

        // the store advances without any bus traffic
        store.set(CaseSnapshot {
            percent: 100.0,
            ..CaseSnapshot::default()
        });

        assert!(
            bridge
                .wait_for_percent_at_least(100.0, Duration::from_secs(5))
                .await
        );
    }

    #[tokio::test]
    async fn unmet_threshold_times_out_false() {
        let bus = SignalBus::default();
        let store = Arc::new(MemoryCaseStore::default());
        let bridge = SyncBridge::spawn(bus.clone(), store);

        assert!(
            !bridge
                .wait_for_percent_at_least(100.0, Duration::from_millis(120))
                .await
        );
    }
}
