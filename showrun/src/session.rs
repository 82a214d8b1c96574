//! Run lifecycle: mutual exclusion, cancellation, guaranteed teardown,
//! and the bus-facing trigger surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{Signal, SignalBus};
use crate::feedback::{FeedbackController, FeedbackTiming, OverlayState};
use crate::inspect::{Dispatcher, UiInspector};
use crate::locator::TargetResolver;
use crate::runner::{NarrationFeed, RouteRunner, RouteTiming, StepOutcome};
use crate::script::{demo_script, ScriptContext, Step};
use crate::sync::{CaseStore, SyncBridge};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub feedback: FeedbackTiming,
    pub route: RouteTiming,
}

impl EngineConfig {
    /// Uniformly scaled copy, proportions preserved. Used by fast hosts
    /// and the test suite.
    pub fn scaled(factor: f64) -> Self {
        Self {
            feedback: FeedbackTiming::default().scaled(factor),
            route: RouteTiming::default().scaled(factor),
        }
    }
}

/// The engine: owns the script, the feedback layer, the narration feed,
/// and the one-run-at-a-time policy.
///
/// Construct inside a tokio runtime; the sync bridge and the overlay
/// watchdog spawn their background tasks immediately.
pub struct Engine {
    inspector: Arc<dyn UiInspector>,
    feedback: Arc<FeedbackController>,
    bridge: Arc<SyncBridge>,
    bus: SignalBus,
    narration: NarrationFeed,
    script: Vec<Step>,
    route: RouteTiming,
    running: AtomicBool,
    panel_open: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Engine {
    /// Engine with the default configuration and the canned demo script.
    pub fn new(
        inspector: Arc<dyn UiInspector>,
        dispatcher: Arc<dyn Dispatcher>,
        bus: SignalBus,
        store: Arc<dyn CaseStore>,
    ) -> Arc<Self> {
        Self::with_script(inspector, dispatcher, bus, store, EngineConfig::default(), demo_script)
    }

    /// Engine with explicit timings and a custom script. The script
    /// builder receives the shared handles its closures may capture.
    pub fn with_script(
        inspector: Arc<dyn UiInspector>,
        dispatcher: Arc<dyn Dispatcher>,
        bus: SignalBus,
        store: Arc<dyn CaseStore>,
        config: EngineConfig,
        build: impl FnOnce(&ScriptContext) -> Vec<Step>,
    ) -> Arc<Self> {
        let feedback = Arc::new(FeedbackController::new(
            Arc::clone(&inspector),
            dispatcher,
            config.feedback,
        ));
        feedback.spawn_watchdog();
        let bridge = SyncBridge::spawn(bus.clone(), store);
        let ctx = ScriptContext {
            bus: bus.clone(),
            bridge: Arc::clone(&bridge),
            feedback: Arc::clone(&feedback),
        };
        let script = build(&ctx);
        Arc::new(Self {
            inspector,
            feedback,
            bridge,
            bus,
            narration: NarrationFeed::new(),
            script,
            route: config.route,
            running: AtomicBool::new(false),
            panel_open: AtomicBool::new(false),
            cancel: Mutex::new(None),
        })
    }

    pub fn bridge(&self) -> Arc<SyncBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn narration(&self) -> &NarrationFeed {
        &self.narration
    }

    /// Snapshot of the overlay layer, for hosts and assertions.
    pub fn overlay(&self) -> OverlayState {
        self.feedback.overlay()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    /// Flip the narration panel. Pure display state: it never touches
    /// the run, and narration is recorded either way.
    pub fn toggle_panel(&self) -> bool {
        let was = self.panel_open.fetch_xor(true, Ordering::SeqCst);
        !was
    }

    /// Start a run with the narration panel open. Never fails: a start
    /// while another run is active is silently dropped and returns no
    /// outcomes.
    pub async fn start(&self) -> Vec<StepOutcome> {
        self.panel_open.store(true, Ordering::SeqCst);
        self.run(false).await
    }

    /// Autopilot: run without opening the narration panel. The feed is
    /// still populated and can be inspected if the panel opens later.
    pub async fn start_silent(&self) -> Vec<StepOutcome> {
        self.run(true).await
    }

    /// Signal the active run to stop at its next suspension point.
    /// Advisory: in-flight synchronous work is not rolled back.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.lock().unwrap().as_ref() {
            info!("cancel requested");
            token.cancel();
        }
    }

    async fn run(&self, silent: bool) -> Vec<StepOutcome> {
        // the check-and-set happens synchronously, before any await
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored; a run is already active");
            return Vec::new();
        }
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = Some(token.clone());
        let run_id = Uuid::new_v4();
        info!(%run_id, silent, "run started");

        // teardown fires exactly once per run, however the run ends
        let _guard = RunGuard { engine: self };

        self.narration.clear();
        self.narration.push("run started");
        self.feedback.show();

        let runner = RouteRunner::new(
            TargetResolver::new(Arc::clone(&self.inspector)),
            Arc::clone(&self.feedback),
            self.narration.clone(),
            self.route.clone(),
        );
        let outcomes = runner.run_route(&self.script, &token).await;

        info!(
            %run_id,
            steps = outcomes.len(),
            cancelled = token.is_cancelled(),
            "run finished"
        );
        outcomes
    }

    fn teardown(&self) {
        self.feedback.hide();
        *self.cancel.lock().unwrap() = None;
        self.running.store(false, Ordering::SeqCst);
        debug!("run torn down");
    }

    /// Listen for external start/stop triggers on the bus. Runs started
    /// this way execute on their own tasks so the listener stays
    /// responsive to `agent:stop`.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(Signal::AgentStart) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            engine.start().await;
                        });
                    }
                    Ok(Signal::Autopilot) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            engine.start_silent().await;
                        });
                    }
                    Ok(Signal::AgentStop) => engine.cancel(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

struct RunGuard<'a> {
    engine: &'a Engine,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.teardown();
    }
}
