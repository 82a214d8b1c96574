//! Step executor: consumes the static script top to bottom.
//!
//! The failure policy is best-effort narrate and continue: a step that
//! cannot find its target, or whose callbacks fail, never aborts the
//! route. Cancellation is the only thing that stops the loop early, and
//! even then the outer session still tears everything down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::feedback::FeedbackController;
use crate::locator::{
    Candidate, TargetKind, TargetResolver, DEFAULT_RESOLVE_POLL, DEFAULT_RESOLVE_TIMEOUT,
};
use crate::script::{Step, StepKind};
use crate::utils::pause;

/// Route-level pacing. Defaults are the tuned demo values.
#[derive(Debug, Clone)]
pub struct RouteTiming {
    /// Budget for one target resolution attempt.
    pub resolve_timeout: Duration,
    pub resolve_poll: Duration,
    /// Pause between a click step's `run` and its success evaluation.
    pub engage_pause: Duration,
}

impl Default for RouteTiming {
    fn default() -> Self {
        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            resolve_poll: DEFAULT_RESOLVE_POLL,
            engage_pause: Duration::from_millis(420),
        }
    }
}

impl RouteTiming {
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |d: Duration| d.mul_f64(factor.max(0.001));
        Self {
            resolve_timeout: scale(self.resolve_timeout),
            resolve_poll: scale(self.resolve_poll),
            engage_pause: scale(self.engage_pause),
        }
    }
}

/// One timestamped narration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Ordered, append-only feed of narration for the current run.
#[derive(Clone, Default)]
pub struct NarrationFeed {
    entries: Arc<Mutex<Vec<Narration>>>,
}

impl NarrationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: impl Into<String>) {
        let text = text.into();
        info!(narration = %text);
        self.entries.lock().unwrap().push(Narration {
            at: Utc::now(),
            text,
        });
    }

    pub fn entries(&self) -> Vec<Narration> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries())
    }
}

/// Why a step was accepted. Steps are always accepted; the reason keeps
/// the policy inspectable instead of silently swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptReason {
    /// The step's success predicate returned true.
    PredicateMet,
    /// `force_success_if_run` was set and `run` was invoked.
    Forced,
    /// No target was found; the step was narrated as simulated.
    NoTargetSimulated,
    /// Nothing vouched for the step; the route proceeds regardless.
    Optimistic,
    /// Narration-only step (speak/focus).
    Narrated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub accepted: bool,
    pub reason: AcceptReason,
}

impl StepOutcome {
    fn accepted(step_id: &str, reason: AcceptReason) -> Self {
        Self {
            step_id: step_id.to_string(),
            accepted: true,
            reason,
        }
    }
}

pub struct RouteRunner {
    resolver: TargetResolver,
    feedback: Arc<FeedbackController>,
    narration: NarrationFeed,
    timing: RouteTiming,
}

impl RouteRunner {
    pub fn new(
        resolver: TargetResolver,
        feedback: Arc<FeedbackController>,
        narration: NarrationFeed,
        timing: RouteTiming,
    ) -> Self {
        Self {
            resolver,
            feedback,
            narration,
            timing,
        }
    }

    /// Consume the whole script in order. Returns one outcome per
    /// executed step; cancellation stops the loop between steps.
    pub async fn run_route(&self, steps: &[Step], cancel: &CancellationToken) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(steps.len());
        let gap = self.feedback.timing().step_gap;
        for step in steps {
            if cancel.is_cancelled() {
                info!(step = %step.id, "route cancelled; not starting further steps");
                break;
            }
            match self.run_step(step, cancel).await {
                Ok(outcome) => {
                    debug!(step = %step.id, reason = ?outcome.reason, "step done");
                    outcomes.push(outcome);
                }
                Err(EngineError::Cancelled) => break,
                Err(err) => {
                    // never thrown past a step boundary
                    warn!(step = %step.id, error = %err, "step failed; continuing route");
                    outcomes.push(StepOutcome::accepted(&step.id, AcceptReason::Optimistic));
                }
            }
            if pause(gap, cancel).await.is_err() {
                break;
            }
        }
        outcomes
    }

    async fn run_step(
        &self,
        step: &Step,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, EngineError> {
        debug!(step = %step.id, kind = ?step.kind, "step starting");
        self.invoke_hook(&step.before, "before", &step.id).await;

        let outcome = match step.kind {
            StepKind::Speak => {
                self.narration.push(&step.say);
                StepOutcome::accepted(&step.id, AcceptReason::Narrated)
            }
            StepKind::Focus => {
                let found = self
                    .resolve(step, TargetKind::Focus, cancel)
                    .await;
                match found {
                    Some(candidate) => {
                        self.feedback.move_to(&candidate.element, cancel).await?;
                        self.feedback.show_tooltip(&candidate.element, &step.say);
                        self.narration.push(&step.say);
                    }
                    None => {
                        debug!(step = %step.id, "no anchor; narrating without one");
                        self.narration.push(&step.say);
                    }
                }
                StepOutcome::accepted(&step.id, AcceptReason::Narrated)
            }
            StepKind::Click => {
                let found = self
                    .resolve(step, TargetKind::Click, cancel)
                    .await;
                match found {
                    Some(candidate) => self.engage(step, &candidate, cancel).await?,
                    None => {
                        self.narration.push(format!("{} (simulated)", step.say));
                        let _ = self.invoke_run(step).await;
                        StepOutcome::accepted(&step.id, AcceptReason::NoTargetSimulated)
                    }
                }
            }
        };

        self.invoke_hook(&step.after, "after", &step.id).await;
        Ok(outcome)
    }

    /// Click-step engagement: move, tooltip, ripple, synthetic click,
    /// `run`, settle, then the optimistic success evaluation.
    async fn engage(
        &self,
        step: &Step,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, EngineError> {
        self.feedback.move_to(&candidate.element, cancel).await?;
        self.feedback.show_tooltip(&candidate.element, &step.say);
        self.narration.push(&step.say);
        self.feedback.click_effect(cancel).await?;
        self.feedback
            .dispatch_synthetic_click(candidate.element.bounds().center());

        let ran = self.invoke_run(step).await;
        pause(self.timing.engage_pause, cancel).await?;

        let reason = match &step.success {
            Some(predicate) if predicate() => AcceptReason::PredicateMet,
            _ if step.force_success_if_run && ran => AcceptReason::Forced,
            Some(_) => {
                info!(step = %step.id, "success predicate unmet; proceeding anyway");
                AcceptReason::Optimistic
            }
            None => AcceptReason::Optimistic,
        };
        Ok(StepOutcome::accepted(&step.id, reason))
    }

    async fn resolve(
        &self,
        step: &Step,
        kind: TargetKind,
        cancel: &CancellationToken,
    ) -> Option<Candidate> {
        if step.target.is_empty() {
            return None;
        }
        self.resolver
            .resolve_with_timeout(
                &step.target,
                kind,
                self.timing.resolve_timeout,
                self.timing.resolve_poll,
                cancel,
            )
            .await
    }

    async fn invoke_hook(&self, hook: &Option<crate::script::Hook>, phase: &str, step_id: &str) {
        if let Some(hook) = hook {
            if let Err(err) = hook().await {
                warn!(step = step_id, phase, error = %err, "step hook failed; ignoring");
            }
        }
    }

    /// Returns whether a `run` action existed (and was therefore
    /// invoked); its errors are swallowed.
    async fn invoke_run(&self, step: &Step) -> bool {
        match &step.run {
            Some(run) => {
                if let Err(err) = run().await {
                    warn!(step = %step.id, error = %err, "step run action failed; ignoring");
                }
                true
            }
            None => false,
        }
    }
}
