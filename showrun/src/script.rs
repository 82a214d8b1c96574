//! The step model and the fixed demo route.
//!
//! A script is a static, ordered asset: steps are immutable once defined
//! and never mutated at runtime. Side effects and hooks are closures over
//! the engine's shared handles, invoked by the route runner.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use crate::bus::SignalBus;
use crate::feedback::FeedbackController;
use crate::locator::TargetSpec;
use crate::sync::{SyncBridge, DEFAULT_THRESHOLD_TIMEOUT};

/// A side-effecting action attached to a step, performed once a target is
/// engaged. Failures are swallowed at the step boundary.
pub type SideEffect = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A hook invoked at a step boundary; may itself be asynchronous.
pub type Hook = SideEffect;

/// Success predicate evaluated after a step's `run`.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Wrap an async closure as a [`SideEffect`]/[`Hook`].
pub fn side_effect<F, Fut>(f: F) -> SideEffect
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StepKind {
    /// Narrate without touching the tree.
    Speak,
    /// Anchor the narration to an element, if one can be found.
    Focus,
    /// Engage an actionable element.
    Click,
}

/// One scripted unit of automated interaction.
#[derive(Clone)]
pub struct Step {
    /// Unique within a script.
    pub id: String,
    pub kind: StepKind,
    /// Narration text for the step.
    pub say: String,
    pub target: TargetSpec,
    pub run: Option<SideEffect>,
    pub success: Option<Predicate>,
    /// Treat the step as successful once `run` has been invoked, without
    /// re-checking `success`.
    pub force_success_if_run: bool,
    pub before: Option<Hook>,
    pub after: Option<Hook>,
}

impl Step {
    fn new(id: &str, kind: StepKind, say: &str, target: TargetSpec) -> Self {
        Self {
            id: id.to_string(),
            kind,
            say: say.to_string(),
            target,
            run: None,
            success: None,
            force_success_if_run: false,
            before: None,
            after: None,
        }
    }

    pub fn speak(id: &str, say: &str) -> Self {
        Self::new(id, StepKind::Speak, say, TargetSpec::default())
    }

    pub fn focus(id: &str, say: &str, target: TargetSpec) -> Self {
        Self::new(id, StepKind::Focus, say, target)
    }

    pub fn click(id: &str, say: &str, target: TargetSpec) -> Self {
        Self::new(id, StepKind::Click, say, target)
    }

    pub fn with_run(mut self, run: SideEffect) -> Self {
        self.run = Some(run);
        self
    }

    pub fn with_success(mut self, predicate: Predicate) -> Self {
        self.success = Some(predicate);
        self
    }

    pub fn with_forced_success(mut self) -> Self {
        self.force_success_if_run = true;
        self
    }

    pub fn with_before(mut self, hook: Hook) -> Self {
        self.before = Some(hook);
        self
    }

    pub fn with_after(mut self, hook: Hook) -> Self {
        self.after = Some(hook);
        self
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("say", &self.say)
            .field("target", &self.target)
            .field("has_run", &self.run.is_some())
            .field("has_success", &self.success.is_some())
            .field("force_success_if_run", &self.force_success_if_run)
            .finish()
    }
}

/// Shared handles available to script closures.
#[derive(Clone)]
pub struct ScriptContext {
    pub bus: SignalBus,
    pub bridge: Arc<SyncBridge>,
    pub feedback: Arc<FeedbackController>,
}

/// The fixed walkthrough shipped with the engine: tour the case board,
/// open the tracker, create a case, upload its documents, and show the
/// analytics panel reacting.
pub fn demo_script(ctx: &ScriptContext) -> Vec<Step> {
    let open_tracker = {
        let bridge = Arc::clone(&ctx.bridge);
        side_effect(move || {
            let bridge = Arc::clone(&bridge);
            async move {
                bridge.open_tracker();
                Ok(())
            }
        })
    };

    let close_tracker = {
        let bridge = Arc::clone(&ctx.bridge);
        side_effect(move || {
            let bridge = Arc::clone(&bridge);
            async move {
                bridge.close_tracker();
                Ok(())
            }
        })
    };

    let open_ops = {
        let bridge = Arc::clone(&ctx.bridge);
        side_effect(move || {
            let bridge = Arc::clone(&bridge);
            async move {
                bridge.open_ops();
                Ok(())
            }
        })
    };

    let request_uploads = {
        let bridge = Arc::clone(&ctx.bridge);
        side_effect(move || {
            let bridge = Arc::clone(&bridge);
            async move {
                bridge.request_upload_demo();
                Ok(())
            }
        })
    };

    let uploads_and_wait = {
        let bridge = Arc::clone(&ctx.bridge);
        let feedback = Arc::clone(&ctx.feedback);
        side_effect(move || {
            let bridge = Arc::clone(&bridge);
            let feedback = Arc::clone(&feedback);
            async move {
                let names = vec![
                    "passport.pdf".to_string(),
                    "bank-statement.pdf".to_string(),
                    "signed-contract.pdf".to_string(),
                ];
                feedback.simulate_uploads(&names).await;
                if !bridge
                    .wait_for_percent_at_least(100.0, DEFAULT_THRESHOLD_TIMEOUT)
                    .await
                {
                    info!("case never reported complete; moving on");
                }
                Ok(())
            }
        })
    };

    let case_seen = {
        let bridge = Arc::clone(&ctx.bridge);
        Arc::new(move || bridge.latest_percent().is_some()) as Predicate
    };

    vec![
        Step::speak("intro", "Here's the thirty-second tour: one case, end to end."),
        Step::focus(
            "case-board",
            "This board tracks every open case.",
            TargetSpec::new(["#case-board", "classname:board"], ["case board", "open cases"]),
        ),
        Step::click(
            "open-tracker",
            "First, the tracker panel.",
            TargetSpec::new(["#tracker-toggle", "role:button|Tracker"], ["tracker"]),
        )
        .with_run(open_tracker)
        .with_forced_success(),
        Step::click(
            "create-case",
            "Creating a fresh case.",
            TargetSpec::new(["#new-case", "role:button|New case"], ["new case", "create case"]),
        )
        .with_success(case_seen),
        Step::click(
            "upload-docs",
            "Uploading the supporting documents.",
            TargetSpec::new(["#upload-docs"], ["upload documents", "upload"]),
        )
        .with_run(request_uploads)
        .with_after(uploads_and_wait)
        .with_forced_success(),
        Step::focus(
            "ops",
            "Analytics picks the changes up live.",
            TargetSpec::new(["#ops-panel"], ["analytics"]),
        )
        .with_before(open_ops),
        Step::speak("outro", "That's the whole flow.").with_after(close_tracker),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;
    use crate::sync::MemoryCaseStore;
    use crate::types::Rect;

    #[test]
    fn builders_set_the_optional_pieces() {
        let step = Step::click("x", "Click it.", TargetSpec::new(["#x"], [] as [&str; 0]))
            .with_run(side_effect(|| async { Ok(()) }))
            .with_forced_success();
        assert_eq!(step.kind, StepKind::Click);
        assert!(step.run.is_some());
        assert!(step.force_success_if_run);
        assert!(step.success.is_none());
    }

    #[tokio::test]
    async fn demo_script_is_well_formed() {
        let scene = SceneGraph::new(Rect::new(0.0, 0.0, 1024.0, 768.0));
        let bus = SignalBus::default();
        let bridge = SyncBridge::spawn(bus.clone(), Arc::new(MemoryCaseStore::default()));
        let feedback = Arc::new(FeedbackController::new(
            Arc::new(scene.clone()),
            Arc::new(scene),
            Default::default(),
        ));
        let ctx = ScriptContext {
            bus,
            bridge,
            feedback,
        };
        let script = demo_script(&ctx);

        let mut ids: Vec<&str> = script.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), script.len(), "step ids must be unique");

        for step in &script {
            match step.kind {
                StepKind::Speak => assert!(step.target.is_empty()),
                _ => assert!(!step.target.is_empty()),
            }
        }
    }
}
