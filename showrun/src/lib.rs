//! Scripted UI walkthrough engine
//!
//! This crate drives an application's UI through a declarative script of
//! steps — visit a control, click it, wait for an effect, narrate it —
//! against an arbitrary, mutating visual tree. It simulates human-like
//! pointer movement, enforces one run at a time, cancels cooperatively,
//! and synchronizes with an event-driven case store that updates out of
//! band.
//!
//! The engine touches the host only through two capability seams,
//! [`UiInspector`] and [`Dispatcher`], so it runs headless against the
//! bundled in-memory [`SceneGraph`] exactly as it would against a real
//! visual tree.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use showrun::{Engine, MemoryCaseStore, Rect, SceneGraph, SignalBus};
//!
//! # async fn demo() {
//! let scene = SceneGraph::new(Rect::new(0.0, 0.0, 1280.0, 800.0));
//! let bus = SignalBus::default();
//! let engine = Engine::new(
//!     Arc::new(scene.clone()),
//!     Arc::new(scene),
//!     bus.clone(),
//!     Arc::new(MemoryCaseStore::default()),
//! );
//! engine.spawn_signal_listener();
//! engine.start().await;
//! # }
//! ```

pub mod bus;
pub mod element;
pub mod errors;
pub mod feedback;
pub mod inspect;
pub mod locator;
pub mod runner;
pub mod scene;
pub mod score;
pub mod script;
pub mod selector;
pub mod session;
pub mod sync;
#[cfg(test)]
mod tests;
pub mod types;
pub mod uploads;
mod utils;

pub use bus::{Signal, SignalBus};
pub use element::{UiElement, UiNodeImpl};
pub use errors::EngineError;
pub use feedback::{FeedbackController, FeedbackTiming, OverlayState};
pub use inspect::{Dispatcher, UiInspector};
pub use locator::{normalize, Candidate, TargetKind, TargetResolver, TargetSpec};
pub use runner::{AcceptReason, Narration, NarrationFeed, RouteTiming, StepOutcome};
pub use scene::{NodeSpec, SceneGraph};
pub use script::{demo_script, side_effect, ScriptContext, Step, StepKind};
pub use selector::Selector;
pub use session::{Engine, EngineConfig};
pub use sync::{CaseStore, MemoryCaseStore, SyncBridge};
pub use types::{CaseSnapshot, Point, Rect};
