//! Synthetic pointer, halo and tooltip rendering state.
//!
//! The controller owns the single overlay layer; no other component may
//! mutate it. Hosts render [`OverlayState`] however they like; the engine
//! only manages its contents and timing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::element::UiElement;
use crate::errors::EngineError;
use crate::inspect::{Dispatcher, UiInspector};
use crate::score;
use crate::types::{Point, Rect};
use crate::utils::{fraction_of, pause};

const TOOLTIP_WIDTH: f64 = 240.0;
const TOOLTIP_GAP: f64 = 12.0;

/// All feedback durations in one place. Defaults are the tuned demo
/// values; override for faster hosts, keeping the proportions.
#[derive(Debug, Clone)]
pub struct FeedbackTiming {
    /// Full pointer travel time for one move.
    pub move_total: Duration,
    /// Share of the travel spent reaching the approach point.
    pub approach_share: f64,
    /// Pause after scrolling a target into view.
    pub settle: Duration,
    /// How long the clicking flag stays up.
    pub click_hold: Duration,
    /// Ripple animation length, rendered by the host.
    pub ripple: Duration,
    pub halo_hold: Duration,
    pub tooltip_hold: Duration,
    /// Gap inserted between route steps.
    pub step_gap: Duration,
    pub upload_tick: Duration,
    pub upload_hold: Duration,
}

impl Default for FeedbackTiming {
    fn default() -> Self {
        Self {
            move_total: Duration::from_millis(1600),
            approach_share: 0.55,
            settle: Duration::from_millis(420),
            click_hold: Duration::from_millis(420),
            ripple: Duration::from_millis(900),
            halo_hold: Duration::from_millis(700),
            tooltip_hold: Duration::from_millis(1600),
            step_gap: Duration::from_millis(220),
            upload_tick: Duration::from_millis(90),
            upload_hold: Duration::from_millis(600),
        }
    }
}

impl FeedbackTiming {
    /// Uniformly scaled copy; proportions between phases are preserved.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |d: Duration| d.mul_f64(factor.max(0.001));
        Self {
            move_total: scale(self.move_total),
            approach_share: self.approach_share,
            settle: scale(self.settle),
            click_hold: scale(self.click_hold),
            ripple: scale(self.ripple),
            halo_hold: scale(self.halo_hold),
            tooltip_hold: scale(self.tooltip_hold),
            step_gap: scale(self.step_gap),
            upload_tick: scale(self.upload_tick),
            upload_hold: scale(self.upload_hold),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    #[default]
    EaseInOut,
}

impl Easing {
    /// Sample the curve at `t` in [0, 1]. Hosts use this to interpolate
    /// the cursor between retained positions.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// An in-flight cursor movement, rendered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transition {
    pub duration: Duration,
    pub easing: Easing,
}

/// The synthetic pointer. Mutated only through the controller's
/// animation primitives.
#[derive(Debug, Clone, Default)]
pub struct CursorState {
    pub position: Point,
    pub visible: bool,
    /// Drives the transient ripple effect while held.
    pub clicking: bool,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub at: Point,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadItem {
    pub name: String,
    pub percent: u8,
}

/// Everything currently rendered in the overlay layer.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    pub cursor: CursorState,
    pub halo: Option<Rect>,
    pub tooltip: Option<Tooltip>,
    pub uploads_visible: bool,
    pub uploads: Vec<UploadItem>,
}

impl OverlayState {
    /// True when nothing is rendered: the required state after teardown.
    pub fn is_idle(&self) -> bool {
        !self.cursor.visible
            && !self.cursor.clicking
            && self.halo.is_none()
            && self.tooltip.is_none()
            && !self.uploads_visible
            && self.uploads.is_empty()
    }
}

pub struct FeedbackController {
    inspector: Arc<dyn UiInspector>,
    dispatcher: Arc<dyn Dispatcher>,
    pub(crate) timing: FeedbackTiming,
    pub(crate) overlay: Arc<Mutex<OverlayState>>,
    healing: AtomicBool,
}

impl FeedbackController {
    pub fn new(
        inspector: Arc<dyn UiInspector>,
        dispatcher: Arc<dyn Dispatcher>,
        timing: FeedbackTiming,
    ) -> Self {
        Self {
            inspector,
            dispatcher,
            timing,
            overlay: Arc::new(Mutex::new(OverlayState::default())),
            healing: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current overlay contents.
    pub fn overlay(&self) -> OverlayState {
        self.overlay.lock().unwrap().clone()
    }

    pub fn timing(&self) -> &FeedbackTiming {
        &self.timing
    }

    /// Mount the overlay and show the pointer at the viewport center.
    pub fn show(&self) {
        self.inspector.mount_overlay();
        let mut overlay = self.overlay.lock().unwrap();
        overlay.cursor.visible = true;
        overlay.cursor.position = self.inspector.viewport().center();
        overlay.cursor.transition = Transition::default();
    }

    /// Remove every overlay artifact. Safe to call repeatedly; always
    /// called at run teardown.
    pub fn hide(&self) {
        *self.overlay.lock().unwrap() = OverlayState::default();
    }

    /// Two-phase tween to the target: most of the travel goes to an
    /// approach point short of the target, the remainder lands on its
    /// center. A halo marks the arrival.
    pub async fn move_to(
        &self,
        target: &UiElement,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if !score::is_visible(target, self.inspector.as_ref()) {
            self.inspector.scroll_into_view(target);
            pause(self.timing.settle, cancel).await?;
        }

        let bounds = target.bounds();
        // the tree keeps mutating between resolution and movement
        if bounds.area() <= 0.0 {
            return Err(EngineError::Internal(format!(
                "target {} vanished before the pointer reached it",
                target.object_id()
            )));
        }
        let end = bounds.center();
        let start = self.overlay.lock().unwrap().cursor.position;
        let pre = approach_point(start, end);

        let first = fraction_of(self.timing.move_total, self.timing.approach_share);
        let second = self.timing.move_total.saturating_sub(first);

        self.begin_move(pre, first);
        pause(first, cancel).await?;
        self.begin_move(end, second);
        pause(second, cancel).await?;

        self.overlay.lock().unwrap().halo = Some(bounds);
        let overlay = Arc::clone(&self.overlay);
        let hold = self.timing.halo_hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            overlay.lock().unwrap().halo = None;
        });
        Ok(())
    }

    fn begin_move(&self, to: Point, duration: Duration) {
        let mut overlay = self.overlay.lock().unwrap();
        overlay.cursor.transition = Transition {
            duration,
            easing: Easing::EaseInOut,
        };
        overlay.cursor.position = to;
    }

    /// Text callout to the right of the target, clamped to the viewport,
    /// removed after the hold.
    pub fn show_tooltip(&self, target: &UiElement, text: &str) {
        let bounds = target.bounds();
        let viewport = self.inspector.viewport();
        let at = Point::new(
            (bounds.right() + TOOLTIP_GAP).min(viewport.right() - TOOLTIP_WIDTH),
            bounds.y.clamp(viewport.y, viewport.bottom() - TOOLTIP_GAP),
        );
        self.overlay.lock().unwrap().tooltip = Some(Tooltip {
            at,
            text: text.to_string(),
        });

        let overlay = Arc::clone(&self.overlay);
        let hold = self.timing.tooltip_hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            overlay.lock().unwrap().tooltip = None;
        });
    }

    /// Hold the clicking flag long enough for the host to play a ripple.
    /// Feedback only; the actual interaction goes through
    /// [`dispatch_synthetic_click`](Self::dispatch_synthetic_click).
    pub async fn click_effect(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        self.overlay.lock().unwrap().cursor.clicking = true;
        let held = pause(self.timing.click_hold, cancel).await;
        self.overlay.lock().unwrap().cursor.clicking = false;
        held
    }

    /// Resolve the topmost element at the point and synthesize the full
    /// pointer sequence plus a focus attempt. Independent of the
    /// feedback animation.
    pub fn dispatch_synthetic_click(&self, at: Point) {
        let hit = self.inspector.element_from_point(at);
        self.dispatcher.click(at);
        match hit {
            Some(element) => self.inspector.focus(&element),
            None => warn!(x = at.x, y = at.y, "synthetic click hit no element"),
        }
    }

    /// Reattach the overlay whenever the host's layout detaches it.
    ///
    /// The guard drops change notifications raised by the correction
    /// itself, so a remount can never feed back into another remount.
    /// The subscription is taken synchronously at spawn time so no
    /// mutation slips between spawning and the first poll. Runs until
    /// the inspector goes away.
    pub fn spawn_watchdog(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let epochs = self.inspector.structure_epoch();
        tokio::spawn(controller.watch_structure(epochs));
    }

    async fn watch_structure(self: Arc<Self>, mut epochs: watch::Receiver<u64>) {
        while epochs.changed().await.is_ok() {
            if self.healing.load(Ordering::SeqCst) {
                continue;
            }
            if self.inspector.overlay_attached() {
                continue;
            }
            self.healing.store(true, Ordering::SeqCst);
            self.inspector.mount_overlay();
            // swallow the epoch bump the remount just produced
            let _ = epochs.borrow_and_update();
            self.healing.store(false, Ordering::SeqCst);
            debug!("overlay reattached after host mutation");
        }
    }
}

/// Intermediate point of the two-phase tween: short of the target along
/// the travel direction, so the pointer appears to decelerate into it.
fn approach_point(from: Point, to: Point) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let distance = from.distance_to(to);
    if distance < 1.0 {
        return to;
    }
    let backoff = (distance * 0.3).min(140.0);
    Point::new(
        to.x - dx / distance * backoff,
        to.y - dy / distance * backoff,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeSpec, SceneGraph};

    fn fixture() -> (SceneGraph, Arc<FeedbackController>) {
        let scene = SceneGraph::new(Rect::new(0.0, 0.0, 1024.0, 768.0));
        let controller = Arc::new(FeedbackController::new(
            Arc::new(scene.clone()),
            Arc::new(scene.clone()),
            FeedbackTiming::default().scaled(0.02),
        ));
        (scene, controller)
    }

    #[test]
    fn ease_in_out_is_anchored_and_monotonic() {
        assert_eq!(Easing::EaseInOut.apply(0.0), 0.0);
        assert_eq!(Easing::EaseInOut.apply(1.0), 1.0);
        let samples: Vec<f64> = (0..=10).map(|i| Easing::EaseInOut.apply(i as f64 / 10.0)).collect();
        assert!(samples.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn approach_point_stops_short_of_the_target() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(300.0, 0.0);
        let pre = approach_point(from, to);
        assert!(pre.x < to.x);
        assert!(pre.x > from.x);
        assert_eq!(pre.y, 0.0);
    }

    #[tokio::test]
    async fn move_to_lands_on_the_target_center() {
        let (scene, controller) = fixture();
        let button = scene.add_node(
            None,
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(100.0, 100.0, 80.0, 40.0),
                ..NodeSpec::default()
            },
        );
        controller.show();
        let cancel = CancellationToken::new();
        controller.move_to(&button, &cancel).await.unwrap();
        let overlay = controller.overlay();
        assert_eq!(overlay.cursor.position, Point::new(140.0, 120.0));
        assert!(overlay.halo.is_some());
    }

    #[tokio::test]
    async fn offscreen_target_is_scrolled_into_view_first() {
        let (scene, controller) = fixture();
        let below_fold = scene.add_node(
            None,
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(100.0, 4000.0, 80.0, 40.0),
                ..NodeSpec::default()
            },
        );
        controller.show();
        let cancel = CancellationToken::new();
        controller.move_to(&below_fold, &cancel).await.unwrap();
        assert_eq!(scene.scroll_log(), vec![below_fold.object_id()]);
        assert!(below_fold.bounds().y < 768.0);
    }

    #[tokio::test]
    async fn tooltip_is_clamped_to_the_viewport() {
        let (scene, controller) = fixture();
        let at_edge = scene.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(980.0, 10.0, 40.0, 20.0),
                ..NodeSpec::default()
            },
        );
        controller.show_tooltip(&at_edge, "Edge case");
        let tooltip = controller.overlay().tooltip.unwrap();
        assert!(tooltip.at.x + TOOLTIP_WIDTH <= 1024.0);
    }

    #[tokio::test]
    async fn cancelled_click_effect_still_clears_the_flag() {
        let (_scene, controller) = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = controller.click_effect(&cancel).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(!controller.overlay().cursor.clicking);
    }

    #[tokio::test]
    async fn watchdog_reattaches_a_detached_overlay() {
        let (scene, controller) = fixture();
        controller.show();
        assert!(scene.overlay_attached());
        controller.spawn_watchdog();

        scene.detach_overlay();
        assert!(!scene.overlay_attached());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scene.overlay_attached());
    }

    #[tokio::test]
    async fn synthetic_click_records_dispatch_and_focus() {
        let (scene, controller) = fixture();
        let button = scene.add_node(
            None,
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(100.0, 100.0, 80.0, 40.0),
                ..NodeSpec::default()
            },
        );
        controller.dispatch_synthetic_click(Point::new(140.0, 120.0));
        assert_eq!(scene.clicks(), vec![Point::new(140.0, 120.0)]);
        assert_eq!(scene.focused().unwrap(), button);
    }
}
