use tokio::sync::watch;

use crate::element::UiElement;
use crate::types::{Point, Rect};

/// The capability seam between the engine and the host's visual tree.
///
/// Core logic (scoring, resolution, feedback placement) depends only on
/// this trait, which keeps the engine headless-testable against an
/// in-memory scene graph.
pub trait UiInspector: Send + Sync {
    /// Root of the visual tree.
    fn root(&self) -> UiElement;

    /// The visible viewport in document coordinates.
    fn viewport(&self) -> Rect;

    /// The engine's own overlay layer, when mounted. Elements inside it
    /// are never valid targets.
    fn overlay_root(&self) -> Option<UiElement>;

    /// Mount the overlay layer, or re-attach it if the host's layout
    /// detached it. Idempotent.
    fn mount_overlay(&self) -> UiElement;

    fn overlay_attached(&self) -> bool;

    /// Topmost interactive-tree element at the given point, excluding the
    /// overlay layer.
    fn element_from_point(&self, point: Point) -> Option<UiElement>;

    /// All elements carrying the given stable automation id, in document
    /// order.
    fn find_by_stable_id(&self, id: &str) -> Vec<UiElement>;

    /// Bring the element into the viewport. Best-effort.
    fn scroll_into_view(&self, element: &UiElement);

    /// Move input focus to the element. Best-effort.
    fn focus(&self, element: &UiElement);

    /// Monotonic counter bumped on every structural mutation of the tree.
    /// The overlay watchdog subscribes to this to detect detachment.
    fn structure_epoch(&self) -> watch::Receiver<u64>;
}

/// Synthetic input capability. One implementation per host: real pointer
/// event dispatch in production, a recording double under test.
pub trait Dispatcher: Send + Sync {
    /// Synthesize a full pointer press/release/click sequence at the point.
    fn click(&self, point: Point);
}
