//! In-memory scene graph backing the [`UiInspector`] and [`Dispatcher`]
//! capabilities.
//!
//! This is the headless host the engine runs against: a mutable tree of
//! nodes with geometry, style flags and text, plus a structure-change
//! epoch for the overlay watchdog. Tests drive it directly; a real host
//! would provide its own implementations of the same traits.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::debug;

use crate::element::{UiElement, UiNodeImpl};
use crate::inspect::{Dispatcher, UiInspector};
use crate::types::{Point, Rect};

const OVERLAY_CLASS: &str = "showrun-overlay";

/// Construction-time description of a scene node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub role: String,
    pub stable_id: Option<String>,
    pub aria_role: Option<String>,
    pub classes: Vec<String>,
    /// The node's own text, excluding descendants.
    pub text: String,
    pub bounds: Rect,
    pub hidden: bool,
    pub opacity: f64,
    pub disabled: bool,
    pub aria_disabled: bool,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            role: "div".to_string(),
            stable_id: None,
            aria_role: None,
            classes: Vec::new(),
            text: String::new(),
            bounds: Rect::default(),
            hidden: false,
            opacity: 1.0,
            disabled: false,
            aria_disabled: false,
        }
    }
}

struct NodeData {
    spec: NodeSpec,
    parent: Option<usize>,
    children: Vec<usize>,
}

struct SceneState {
    nodes: HashMap<usize, NodeData>,
    root: usize,
    overlay: Option<usize>,
    viewport: Rect,
    focused: Option<usize>,
    clicks: Vec<Point>,
    scrolled: Vec<usize>,
}

struct SceneInner {
    state: RwLock<SceneState>,
    epoch: watch::Sender<u64>,
    next_id: AtomicUsize,
}

impl SceneInner {
    fn bump_epoch(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }
}

/// A mutable in-memory visual tree.
#[derive(Clone)]
pub struct SceneGraph {
    inner: Arc<SceneInner>,
}

impl SceneGraph {
    pub fn new(viewport: Rect) -> Self {
        let root_id = 0;
        let root = NodeData {
            spec: NodeSpec {
                role: "document".to_string(),
                bounds: viewport,
                ..NodeSpec::default()
            },
            parent: None,
            children: Vec::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        let (epoch, _) = watch::channel(0);
        Self {
            inner: Arc::new(SceneInner {
                state: RwLock::new(SceneState {
                    nodes,
                    root: root_id,
                    overlay: None,
                    viewport,
                    focused: None,
                    clicks: Vec::new(),
                    scrolled: Vec::new(),
                }),
                epoch,
                next_id: AtomicUsize::new(1),
            }),
        }
    }

    fn handle(&self, id: usize) -> UiElement {
        UiElement::new(Arc::new(SceneNode {
            scene: self.inner.clone(),
            id,
        }))
    }

    /// Insert a node under `parent` (the root when `None`).
    pub fn add_node(&self, parent: Option<&UiElement>, spec: NodeSpec) -> UiElement {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.write().unwrap();
            let parent_id = parent.map(|p| p.object_id()).unwrap_or(state.root);
            state.nodes.insert(
                id,
                NodeData {
                    spec,
                    parent: Some(parent_id),
                    children: Vec::new(),
                },
            );
            if let Some(parent) = state.nodes.get_mut(&parent_id) {
                parent.children.push(id);
            }
        }
        self.inner.bump_epoch();
        self.handle(id)
    }

    /// Remove a node and its whole subtree.
    pub fn remove_node(&self, element: &UiElement) {
        let id = element.object_id();
        {
            let mut state = self.inner.state.write().unwrap();
            let doomed = subtree_ids(&state, id);
            if let Some(parent_id) = state.nodes.get(&id).and_then(|n| n.parent) {
                if let Some(parent) = state.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| *c != id);
                }
            }
            for doomed_id in doomed {
                state.nodes.remove(&doomed_id);
                if state.overlay == Some(doomed_id) {
                    state.overlay = None;
                }
                if state.focused == Some(doomed_id) {
                    state.focused = None;
                }
            }
        }
        self.inner.bump_epoch();
    }

    /// Simulate the host's layout system blowing the overlay layer away.
    pub fn detach_overlay(&self) {
        let overlay = {
            let state = self.inner.state.read().unwrap();
            state.overlay
        };
        if let Some(id) = overlay {
            debug!("scene: detaching overlay node {id}");
            self.remove_node(&self.handle(id));
        }
    }

    pub fn set_hidden(&self, element: &UiElement, hidden: bool) {
        let mut state = self.inner.state.write().unwrap();
        if let Some(node) = state.nodes.get_mut(&element.object_id()) {
            node.spec.hidden = hidden;
        }
    }

    pub fn set_text(&self, element: &UiElement, text: impl Into<String>) {
        let mut state = self.inner.state.write().unwrap();
        if let Some(node) = state.nodes.get_mut(&element.object_id()) {
            node.spec.text = text.into();
        }
    }

    pub fn set_bounds(&self, element: &UiElement, bounds: Rect) {
        let mut state = self.inner.state.write().unwrap();
        if let Some(node) = state.nodes.get_mut(&element.object_id()) {
            node.spec.bounds = bounds;
        }
    }

    /// Points that received a synthetic click, in dispatch order.
    pub fn clicks(&self) -> Vec<Point> {
        self.inner.state.read().unwrap().clicks.clone()
    }

    pub fn focused(&self) -> Option<UiElement> {
        let id = self.inner.state.read().unwrap().focused?;
        Some(self.handle(id))
    }

    /// Object ids passed to `scroll_into_view`, in call order.
    pub fn scroll_log(&self) -> Vec<usize> {
        self.inner.state.read().unwrap().scrolled.clone()
    }
}

fn subtree_ids(state: &SceneState, id: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
        if let Some(node) = state.nodes.get(&id) {
            stack.extend(node.children.iter().copied());
        }
        out.push(id);
    }
    out
}

fn subtree_text(state: &SceneState, id: usize) -> String {
    let mut pieces = Vec::new();
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
        if let Some(node) = state.nodes.get(&id) {
            if !node.spec.text.is_empty() {
                pieces.push(node.spec.text.clone());
            }
            // preserve document order under the LIFO stack
            stack.extend(node.children.iter().rev().copied());
        }
    }
    pieces.join(" ")
}

fn style_visible(state: &SceneState, id: usize) -> bool {
    let mut cursor = Some(id);
    while let Some(id) = cursor {
        match state.nodes.get(&id) {
            Some(node) => {
                if node.spec.hidden || node.spec.opacity <= 0.0 {
                    return false;
                }
                cursor = node.parent;
            }
            None => return false,
        }
    }
    true
}

impl UiInspector for SceneGraph {
    fn root(&self) -> UiElement {
        let root = self.inner.state.read().unwrap().root;
        self.handle(root)
    }

    fn viewport(&self) -> Rect {
        self.inner.state.read().unwrap().viewport
    }

    fn overlay_root(&self) -> Option<UiElement> {
        let id = self.inner.state.read().unwrap().overlay?;
        Some(self.handle(id))
    }

    fn mount_overlay(&self) -> UiElement {
        if let Some(existing) = self.overlay_root() {
            return existing;
        }
        let viewport = self.viewport();
        let element = self.add_node(
            None,
            NodeSpec {
                role: "div".to_string(),
                classes: vec![OVERLAY_CLASS.to_string()],
                bounds: viewport,
                ..NodeSpec::default()
            },
        );
        self.inner.state.write().unwrap().overlay = Some(element.object_id());
        debug!(id = element.object_id(), "scene: overlay mounted");
        element
    }

    fn overlay_attached(&self) -> bool {
        let state = self.inner.state.read().unwrap();
        match state.overlay {
            Some(id) => state.nodes.contains_key(&id),
            None => false,
        }
    }

    fn element_from_point(&self, point: Point) -> Option<UiElement> {
        let state = self.inner.state.read().unwrap();
        let mut best = None;
        let mut stack = vec![state.root];
        while let Some(id) = stack.pop() {
            if state.overlay == Some(id) {
                continue;
            }
            let Some(node) = state.nodes.get(&id) else {
                continue;
            };
            if style_visible(&state, id) && node.spec.bounds.contains(point) {
                // later-in-document and deeper nodes win
                best = Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        drop(state);
        best.map(|id| self.handle(id))
    }

    fn find_by_stable_id(&self, id: &str) -> Vec<UiElement> {
        let state = self.inner.state.read().unwrap();
        let mut out = Vec::new();
        let mut stack = vec![state.root];
        while let Some(node_id) = stack.pop() {
            let Some(node) = state.nodes.get(&node_id) else {
                continue;
            };
            if node.spec.stable_id.as_deref() == Some(id) {
                out.push(node_id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        drop(state);
        out.into_iter().map(|id| self.handle(id)).collect()
    }

    fn scroll_into_view(&self, element: &UiElement) {
        let mut state = self.inner.state.write().unwrap();
        let viewport = state.viewport;
        state.scrolled.push(element.object_id());
        if let Some(node) = state.nodes.get_mut(&element.object_id()) {
            let b = &mut node.spec.bounds;
            b.x = b.x.clamp(viewport.x, (viewport.right() - b.width).max(viewport.x));
            b.y = b.y.clamp(viewport.y, (viewport.bottom() - b.height).max(viewport.y));
        }
    }

    fn focus(&self, element: &UiElement) {
        self.inner.state.write().unwrap().focused = Some(element.object_id());
    }

    fn structure_epoch(&self) -> watch::Receiver<u64> {
        self.inner.epoch.subscribe()
    }
}

impl Dispatcher for SceneGraph {
    fn click(&self, point: Point) {
        debug!(x = point.x, y = point.y, "scene: synthetic click");
        self.inner.state.write().unwrap().clicks.push(point);
    }
}

struct SceneNode {
    scene: Arc<SceneInner>,
    id: usize,
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.scene.state.read().unwrap();
        let role = state
            .nodes
            .get(&self.id)
            .map(|n| n.spec.role.clone())
            .unwrap_or_else(|| "<detached>".to_string());
        write!(f, "SceneNode#{} ({role})", self.id)
    }
}

impl UiNodeImpl for SceneNode {
    fn object_id(&self) -> usize {
        self.id
    }

    fn stable_id(&self) -> Option<String> {
        let state = self.scene.state.read().unwrap();
        state.nodes.get(&self.id)?.spec.stable_id.clone()
    }

    fn role(&self) -> String {
        let state = self.scene.state.read().unwrap();
        state
            .nodes
            .get(&self.id)
            .map(|n| n.spec.role.clone())
            .unwrap_or_default()
    }

    fn aria_role(&self) -> Option<String> {
        let state = self.scene.state.read().unwrap();
        state.nodes.get(&self.id)?.spec.aria_role.clone()
    }

    fn class_names(&self) -> Vec<String> {
        let state = self.scene.state.read().unwrap();
        state
            .nodes
            .get(&self.id)
            .map(|n| n.spec.classes.clone())
            .unwrap_or_default()
    }

    fn text(&self) -> String {
        let state = self.scene.state.read().unwrap();
        subtree_text(&state, self.id)
    }

    fn bounds(&self) -> Rect {
        let state = self.scene.state.read().unwrap();
        state
            .nodes
            .get(&self.id)
            .map(|n| n.spec.bounds)
            .unwrap_or_default()
    }

    fn is_style_visible(&self) -> bool {
        let state = self.scene.state.read().unwrap();
        style_visible(&state, self.id)
    }

    fn is_disabled(&self) -> bool {
        let state = self.scene.state.read().unwrap();
        state
            .nodes
            .get(&self.id)
            .map(|n| n.spec.disabled || n.spec.aria_disabled)
            .unwrap_or(false)
    }

    fn parent(&self) -> Option<UiElement> {
        let parent = {
            let state = self.scene.state.read().unwrap();
            state.nodes.get(&self.id)?.parent?
        };
        Some(UiElement::new(Arc::new(SceneNode {
            scene: self.scene.clone(),
            id: parent,
        })))
    }

    fn children(&self) -> Vec<UiElement> {
        let child_ids = {
            let state = self.scene.state.read().unwrap();
            state
                .nodes
                .get(&self.id)
                .map(|n| n.children.clone())
                .unwrap_or_default()
        };
        child_ids
            .into_iter()
            .map(|id| {
                UiElement::new(Arc::new(SceneNode {
                    scene: self.scene.clone(),
                    id,
                }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneGraph {
        SceneGraph::new(Rect::new(0.0, 0.0, 1024.0, 768.0))
    }

    #[test]
    fn rendered_text_includes_descendants_in_order() {
        let s = scene();
        let panel = s.add_node(
            None,
            NodeSpec {
                text: "Case".to_string(),
                ..NodeSpec::default()
            },
        );
        s.add_node(
            Some(&panel),
            NodeSpec {
                text: "tracker".to_string(),
                ..NodeSpec::default()
            },
        );
        s.add_node(
            Some(&panel),
            NodeSpec {
                text: "panel".to_string(),
                ..NodeSpec::default()
            },
        );
        assert_eq!(panel.text(), "Case tracker panel");
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let s = scene();
        let wrap = s.add_node(
            None,
            NodeSpec {
                hidden: true,
                ..NodeSpec::default()
            },
        );
        let inner = s.add_node(Some(&wrap), NodeSpec::default());
        assert!(!inner.is_style_visible());
        s.set_hidden(&wrap, false);
        assert!(inner.is_style_visible());
    }

    #[test]
    fn element_from_point_prefers_deepest_hit() {
        let s = scene();
        let card = s.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(0.0, 0.0, 200.0, 200.0),
                ..NodeSpec::default()
            },
        );
        let button = s.add_node(
            Some(&card),
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(50.0, 50.0, 100.0, 40.0),
                ..NodeSpec::default()
            },
        );
        let hit = s.element_from_point(Point::new(60.0, 60.0)).unwrap();
        assert_eq!(hit, button);
        let hit = s.element_from_point(Point::new(10.0, 150.0)).unwrap();
        assert_eq!(hit, card);
    }

    #[test]
    fn element_from_point_never_hits_the_overlay() {
        let s = scene();
        let overlay = s.mount_overlay();
        s.add_node(
            Some(&overlay),
            NodeSpec {
                bounds: Rect::new(0.0, 0.0, 1024.0, 768.0),
                ..NodeSpec::default()
            },
        );
        assert_eq!(s.element_from_point(Point::new(5.0, 5.0)), None);
    }

    #[test]
    fn detach_and_remount_bumps_the_epoch() {
        let s = scene();
        let rx = s.structure_epoch();
        s.mount_overlay();
        assert!(s.overlay_attached());
        let after_mount = *rx.borrow();
        s.detach_overlay();
        assert!(!s.overlay_attached());
        assert!(*rx.borrow() > after_mount);
        s.mount_overlay();
        assert!(s.overlay_attached());
    }
}
