use std::fmt::Debug;
use std::sync::Arc;

use crate::types::Rect;

/// The backend contract every element handle delegates to.
///
/// Implementations are cheap, transient views into the host's visual tree;
/// they are recomputed on every resolution attempt because the tree mutates
/// continuously, and must never be cached across steps.
pub trait UiNodeImpl: Send + Sync + Debug {
    /// Process-unique identity of the underlying node.
    fn object_id(&self) -> usize;

    /// The stable automation id attribute, when the host assigned one.
    fn stable_id(&self) -> Option<String>;

    /// Tag-level role, e.g. `button`, `input`, `div`.
    fn role(&self) -> String;

    /// Explicit ARIA role, when present.
    fn aria_role(&self) -> Option<String>;

    fn class_names(&self) -> Vec<String>;

    /// Rendered text of the node including its descendants.
    fn text(&self) -> String;

    /// Bounding box in document coordinates.
    fn bounds(&self) -> Rect;

    /// Style-level visibility: false when the node or any ancestor is
    /// hidden or fully transparent. Geometry is judged separately.
    fn is_style_visible(&self) -> bool;

    /// Disabled attribute or ARIA-disabled.
    fn is_disabled(&self) -> bool;

    fn parent(&self) -> Option<UiElement>;

    fn children(&self) -> Vec<UiElement>;
}

/// A handle to an on-screen element discovered during resolution.
#[derive(Clone, Debug)]
pub struct UiElement {
    inner: Arc<dyn UiNodeImpl>,
}

impl UiElement {
    pub fn new(inner: Arc<dyn UiNodeImpl>) -> Self {
        Self { inner }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    pub fn stable_id(&self) -> Option<String> {
        self.inner.stable_id()
    }

    pub fn role(&self) -> String {
        self.inner.role()
    }

    pub fn aria_role(&self) -> Option<String> {
        self.inner.aria_role()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.inner.class_names()
    }

    pub fn text(&self) -> String {
        self.inner.text()
    }

    pub fn bounds(&self) -> Rect {
        self.inner.bounds()
    }

    pub fn is_style_visible(&self) -> bool {
        self.inner.is_style_visible()
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.is_disabled()
    }

    pub fn parent(&self) -> Option<UiElement> {
        self.inner.parent()
    }

    pub fn children(&self) -> Vec<UiElement> {
        self.inner.children()
    }

    /// Whether `ancestor` appears on this element's parent chain
    /// (inclusive of the element itself).
    pub fn is_within(&self, ancestor: &UiElement) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(el) = cursor {
            if el == *ancestor {
                return true;
            }
            cursor = el.parent();
        }
        false
    }

    /// All descendants in document (pre-)order, not including self.
    pub fn descendants(&self) -> Vec<UiElement> {
        let mut out = Vec::new();
        let mut stack: Vec<UiElement> = self.children();
        stack.reverse();
        while let Some(el) = stack.pop() {
            let mut kids = el.children();
            kids.reverse();
            out.push(el);
            stack.extend(kids);
        }
        out
    }
}

impl PartialEq for UiElement {
    fn eq(&self, other: &Self) -> bool {
        self.object_id() == other.object_id()
    }
}

impl Eq for UiElement {}
