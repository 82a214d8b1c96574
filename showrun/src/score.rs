//! Pure visibility and match-quality heuristics used by target resolution.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::element::UiElement;
use crate::inspect::UiInspector;

/// Margin added around the viewport before an element is judged off-screen.
pub const VIEWPORT_MARGIN: f64 = 8.0;

static ACTIONABLE_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["button", "a", "input", "select", "textarea", "summary", "option"]
        .into_iter()
        .collect()
});

static ACTIONABLE_ARIA_ROLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "button", "link", "menuitem", "tab", "option", "checkbox", "radio", "switch",
    ]
    .into_iter()
    .collect()
});

/// Whether the element is usable as a target at all.
///
/// False when the element sits inside the engine's own overlay layer (the
/// engine must never target its own UI), when styles hide it, when its box
/// has no area, or when it lies entirely outside the viewport grown by
/// [`VIEWPORT_MARGIN`].
pub fn is_visible(element: &UiElement, inspector: &dyn UiInspector) -> bool {
    if let Some(overlay) = inspector.overlay_root() {
        if element.is_within(&overlay) {
            return false;
        }
    }
    if !element.is_style_visible() {
        return false;
    }
    let bounds = element.bounds();
    if bounds.area() <= 0.0 {
        return false;
    }
    inspector.viewport().grown(VIEWPORT_MARGIN).intersects(&bounds)
}

pub fn is_disabled(element: &UiElement) -> bool {
    element.is_disabled()
}

pub fn is_actionable_tag(role: &str) -> bool {
    ACTIONABLE_TAGS.contains(role.to_ascii_lowercase().as_str())
}

pub fn is_actionable_aria(role: &str) -> bool {
    ACTIONABLE_ARIA_ROLES.contains(role.to_ascii_lowercase().as_str())
}

/// Whether the element is an interaction surface in its own right.
pub fn is_actionable(element: &UiElement) -> bool {
    if is_actionable_tag(&element.role()) {
        return true;
    }
    element
        .aria_role()
        .map(|role| is_actionable_aria(&role))
        .unwrap_or(false)
}

/// Additive match-quality heuristic.
///
/// Selector matches are trusted on their own; free-text matches get a
/// single extra point so that, all else equal, a structural hit wins.
pub fn score(element: &UiElement, inspector: &dyn UiInspector, matched_by_text: bool) -> i32 {
    let mut score = 0;
    if is_visible(element, inspector) {
        score += 6;
    }
    if !is_disabled(element) {
        score += 3;
    }
    if is_actionable_tag(&element.role()) {
        score += 3;
    }
    if element
        .aria_role()
        .map(|role| is_actionable_aria(&role))
        .unwrap_or(false)
    {
        score += 2;
    }
    if matched_by_text {
        score += 1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeSpec, SceneGraph};
    use crate::types::Rect;

    fn scene() -> SceneGraph {
        SceneGraph::new(Rect::new(0.0, 0.0, 800.0, 600.0))
    }

    #[test]
    fn offscreen_element_is_not_visible() {
        let s = scene();
        let onscreen = s.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(10.0, 10.0, 50.0, 20.0),
                ..NodeSpec::default()
            },
        );
        let offscreen = s.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(2000.0, 10.0, 50.0, 20.0),
                ..NodeSpec::default()
            },
        );
        assert!(is_visible(&onscreen, &s));
        assert!(!is_visible(&offscreen, &s));
    }

    #[test]
    fn viewport_margin_keeps_edge_elements_visible() {
        let s = scene();
        // starts 5 units past the right edge, within the 8-unit margin
        let edge = s.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(803.0, 10.0, 50.0, 20.0),
                ..NodeSpec::default()
            },
        );
        assert!(is_visible(&edge, &s));
    }

    #[test]
    fn overlay_content_is_never_visible_to_resolution() {
        let s = scene();
        let overlay = s.mount_overlay();
        let tooltip = s.add_node(
            Some(&overlay),
            NodeSpec {
                bounds: Rect::new(10.0, 10.0, 50.0, 20.0),
                text: "Create case".to_string(),
                ..NodeSpec::default()
            },
        );
        assert!(!is_visible(&tooltip, &s));
    }

    #[test]
    fn zero_area_element_is_not_visible() {
        let s = scene();
        let empty = s.add_node(
            None,
            NodeSpec {
                bounds: Rect::new(10.0, 10.0, 0.0, 40.0),
                ..NodeSpec::default()
            },
        );
        assert!(!is_visible(&empty, &s));
    }

    #[test]
    fn visible_enabled_button_outranks_hidden_one() {
        let s = scene();
        let shown = s.add_node(
            None,
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(10.0, 10.0, 80.0, 24.0),
                ..NodeSpec::default()
            },
        );
        let hidden = s.add_node(
            None,
            NodeSpec {
                role: "button".to_string(),
                bounds: Rect::new(10.0, 50.0, 80.0, 24.0),
                hidden: true,
                ..NodeSpec::default()
            },
        );
        assert!(score(&shown, &s, true) > score(&hidden, &s, true));
    }
}
