
use std::sync::Arc;

use crate::bus::SignalBus;
use crate::scene::{NodeSpec, SceneGraph};
use crate::sync::MemoryCaseStore;
use crate::types::Rect;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// The demo application's surface: a case board, a tracker toggle, the
/// case actions, and an analytics panel.
pub fn demo_scene() -> SceneGraph {
    let scene = SceneGraph::new(Rect::new(0.0, 0.0, 1280.0, 800.0));
    scene.add_node(
        None,
        NodeSpec {
            stable_id: Some("case-board".to_string()),
            classes: vec!["board".to_string()],
            text: "Open cases".to_string(),
            bounds: Rect::new(40.0, 80.0, 600.0, 500.0),
            ..NodeSpec::default()
        },
    );
    scene.add_node(
        None,
        NodeSpec {
            role: "button".to_string(),
            stable_id: Some("tracker-toggle".to_string()),
            text: "Tracker".to_string(),
            bounds: Rect::new(680.0, 80.0, 120.0, 36.0),
            ..NodeSpec::default()
        },
    );
    scene.add_node(
        None,
        NodeSpec {
            role: "button".to_string(),
            stable_id: Some("new-case".to_string()),
            text: "New case".to_string(),
            bounds: Rect::new(680.0, 140.0, 120.0, 36.0),
            ..NodeSpec::default()
        },
    );
    scene.add_node(
        None,
        NodeSpec {
            role: "button".to_string(),
            stable_id: Some("upload-docs".to_string()),
            text: "Upload documents".to_string(),
            bounds: Rect::new(680.0, 200.0, 160.0, 36.0),
            ..NodeSpec::default()
        },
    );
    scene.add_node(
        None,
        NodeSpec {
            stable_id: Some("ops-panel".to_string()),
            text: "Analytics".to_string(),
            bounds: Rect::new(880.0, 80.0, 360.0, 500.0),
            ..NodeSpec::default()
        },
    );
    scene
}

pub fn stage() -> (SceneGraph, SignalBus, Arc<MemoryCaseStore>) {
    init_tracing();
    (demo_scene(), SignalBus::default(), Arc::new(MemoryCaseStore::default()))
}
