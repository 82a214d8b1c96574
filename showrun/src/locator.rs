use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::element::UiElement;
use crate::inspect::UiInspector;
use crate::score;
use crate::selector::Selector;

// Default polling parameters if none are specified by the caller
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(1200);
pub const DEFAULT_RESOLVE_POLL: Duration = Duration::from_millis(80);

/// What a step intends to do with its target, which changes who may match
/// a free-text phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// Any element may anchor a focus step.
    Focus,
    /// Only actionable elements (or their closest actionable ancestor)
    /// may receive a click.
    Click,
}

/// Search criteria for one step: structural selectors tried first, then
/// free-text phrases over rendered text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSpec {
    pub selectors: Vec<String>,
    pub texts: Vec<String>,
}

impl TargetSpec {
    pub fn new<S: Into<String>>(
        selectors: impl IntoIterator<Item = S>,
        texts: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && self.texts.is_empty()
    }
}

/// A scored resolution hit. Transient: recomputed on every attempt.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub element: UiElement,
    pub matched_by_text: bool,
    pub score: i32,
}

/// Fold text for phrase matching: diacritics stripped, whitespace
/// collapsed, case-folded. Idempotent.
pub fn normalize(text: &str) -> String {
    let folded: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    folded
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Finds the best on-screen match for a step's search criteria.
#[derive(Clone)]
pub struct TargetResolver {
    inspector: Arc<dyn UiInspector>,
}

impl TargetResolver {
    pub fn new(inspector: Arc<dyn UiInspector>) -> Self {
        Self { inspector }
    }

    /// One resolution attempt over the current tree. `None` is a
    /// legitimate outcome, not an error; callers degrade to their
    /// not-found branch.
    #[instrument(level = "debug", skip(self, spec))]
    pub fn resolve(&self, spec: &TargetSpec, kind: TargetKind) -> Option<Candidate> {
        let mut candidates: Vec<(UiElement, bool)> = Vec::new();

        for raw in &spec.selectors {
            match Selector::from(raw.as_str()) {
                Selector::Id(id) => {
                    candidates.extend(
                        self.inspector
                            .find_by_stable_id(&id)
                            .into_iter()
                            .map(|el| (el, false)),
                    );
                }
                Selector::Role { role, name } => {
                    let wanted = role.to_ascii_lowercase();
                    let name = name.map(|n| normalize(&n));
                    for el in self.inspector.root().descendants() {
                        let role_hit = el.role().eq_ignore_ascii_case(&wanted)
                            || el
                                .aria_role()
                                .map(|r| r.eq_ignore_ascii_case(&wanted))
                                .unwrap_or(false);
                        if !role_hit {
                            continue;
                        }
                        if let Some(name) = &name {
                            if !normalize(&el.text()).contains(name.as_str()) {
                                continue;
                            }
                        }
                        candidates.push((el, false));
                    }
                }
                Selector::ClassName(class) => {
                    for el in self.inspector.root().descendants() {
                        if el.class_names().iter().any(|c| c == &class) {
                            candidates.push((el, false));
                        }
                    }
                }
                Selector::Invalid(reason) => {
                    debug!(selector = raw.as_str(), reason = %reason, "skipping invalid selector");
                }
            }
        }

        let needles: Vec<String> = spec
            .texts
            .iter()
            .map(|t| normalize(t))
            .filter(|t| !t.is_empty())
            .collect();
        if !needles.is_empty() {
            for el in self.inspector.root().descendants() {
                if !score::is_visible(&el, self.inspector.as_ref()) {
                    continue;
                }
                let hay = normalize(&el.text());
                if hay.is_empty() {
                    continue;
                }
                let Some(needle) = needles.iter().find(|n| hay.contains(n.as_str())) else {
                    continue;
                };
                // prefer the innermost element carrying the phrase; the
                // ancestor chain repeats every descendant's text
                if el
                    .children()
                    .iter()
                    .any(|c| normalize(&c.text()).contains(needle.as_str()))
                {
                    continue;
                }
                match kind {
                    TargetKind::Focus => candidates.push((el, true)),
                    TargetKind::Click => {
                        if let Some(actionable) = closest_actionable(&el) {
                            candidates.push((actionable, true));
                        }
                    }
                }
            }
        }

        let overlay = self.inspector.overlay_root();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut best: Option<Candidate> = None;
        for (element, matched_by_text) in candidates {
            if !seen.insert(element.object_id()) {
                continue;
            }
            // never target the engine's own UI, however it was matched
            if let Some(overlay) = &overlay {
                if element.is_within(overlay) {
                    continue;
                }
            }
            let score = score::score(&element, self.inspector.as_ref(), matched_by_text);
            // strictly greater: ties go to the first-discovered candidate
            if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                best = Some(Candidate {
                    element,
                    matched_by_text,
                    score,
                });
            }
        }
        if let Some(c) = &best {
            debug!(
                score = c.score,
                by_text = c.matched_by_text,
                "target resolved"
            );
        }
        best
    }

    /// Re-invoke [`resolve`](Self::resolve) at the poll interval until a
    /// hit, the timeout elapses, or the run is cancelled, yielding control
    /// between polls.
    pub async fn resolve_with_timeout(
        &self,
        spec: &TargetSpec,
        kind: TargetKind,
        timeout: Duration,
        poll: Duration,
        cancel: &CancellationToken,
    ) -> Option<Candidate> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(candidate) = self.resolve(spec, kind) {
                return Some(candidate);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(?timeout, "target resolution timed out");
                return None;
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}

/// The element itself if actionable, otherwise its nearest actionable
/// ancestor.
fn closest_actionable(element: &UiElement) -> Option<UiElement> {
    let mut cursor = Some(element.clone());
    while let Some(el) = cursor {
        if score::is_actionable(&el) {
            return Some(el);
        }
        cursor = el.parent();
    }
    None
}
