//! Staggered multi-item upload progress animation.
//!
//! Purely cosmetic and short-lived: this routine owns no external
//! resources, cannot fail, and is deliberately not cancellable.

use crate::feedback::{FeedbackController, UploadItem};

/// Shared counter increment per tick, in percent points.
pub const UPLOAD_STEP: u32 = 5;
/// How far each successive item leads the shared counter.
pub const UPLOAD_STAGGER: u32 = 8;

impl FeedbackController {
    /// Animate the upload panel for the named items: a shared counter
    /// runs 0..=100, each item clamped to `min(100, counter + index * 8)`
    /// so completion staggers across the list. Holds briefly at the end,
    /// then clears the panel.
    pub async fn simulate_uploads(&self, names: &[String]) {
        {
            let mut overlay = self.overlay.lock().unwrap();
            overlay.uploads_visible = true;
            overlay.uploads = names
                .iter()
                .map(|name| UploadItem {
                    name: name.clone(),
                    percent: 0,
                })
                .collect();
        }

        let mut counter: u32 = 0;
        loop {
            {
                let mut overlay = self.overlay.lock().unwrap();
                for (index, item) in overlay.uploads.iter_mut().enumerate() {
                    item.percent = (counter + index as u32 * UPLOAD_STAGGER).min(100) as u8;
                }
            }
            if counter >= 100 {
                break;
            }
            tokio::time::sleep(self.timing.upload_tick).await;
            counter += UPLOAD_STEP;
        }

        tokio::time::sleep(self.timing.upload_hold).await;
        let mut overlay = self.overlay.lock().unwrap();
        overlay.uploads_visible = false;
        overlay.uploads.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::feedback::{FeedbackController, FeedbackTiming};
    use crate::scene::SceneGraph;
    use crate::types::Rect;

    fn controller() -> Arc<FeedbackController> {
        let scene = SceneGraph::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        Arc::new(FeedbackController::new(
            Arc::new(scene.clone()),
            Arc::new(scene),
            FeedbackTiming::default().scaled(0.05),
        ))
    }

    #[tokio::test]
    async fn all_items_reach_exactly_one_hundred_and_stay_in_bounds() {
        let controller = controller();
        let names = vec![
            "passport.pdf".to_string(),
            "statement.pdf".to_string(),
            "contract.pdf".to_string(),
        ];

        let sampler = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let mut max_seen = vec![0u8; 3];
                loop {
                    let overlay = controller.overlay();
                    if !overlay.uploads.is_empty() {
                        for (i, item) in overlay.uploads.iter().enumerate() {
                            assert!(item.percent <= 100);
                            max_seen[i] = max_seen[i].max(item.percent);
                        }
                        if overlay.uploads.iter().all(|i| i.percent == 100) {
                            return max_seen;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };

        controller.simulate_uploads(&names).await;
        let max_seen = sampler.await.unwrap();
        assert_eq!(max_seen, vec![100, 100, 100]);

        // the panel clears once the hold elapses
        let overlay = controller.overlay();
        assert!(!overlay.uploads_visible);
        assert!(overlay.uploads.is_empty());
    }

    #[tokio::test]
    async fn later_items_lead_the_shared_counter() {
        let controller = controller();
        let names = vec!["a".to_string(), "b".to_string()];

        let observer = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                loop {
                    let overlay = controller.overlay();
                    if let [first, second] = overlay.uploads.as_slice() {
                        if first.percent > 0 && first.percent < 100 {
                            return (first.percent, second.percent);
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        controller.simulate_uploads(&names).await;
        let (first, second) = observer.await.unwrap();
        assert_eq!(second, (first + super::UPLOAD_STAGGER as u8).min(100));
    }
}
