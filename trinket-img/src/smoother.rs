use crate::landmarks::{Detection, Landmark, LandmarkSet};
use tracing::trace;

/// Exponential moving average of `prev` and `incoming`, weighting history by
/// `alpha`. With no history the incoming set is taken as is.
///
/// Panics if the two sets differ in length: the detector topology is fixed for
/// a session, so a mismatch is a bug upstream.
pub fn smooth(prev: Option<&LandmarkSet>, incoming: LandmarkSet, alpha: f32) -> LandmarkSet {
    let prev = match prev {
        Some(prev) => prev,
        None => return incoming,
    };

    assert_eq!(
        prev.len(),
        incoming.len(),
        "landmark set size changed mid-session"
    );

    let beta = 1. - alpha;
    prev.iter()
        .zip(incoming.iter())
        .map(|(p, n)| Landmark {
            x: p.x * alpha + n.x * beta,
            y: p.y * alpha + n.y * beta,
            z: p.z * alpha + n.z * beta,
        })
        .collect()
}

/// Holds the stabilized landmark set between detections.
#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f32,
    state: Option<LandmarkSet>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, state: None }
    }

    /// Folds the primary face of `detection` into the state. Frames without a
    /// face leave the last stabilized set in place.
    pub fn apply(&mut self, detection: Detection) -> Option<&LandmarkSet> {
        match detection.primary() {
            Some(incoming) => {
                let next = smooth(self.state.as_ref(), incoming, self.alpha);
                self.state = Some(next);
            }
            None => trace!("No face in detection, keeping stabilized landmarks"),
        }

        self.state.as_ref()
    }

    pub fn state(&self) -> Option<&LandmarkSet> {
        self.state.as_ref()
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}
