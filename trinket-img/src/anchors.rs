use crate::config::{AnchorConfig, AnchorSpec};
use crate::landmarks::LandmarkSet;
use crate::shapes::point::PointF32;
use anyhow::{Result, anyhow};

/// Pixel positions accessories hang from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub left_ear: PointF32,
    pub right_ear: PointF32,
    pub neck: PointF32,
}

impl Anchors {
    pub fn ears(&self) -> [PointF32; 2] {
        [self.left_ear, self.right_ear]
    }
}

pub fn resolve(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    config: &AnchorConfig,
) -> Result<Anchors> {
    Ok(Anchors {
        left_ear: anchor_at(landmarks, width, height, &config.left_ear)?,
        right_ear: anchor_at(landmarks, width, height, &config.right_ear)?,
        neck: anchor_at(landmarks, width, height, &config.neck)?,
    })
}

fn anchor_at(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    spec: &AnchorSpec,
) -> Result<PointF32> {
    let l = landmarks.get(spec.index).ok_or_else(|| {
        anyhow!(
            "Landmark {} missing from set of {}",
            spec.index,
            landmarks.len()
        )
    })?;

    let (dx, dy) = spec.offset;
    Ok(PointF32::new(l.x * width as f32, l.y * height as f32).translate(dx, dy))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    /// A full size mesh with only the anchor landmarks placed.
    pub(crate) fn face_mesh(
        left_ear: (f32, f32),
        right_ear: (f32, f32),
        neck: (f32, f32),
    ) -> LandmarkSet {
        let config = AnchorConfig::default();
        let mut points = vec![Landmark::default(); 468];
        points[config.left_ear.index] = Landmark::new(left_ear.0, left_ear.1, 0.);
        points[config.right_ear.index] = Landmark::new(right_ear.0, right_ear.1, 0.);
        points[config.neck.index] = Landmark::new(neck.0, neck.1, 0.);
        points.into()
    }

    pub(crate) fn assert_near(p: PointF32, (x, y): (f32, f32)) {
        assert!(
            (p.x - x).abs() < 1e-3 && (p.y - y).abs() < 1e-3,
            "{p:?} != ({x}, {y})"
        );
    }

    #[test]
    fn scales_and_offsets() -> Result<()> {
        let mesh = face_mesh((0.2, 0.3), (0.8, 0.3), (0.5, 0.9));
        let anchors = resolve(&mesh, 1280, 720, &AnchorConfig::default())?;

        assert_near(anchors.left_ear, (250., 200.));
        assert_near(anchors.right_ear, (1030., 200.));
        assert_near(anchors.neck, (632., 658.));
        Ok(())
    }

    #[test]
    fn deterministic() -> Result<()> {
        let mesh = face_mesh((0.21, 0.33), (0.77, 0.31), (0.49, 0.88));
        let config = AnchorConfig::default();
        let a = resolve(&mesh, 640, 480, &config)?;
        let b = resolve(&mesh, 640, 480, &config)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn short_set_is_an_error() {
        let mesh: LandmarkSet = vec![Landmark::default(); 10].into();
        assert!(resolve(&mesh, 640, 480, &AnchorConfig::default()).is_err());
    }
}
