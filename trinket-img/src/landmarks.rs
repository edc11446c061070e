use anyhow::Result;
use serde::Deserialize;
use std::ops::Index;

/// One tracked face point. `x` and `y` are normalized to the frame, `z` is
/// relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Landmark {
        Landmark { x, y, z }
    }
}

/// Ordered landmarks of one face. Index positions follow the detector's mesh
/// topology, so two sets from the same session line up point for point.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Landmark>);

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Landmark> {
        self.0.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.0.iter()
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, idx: usize) -> &Landmark {
        &self.0[idx]
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self(points)
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LandmarkSet {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single detector result. No faces means nothing new was learned this
/// frame.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Detection {
    #[serde(default, alias = "multiFaceLandmarks")]
    pub faces: Vec<LandmarkSet>,
}

impl Detection {
    pub fn none() -> Self {
        Self { faces: Vec::new() }
    }

    pub fn single(face: LandmarkSet) -> Self {
        Self { faces: vec![face] }
    }

    /// Only one subject is tracked; extra faces are ignored.
    pub fn primary(self) -> Option<LandmarkSet> {
        self.faces.into_iter().next()
    }

    pub fn from_json(line: &str) -> Result<Detection> {
        Ok(serde_json::from_str(line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_line() -> Result<()> {
        let d = Detection::from_json(
            r#"{"faces": [[{"x": 0.1, "y": 0.2, "z": -0.01}, {"x": 0.5, "y": 0.5}]]}"#,
        )?;
        assert_eq!(d.faces.len(), 1);
        let face = d.primary().unwrap();
        assert_eq!(face.len(), 2);
        assert_eq!(face[0], Landmark::new(0.1, 0.2, -0.01));
        assert_eq!(face[1].z, 0.);
        Ok(())
    }

    #[test]
    fn accepts_mediapipe_field_name() -> Result<()> {
        let d = Detection::from_json(
            r#"{"multiFaceLandmarks": [[{"x": 0.3, "y": 0.4, "z": 0.0}], [{"x": 0.9, "y": 0.9, "z": 0.0}]]}"#,
        )?;
        let face = d.primary().unwrap();
        assert_eq!(face.len(), 1);
        assert_eq!(face[0].x, 0.3);
        Ok(())
    }

    #[test]
    fn empty_result_has_no_face() -> Result<()> {
        assert_eq!(Detection::from_json(r#"{"faces": []}"#)?.primary(), None);
        assert_eq!(Detection::from_json("{}")?.primary(), None);
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(Detection::from_json("not json").is_err());
    }
}
