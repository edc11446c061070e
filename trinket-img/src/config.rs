use anyhow::{Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// How the compositor treats a slot whose image is still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Any pending slot blanks the whole overlay.
    #[default]
    AllOrNothing,
    /// Only the pending slot is skipped.
    PerSlot,
}

/// A landmark index plus the pixel offset applied after scaling to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AnchorSpec {
    pub index: usize,
    pub offset: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub left_ear: AnchorSpec,
    pub right_ear: AnchorSpec,
    pub neck: AnchorSpec,
}

// Indices into the 468 point face mesh
impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            left_ear: AnchorSpec {
                index: 132,
                offset: (-6., -16.),
            },
            right_ear: AnchorSpec {
                index: 361,
                offset: (6., -16.),
            },
            neck: AnchorSpec {
                index: 152,
                offset: (-8., 10.),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Weight given to the previous smoothed value, in [0, 1]
    pub smoothing_factor: f32,
    pub earring_scale: f32,
    pub necklace_scale: f32,
    pub anchors: AnchorConfig,
    pub gate: GatePolicy,
    /// Mark anchor points on rendered output
    pub trace_anchors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.9,
            earring_scale: 0.07,
            necklace_scale: 0.18,
            anchors: AnchorConfig::default(),
            gate: GatePolicy::default(),
            trace_anchors: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            bail!(
                "smoothing_factor must be within [0, 1], got {}",
                self.smoothing_factor
            );
        }

        for (name, scale) in [
            ("earring_scale", self.earring_scale),
            ("necklace_scale", self.necklace_scale),
        ] {
            if !scale.is_finite() || scale <= 0. {
                bail!("{name} must be positive, got {scale}");
            }
        }

        Ok(())
    }
}
