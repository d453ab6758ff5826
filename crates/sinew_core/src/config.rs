//! # Evaluator Configuration
//!
//! Loaded once at startup, either built in code or read from TOML:
//!
//! ```toml
//! blend_threshold = 0.1
//!
//! [ik]
//! snapshot = "single"   # or "per_job"
//! mid_axis = [0.0, 0.0, 1.0]
//! twist_angle = 0.0
//! ```
//!
//! Missing keys fall back to [`PoseConfig::default`].

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PoseError, PoseResult};
use crate::kernel::TwoBoneSettings;

/// When IK jobs see model space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IkSnapshot {
    /// Derive model space once; every job in the call reads that snapshot.
    #[default]
    Single,
    /// Re-derive model space before every job, so later jobs see earlier
    /// corrections in model space too.
    PerJob,
}

/// IK solver settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConfig {
    /// Snapshot policy.
    pub snapshot: IkSnapshot,
    /// Mid-joint bend axis for two-bone chains (mid-joint local space).
    pub mid_axis: [f32; 3],
    /// Extra twist of the two-bone chain plane, radians.
    pub twist_angle: f32,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            snapshot: IkSnapshot::Single,
            mid_axis: [0.0, 0.0, 1.0],
            twist_angle: 0.0,
        }
    }
}

impl IkConfig {
    /// Kernel settings derived from this config.
    #[must_use]
    pub fn two_bone_settings(&self) -> TwoBoneSettings {
        TwoBoneSettings {
            mid_axis: Vec3::from_array(self.mid_axis),
            twist_angle: self.twist_angle,
        }
    }
}

/// Evaluator configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Combined normal-layer weight below which the rest pose is mixed in.
    pub blend_threshold: f32,
    /// IK settings.
    pub ik: IkConfig,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            blend_threshold: 0.1,
            ik: IkConfig::default(),
        }
    }
}

impl PoseConfig {
    /// Re-derives model space after each IK job.
    #[must_use]
    pub fn iterative_ik() -> Self {
        Self {
            ik: IkConfig {
                snapshot: IkSnapshot::PerJob,
                ..IkConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] for malformed TOML or values rejected by
    /// [`PoseConfig::validate`].
    pub fn from_toml_str(source: &str) -> PoseResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|err| PoseError::invalid(format!("pose config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`PoseError::Io`] if the file cannot be read, otherwise as
    /// [`PoseConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoseResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`PoseError::Unknown`] if serialization fails.
    pub fn to_toml_string(&self) -> PoseResult<String> {
        toml::to_string(self).map_err(|err| PoseError::Unknown(format!("pose config: {err}").into()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if the threshold is not a positive
    /// finite number or the mid axis is zero or not finite.
    pub fn validate(&self) -> PoseResult<()> {
        if !self.blend_threshold.is_finite() || self.blend_threshold <= 0.0 {
            return Err(PoseError::invalid(format!(
                "blend_threshold must be > 0, got {}",
                self.blend_threshold
            )));
        }
        let axis = Vec3::from_array(self.ik.mid_axis);
        if !axis.is_finite() || axis.length_squared() < f32::EPSILON {
            return Err(PoseError::invalid("ik.mid_axis must be a non-zero vector"));
        }
        if !self.ik.twist_angle.is_finite() {
            return Err(PoseError::invalid("ik.twist_angle must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoseConfig::default();
        assert_eq!(config.blend_threshold, 0.1);
        assert_eq!(config.ik.snapshot, IkSnapshot::Single);
        assert_eq!(config.ik.two_bone_settings(), TwoBoneSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PoseConfig::from_toml_str("[ik]\nsnapshot = \"per_job\"\n").unwrap();
        assert_eq!(config.ik.snapshot, IkSnapshot::PerJob);
        assert_eq!(config.blend_threshold, 0.1);
        assert_eq!(config.ik.mid_axis, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = PoseConfig::iterative_ik();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PoseConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PoseConfig::from_toml_str("blend_threshold = 0.0").is_err());
        assert!(PoseConfig::from_toml_str("[ik]\nmid_axis = [0.0, 0.0, 0.0]").is_err());
        assert!(PoseConfig::from_toml_str("blend_threshold = \"high\"").is_err());
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = PoseConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PoseError::Io(_)));
    }
}
