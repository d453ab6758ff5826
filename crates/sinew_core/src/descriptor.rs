//! # Layer and IK Descriptors
//!
//! Plain values copied into an Instance by `set_layers` / `set_ik`. The
//! caller's list can be dropped right after the call.

use std::sync::Arc;

use glam::Vec3;
use smallvec::SmallVec;

use crate::animation::AnimationClip;
use crate::time::PlaybackMode;

/// Maximum number of layers an Instance holds.
pub const MAX_LAYERS: usize = 8;

/// Maximum number of IK jobs an Instance holds.
pub const MAX_IK_JOBS: usize = 8;

/// How a layer contributes to the pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Weighted average with the other normal layers.
    #[default]
    Normal,
    /// Delta composed on top of the averaged pose, in list order.
    Additive,
}

/// One weighted clip contributing to the pose.
#[derive(Clone, Debug)]
pub struct LayerDescriptor {
    /// Clip to sample. `None` makes the layer inactive.
    pub clip: Option<Arc<AnimationClip>>,
    /// Unnormalized playback time in seconds.
    pub time_seconds: f32,
    /// Wrap or clamp `time_seconds` into the clip duration.
    pub playback: PlaybackMode,
    /// Layer weight; `<= 0` makes the layer inactive.
    pub weight: f32,
    /// Normal or additive.
    pub mode: BlendMode,
}

impl LayerDescriptor {
    /// A normal layer.
    #[must_use]
    pub fn normal(clip: Arc<AnimationClip>, time_seconds: f32, playback: PlaybackMode, weight: f32) -> Self {
        Self {
            clip: Some(clip),
            time_seconds,
            playback,
            weight,
            mode: BlendMode::Normal,
        }
    }

    /// An additive layer.
    #[must_use]
    pub fn additive(clip: Arc<AnimationClip>, time_seconds: f32, playback: PlaybackMode, weight: f32) -> Self {
        Self {
            mode: BlendMode::Additive,
            ..Self::normal(clip, time_seconds, playback, weight)
        }
    }

    /// The clip, if this layer takes part in evaluation at all.
    #[inline]
    #[must_use]
    pub fn active_clip(&self) -> Option<&AnimationClip> {
        if self.weight > 0.0 {
            self.clip.as_deref()
        } else {
            None
        }
    }
}

/// Two-bone chain job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneIk {
    /// Chain root (e.g. hip, shoulder).
    pub start: usize,
    /// Chain middle (e.g. knee, elbow).
    pub mid: usize,
    /// Chain tip (e.g. ankle, wrist).
    pub end: usize,
    /// Model-space target position.
    pub target: Vec3,
    /// Model-space pole direction.
    pub pole: Vec3,
    /// Correction weight.
    pub weight: f32,
}

/// Aim job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AimIk {
    /// Joint to rotate.
    pub joint: usize,
    /// Model-space target position.
    pub target: Vec3,
    /// Joint-local axis to point at the target.
    pub forward: Vec3,
    /// Joint-local up axis.
    pub up: Vec3,
    /// Correction weight.
    pub weight: f32,
}

/// One IK correction applied after blending.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IkDescriptor {
    /// Bend a start-mid-end chain towards a target.
    TwoBone(TwoBoneIk),
    /// Rotate one joint to face a target.
    Aim(AimIk),
}

impl IkDescriptor {
    /// Job weight; `<= 0` skips the job.
    #[inline]
    #[must_use]
    pub const fn weight(&self) -> f32 {
        match self {
            Self::TwoBone(job) => job.weight,
            Self::Aim(job) => job.weight,
        }
    }

    /// Every joint index the job touches.
    #[must_use]
    pub fn joints(&self) -> SmallVec<[usize; 3]> {
        match self {
            Self::TwoBone(job) => SmallVec::from_buf([job.start, job.mid, job.end]),
            Self::Aim(job) => smallvec::smallvec![job.joint],
        }
    }
}

impl From<TwoBoneIk> for IkDescriptor {
    fn from(job: TwoBoneIk) -> Self {
        Self::TwoBone(job)
    }
}

impl From<AimIk> for IkDescriptor {
    fn from(job: AimIk) -> Self {
        Self::Aim(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_layers() {
        let clip = Arc::new(AnimationClip::new("c", 1.0, Vec::new()).unwrap());
        let mut layer = LayerDescriptor::normal(clip, 0.0, PlaybackMode::Wrap, 0.0);
        assert!(layer.active_clip().is_none());
        layer.weight = 0.5;
        assert!(layer.active_clip().is_some());
        layer.clip = None;
        assert!(layer.active_clip().is_none());
    }

    #[test]
    fn test_additive_constructor() {
        let clip = Arc::new(AnimationClip::new("c", 1.0, Vec::new()).unwrap());
        let layer = LayerDescriptor::additive(clip, 0.5, PlaybackMode::Clamp, 1.0);
        assert_eq!(layer.mode, BlendMode::Additive);
        assert_eq!(layer.playback, PlaybackMode::Clamp);
    }

    #[test]
    fn test_ik_joints() {
        let two = IkDescriptor::from(TwoBoneIk {
            start: 1,
            mid: 2,
            end: 3,
            target: Vec3::ZERO,
            pole: Vec3::Y,
            weight: 1.0,
        });
        assert_eq!(two.joints().as_slice(), &[1, 2, 3]);
        let aim = IkDescriptor::from(AimIk {
            joint: 4,
            target: Vec3::ONE,
            forward: Vec3::X,
            up: Vec3::Y,
            weight: 0.5,
        });
        assert_eq!(aim.joints().as_slice(), &[4]);
        assert_eq!(aim.weight(), 0.5);
    }
}
