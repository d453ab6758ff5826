//! # Animation Clips
//!
//! An immutable set of keyframe tracks, one per joint. Each track carries
//! three independent channels (translation, rotation, scale), each a list of
//! keys sorted by time in seconds.
//!
//! Key data is only checked when it is sampled: a malformed channel surfaces
//! as a kernel failure at evaluation time rather than at construction.

use glam::{Quat, Vec3};

use crate::error::{PoseError, PoseResult};
use crate::pose::Transform;
use crate::skeleton::next_asset_id;

/// A single key: a value at a point in time (seconds).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe<T> {
    /// Key time in seconds from clip start.
    pub time: f32,
    /// Key value.
    pub value: T,
}

impl<T> Keyframe<T> {
    /// Creates a key.
    #[inline]
    pub const fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// The three channels animating one joint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointTrack {
    /// Translation keys.
    pub translations: Vec<Keyframe<Vec3>>,
    /// Rotation keys.
    pub rotations: Vec<Keyframe<Quat>>,
    /// Scale keys.
    pub scales: Vec<Keyframe<Vec3>>,
}

impl JointTrack {
    /// A track that holds `transform` for the whole clip.
    #[must_use]
    pub fn constant(transform: &Transform) -> Self {
        Self {
            translations: vec![Keyframe::new(0.0, transform.translation)],
            rotations: vec![Keyframe::new(0.0, transform.rotation)],
            scales: vec![Keyframe::new(0.0, transform.scale)],
        }
    }

    /// Total number of keys over all channels.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.translations.len() + self.rotations.len() + self.scales.len()
    }
}

/// An immutable keyframe animation.
#[derive(Debug)]
pub struct AnimationClip {
    id: u64,
    name: String,
    duration: f32,
    tracks: Vec<JointTrack>,
}

impl AnimationClip {
    /// Builds a clip.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidArgument`] if `duration` is negative or not
    /// finite.
    pub fn new(name: impl Into<String>, duration: f32, tracks: Vec<JointTrack>) -> PoseResult<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(PoseError::invalid(format!(
                "clip duration must be finite and >= 0, got {duration}"
            )));
        }
        Ok(Self {
            id: next_asset_id(),
            name: name.into(),
            duration,
            tracks,
        })
    }

    /// Process-unique identity of this clip.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Clip name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in seconds.
    #[inline]
    #[must_use]
    pub const fn duration(&self) -> f32 {
        self.duration
    }

    /// Number of tracks; must equal the joint count of any skeleton the clip
    /// is sampled against.
    #[inline]
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// All tracks in joint order.
    #[inline]
    #[must_use]
    pub fn tracks(&self) -> &[JointTrack] {
        &self.tracks
    }
}
