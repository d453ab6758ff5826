//! # Procedural Fixtures
//!
//! Deterministic skeletons and clips built in code. Benchmarks, the stress
//! binary and the test suites share them, so no asset files are needed to
//! exercise the pipeline.
//!
//! ## Example
//!
//! ```rust,ignore
//! let skeleton = Arc::new(chain_skeleton(20, 0.25)?);
//! let walk = Arc::new(walk_clip(&skeleton)?);
//! let jog = Arc::new(jog_clip(&skeleton)?);
//! ```

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

use crate::animation::{AnimationClip, JointTrack, Keyframe};
use crate::error::{PoseError, PoseResult};
use crate::pose::Transform;
use crate::skeleton::Skeleton;

/// Keys per channel in the sinusoidal clips.
pub const DEFAULT_KEY_COUNT: usize = 16;

/// A single chain: joint `i` is the child of `i - 1`, offset by
/// `bone_length` along +Y.
///
/// # Errors
///
/// As [`Skeleton::new`] (zero joints, too many joints, non-finite length).
pub fn chain_skeleton(num_joints: usize, bone_length: f32) -> PoseResult<Skeleton> {
    let names = (0..num_joints).map(|i| format!("joint_{i}")).collect();
    let parents = (0..num_joints).map(|i| i.checked_sub(1)).collect();
    let rest_pose = (0..num_joints)
        .map(|i| {
            if i == 0 {
                Transform::IDENTITY
            } else {
                Transform::from_translation(Vec3::new(0.0, bone_length, 0.0))
            }
        })
        .collect();
    Skeleton::new(names, parents, rest_pose)
}

/// Shape of a sinusoidal clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Swing {
    /// Clip length in seconds.
    pub duration: f32,
    /// Peak rotation in radians.
    pub amplitude: f32,
    /// Phase offset in radians.
    pub phase: f32,
    /// Keys per channel (at least 2).
    pub keys: usize,
}

/// Builds a looping clip that swings every joint around its rest rotation.
///
/// Even joints swing about Z, odd joints about X, each a little out of phase
/// with its parent. Translation and scale follow the rest pose.
///
/// # Errors
///
/// [`PoseError::InvalidArgument`] if `swing.keys < 2` or the duration is
/// invalid.
pub fn swing_clip(name: &str, skeleton: &Skeleton, swing: Swing) -> PoseResult<AnimationClip> {
    if swing.keys < 2 {
        return Err(PoseError::invalid("swing clip needs at least two keys"));
    }
    #[allow(clippy::cast_precision_loss)]
    let step = swing.duration / (swing.keys - 1) as f32;

    let tracks = skeleton
        .rest_pose()
        .iter()
        .enumerate()
        .map(|(joint, rest)| {
            let axis = if joint % 2 == 0 { Vec3::Z } else { Vec3::X };
            #[allow(clippy::cast_precision_loss)]
            let lag = joint as f32 * 0.3;
            let rotations = (0..swing.keys)
                .map(|k| {
                    #[allow(clippy::cast_precision_loss)]
                    let time = k as f32 * step;
                    let cycle = if swing.duration > 0.0 { time / swing.duration } else { 0.0 };
                    let angle = swing.amplitude * (cycle * TAU + swing.phase + lag).sin();
                    Keyframe::new(time, rest.rotation * Quat::from_axis_angle(axis, angle))
                })
                .collect();
            JointTrack {
                translations: vec![Keyframe::new(0.0, rest.translation)],
                rotations,
                scales: vec![Keyframe::new(0.0, rest.scale)],
            }
        })
        .collect();

    AnimationClip::new(name, swing.duration, tracks)
}

/// A walk cycle for `skeleton`.
///
/// # Errors
///
/// See [`swing_clip`].
pub fn walk_clip(skeleton: &Skeleton) -> PoseResult<AnimationClip> {
    swing_clip(
        "walk",
        skeleton,
        Swing {
            duration: 1.2,
            amplitude: 0.35,
            phase: 0.0,
            keys: DEFAULT_KEY_COUNT,
        },
    )
}

/// A jog cycle for `skeleton`.
///
/// # Errors
///
/// See [`swing_clip`].
pub fn jog_clip(skeleton: &Skeleton) -> PoseResult<AnimationClip> {
    swing_clip(
        "jog",
        skeleton,
        Swing {
            duration: 0.8,
            amplitude: 0.6,
            phase: 0.5,
            keys: DEFAULT_KEY_COUNT,
        },
    )
}

/// An additive clip holding the same delta on every joint for its whole
/// duration.
///
/// # Errors
///
/// See [`AnimationClip::new`].
pub fn constant_delta_clip(
    name: &str,
    num_joints: usize,
    delta: Transform,
) -> PoseResult<AnimationClip> {
    AnimationClip::new(name, 1.0, vec![JointTrack::constant(&delta); num_joints])
}

/// An additive "breathing" clip: a small rotation about X that rises and
/// falls over `duration` seconds.
///
/// # Errors
///
/// See [`swing_clip`].
pub fn breathe_clip(num_joints: usize, duration: f32, amplitude: f32) -> PoseResult<AnimationClip> {
    let keys = DEFAULT_KEY_COUNT;
    #[allow(clippy::cast_precision_loss)]
    let step = duration / (keys - 1) as f32;
    let track = JointTrack {
        translations: vec![Keyframe::new(0.0, Vec3::ZERO)],
        rotations: (0..keys)
            .map(|k| {
                #[allow(clippy::cast_precision_loss)]
                let time = k as f32 * step;
                let cycle = if duration > 0.0 { time / duration } else { 0.0 };
                Keyframe::new(time, Quat::from_rotation_x(amplitude * (cycle * TAU).sin()))
            })
            .collect(),
        scales: vec![Keyframe::new(0.0, Vec3::ONE)],
    };
    AnimationClip::new("breathe", duration, vec![track; num_joints])
}
