//! # Pose Kernel
//!
//! The numeric layer underneath the evaluator: sample a clip, blend two
//! poses, resolve model space, solve IK chains. Kernel functions only read
//! and write the buffers they are handed; buffer ownership and call order
//! belong to [`crate::evaluator`].
//!
//! Every function reports failure through [`KernelError`], which the
//! evaluator lifts into [`crate::PoseError::KernelFailure`].

mod blending;
mod ik;
mod local_to_model;
mod sampling;

use thiserror::Error;

pub use blending::{blend_additive_into, blend_into};
pub use ik::{solve_aim, solve_two_bone, TwoBoneCorrection, TwoBoneSettings};
pub use local_to_model::local_to_model;
pub use sampling::{sample, TrackCursor};

/// Failures reported by kernel jobs.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// A channel has no keys.
    #[error("track {track} has an empty {channel} channel")]
    EmptyChannel {
        /// Track (joint) index.
        track: usize,
        /// Channel name.
        channel: &'static str,
    },

    /// Keys of a channel are not sorted by time.
    #[error("track {track} has unsorted {channel} keys")]
    UnsortedKeys {
        /// Track (joint) index.
        track: usize,
        /// Channel name.
        channel: &'static str,
    },

    /// Sampling produced NaN or infinity.
    #[error("track {track} sampled to a non-finite transform")]
    NonFiniteSample {
        /// Track (joint) index.
        track: usize,
    },

    /// An output buffer cannot hold the result.
    #[error("output too small: need {required}, got {provided}")]
    OutputTooSmall {
        /// Elements required.
        required: usize,
        /// Elements provided.
        provided: usize,
    },

    /// The sampling cache has fewer cursors than the clip has tracks.
    #[error("sampling cache too small: need {required} cursors, got {provided}")]
    CacheTooSmall {
        /// Cursors required.
        required: usize,
        /// Cursors provided.
        provided: usize,
    },

    /// Two pose buffers handed to one job differ in length.
    #[error("pose buffers disagree: expected {expected} groups, found {found}")]
    LayerSizeMismatch {
        /// Expected SoA group count.
        expected: usize,
        /// Actual SoA group count.
        found: usize,
    },

    /// A blend weight is negative or not finite, or all weights are zero.
    #[error("invalid blend weight")]
    InvalidWeight,

    /// A bone of an IK chain has zero length.
    #[error("IK chain has a zero-length bone")]
    DegenerateChain,

    /// An IK axis has zero length.
    #[error("IK {axis} axis has zero length")]
    DegenerateAxis {
        /// Which axis.
        axis: &'static str,
    },

    /// An IK target or pole is not finite.
    #[error("IK target is not finite")]
    NonFiniteTarget,
}

/// Squared-length threshold under which vectors are treated as zero.
pub(crate) const DEGENERATE_LENGTH_SQ: f32 = 1e-12;
