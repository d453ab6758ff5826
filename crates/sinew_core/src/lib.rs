//! # SINEW Core
//!
//! Allocation-free skeletal pose evaluation:
//! - Caller-owned arenas, sized once from the skeleton
//! - Persistent per-entity [`Instance`]s, pooled per-worker [`Workspace`]s
//! - Weighted + additive layer blending, single-pass IK, 3x4 matrix palettes
//!
//! ## Architecture Rules
//!
//! 1. **Size, then carve** - `required_bytes` first, `init` never allocates
//! 2. **Validate before writing** - a rejected run leaves every buffer as it was
//! 3. **Batch-oriented math** - joints are processed in SoA groups of four
//!
//! ## Example
//!
//! ```rust,ignore
//! use sinew_core::{ArenaBuffer, Evaluator, Instance, LayerDescriptor, PlaybackMode, Workspace};
//!
//! let mut instance_bytes = ArenaBuffer::new(Instance::required_bytes(&skeleton))?;
//! let mut workspace_bytes = ArenaBuffer::new(Workspace::required_bytes(&skeleton))?;
//! let mut instance = Instance::init(instance_bytes.as_bytes_mut(), skeleton.clone())?;
//! let mut workspace = Workspace::init(workspace_bytes.as_bytes_mut(), skeleton)?;
//!
//! instance.set_layers(&[
//!     LayerDescriptor::normal(walk, 1.0, PlaybackMode::Wrap, 0.6),
//!     LayerDescriptor::normal(jog, 1.0, PlaybackMode::Wrap, 0.4),
//! ]);
//! let palette = Evaluator::default().run(&mut instance, &mut workspace)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod animation;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod evaluator;
pub mod instance;
pub mod kernel;
pub mod memory;
pub mod pose;
pub mod procedural;
pub mod skeleton;
pub mod time;
pub mod workspace;

pub use animation::{AnimationClip, JointTrack, Keyframe};
pub use config::{IkConfig, IkSnapshot, PoseConfig};
pub use descriptor::{
    AimIk, BlendMode, IkDescriptor, LayerDescriptor, TwoBoneIk, MAX_IK_JOBS, MAX_LAYERS,
};
pub use error::{ErrorCode, PoseError, PoseResult};
pub use evaluator::Evaluator;
pub use instance::Instance;
pub use kernel::KernelError;
pub use memory::{
    required_bytes, ArenaBuffer, ArenaHandle, ArenaHeader, ArenaPool, ArenaRequirements,
    ConsumerKind,
};
pub use pose::{SoaTransform, Transform};
pub use skeleton::Skeleton;
pub use time::PlaybackMode;
pub use workspace::{Workspace, PALETTE_STRIDE};
