//! # SINEW Assets
//!
//! Loads and writes the immutable assets the pose pipeline runs on:
//! - `.snsk` skeleton files (hierarchy, rest pose, joint names)
//! - `.snan` animation clip files (per-joint keyframe tracks)
//! - [`AssetStore`], a path-keyed cache handing out shared `Arc`s
//!
//! Both formats are little-endian Pod records sealed with a CRC32 trailer.
//! Any decode failure is reported as [`sinew_core::PoseError::Io`] of kind
//! [`std::io::ErrorKind::InvalidData`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod animation;
pub mod format;
pub mod skeleton;
pub mod store;

pub use animation::{decode_animation, encode_animation, load_animation, save_animation};
pub use format::{ANIMATION_MAGIC, FORMAT_VERSION, SKELETON_MAGIC};
pub use skeleton::{decode_skeleton, encode_skeleton, load_skeleton, save_skeleton};
pub use store::AssetStore;
