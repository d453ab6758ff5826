//! # SINEW
//!
//! Skeletal pose evaluation for crowds of animated characters.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              SINEW                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌────────────────┐     ┌──────────────────┐    ┌─────────────┐  │
//! │  │  sinew_assets  │────>│    sinew_core    │<───│    crowd    │  │
//! │  │                │     │                  │    │             │  │
//! │  │  • .snsk files │     │  • Arena         │    │  • Workers  │  │
//! │  │  • .snan files │     │  • Instance      │    │  • Channel  │  │
//! │  │  • AssetStore  │     │  • Workspace     │    │  • Reports  │  │
//! │  └────────────────┘     │  • Evaluator     │    └─────────────┘  │
//! │                         │  • Pose kernel   │                     │
//! │                         └──────────────────┘                     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `crowd`: many Instances over a fixed pool of per-worker Workspaces

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod crowd;

// Re-export the layers
pub use sinew_assets as assets;
pub use sinew_core as core;

// Re-export commonly used types
pub use crowd::{CrowdEvaluator, CrowdReport};
pub use sinew_assets::AssetStore;
pub use sinew_core::{
    ArenaBuffer, ArenaPool, ErrorCode, Evaluator, IkDescriptor, Instance, LayerDescriptor,
    PlaybackMode, PoseConfig, PoseError, PoseResult, Skeleton, Workspace,
};
