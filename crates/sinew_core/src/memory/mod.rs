//! # Memory Management
//!
//! Caller-owned arenas for Instances and Workspaces.
//!
//! ## Design Philosophy
//!
//! Memory is sized once from the skeleton and handed in by the caller:
//! - [`required_bytes`] answers how much, before anything exists
//! - `init` carves the buffer into fixed regions and never allocates again
//! - Regions have no lifetime of their own; releasing the buffer releases all
//!
//! [`ArenaBuffer`] and [`ArenaPool`] are conveniences for callers that want
//! the crate to own the bytes.

mod arena;
mod pool;

pub use arena::{
    required_bytes, ArenaBuffer, ArenaHeader, ArenaRequirements, ConsumerKind, ARENA_MAGIC,
};
pub use pool::{ArenaHandle, ArenaPool};

pub(crate) use arena::Carver;
