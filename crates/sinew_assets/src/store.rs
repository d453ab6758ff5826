//! # Asset Store
//!
//! Path-keyed cache of immutable skeletons and clips. Each file is decoded
//! once; every later request for the same path gets the same `Arc`, so
//! Instances and Workspaces built from it agree on skeleton identity.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = AssetStore::with_root("assets/characters");
//! let skeleton = store.skeleton("knight.snsk")?;
//! let walk = store.animation_for("knight_walk.snan", &skeleton)?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use sinew_core::{AnimationClip, PoseError, PoseResult, Skeleton};

use crate::animation::load_animation;
use crate::skeleton::load_skeleton;

/// Shared, thread-safe asset cache.
#[derive(Debug, Default)]
pub struct AssetStore {
    /// Relative paths resolve against this directory.
    root: Option<PathBuf>,
    skeletons: RwLock<HashMap<PathBuf, Arc<Skeleton>>>,
    animations: RwLock<HashMap<PathBuf, Arc<AnimationClip>>>,
}

impl AssetStore {
    /// Creates a store that resolves paths as given.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that resolves relative paths against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Returns the skeleton at `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// [`PoseError::Io`] if the file cannot be read or decoded.
    pub fn skeleton(&self, path: impl AsRef<Path>) -> PoseResult<Arc<Skeleton>> {
        let path = self.resolve(path.as_ref());
        if let Some(skeleton) = self.skeletons.read().get(&path) {
            return Ok(Arc::clone(skeleton));
        }
        let loaded = Arc::new(load_skeleton(&path)?);
        // Another thread may have won the race; keep whichever landed first.
        let mut skeletons = self.skeletons.write();
        Ok(Arc::clone(skeletons.entry(path).or_insert(loaded)))
    }

    /// Returns the clip at `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// [`PoseError::Io`] if the file cannot be read or decoded.
    pub fn animation(&self, path: impl AsRef<Path>) -> PoseResult<Arc<AnimationClip>> {
        let path = self.resolve(path.as_ref());
        if let Some(clip) = self.animations.read().get(&path) {
            return Ok(Arc::clone(clip));
        }
        let loaded = Arc::new(load_animation(&path)?);
        let mut animations = self.animations.write();
        Ok(Arc::clone(animations.entry(path).or_insert(loaded)))
    }

    /// Returns the clip at `path` after checking it has one track per joint
    /// of `skeleton`.
    ///
    /// # Errors
    ///
    /// [`PoseError::Io`] as [`Self::animation`];
    /// [`PoseError::InvalidArgument`] on a track count mismatch.
    pub fn animation_for(
        &self,
        path: impl AsRef<Path>,
        skeleton: &Skeleton,
    ) -> PoseResult<Arc<AnimationClip>> {
        let clip = self.animation(path)?;
        if clip.track_count() != skeleton.num_joints() {
            return Err(PoseError::invalid(format!(
                "clip '{}' has {} tracks, skeleton has {} joints",
                clip.name(),
                clip.track_count(),
                skeleton.num_joints()
            )));
        }
        Ok(clip)
    }

    /// Registers an in-memory skeleton under `path`, replacing any cached one.
    pub fn insert_skeleton(&self, path: impl AsRef<Path>, skeleton: Skeleton) -> Arc<Skeleton> {
        let skeleton = Arc::new(skeleton);
        self.skeletons
            .write()
            .insert(self.resolve(path.as_ref()), Arc::clone(&skeleton));
        skeleton
    }

    /// Registers an in-memory clip under `path`, replacing any cached one.
    pub fn insert_animation(&self, path: impl AsRef<Path>, clip: AnimationClip) -> Arc<AnimationClip> {
        let clip = Arc::new(clip);
        self.animations
            .write()
            .insert(self.resolve(path.as_ref()), Arc::clone(&clip));
        clip
    }

    /// Drops the cached entries for `path`. Outstanding `Arc`s stay valid.
    ///
    /// Returns true if anything was cached.
    pub fn evict(&self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        let skeleton = self.skeletons.write().remove(&path).is_some();
        let animation = self.animations.write().remove(&path).is_some();
        skeleton || animation
    }

    /// Number of cached skeletons.
    #[must_use]
    pub fn skeleton_count(&self) -> usize {
        self.skeletons.read().len()
    }

    /// Number of cached clips.
    #[must_use]
    pub fn animation_count(&self) -> usize {
        self.animations.read().len()
    }

    /// Empties both caches.
    pub fn clear(&self) {
        self.skeletons.write().clear();
        self.animations.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use sinew_core::procedural::{chain_skeleton, walk_clip};

    use super::*;

    #[test]
    fn test_insert_then_get_shares_arc() {
        let store = AssetStore::with_root("/virtual");
        let inserted = store.insert_skeleton("rig.snsk", chain_skeleton(4, 1.0).unwrap());
        let fetched = store.skeleton("/virtual/rig.snsk").unwrap();
        assert!(Arc::ptr_eq(&inserted, &fetched));
        assert_eq!(store.skeleton_count(), 1);
    }

    #[test]
    fn test_animation_for_checks_tracks() {
        let store = AssetStore::new();
        let skeleton = chain_skeleton(4, 1.0).unwrap();
        let other = chain_skeleton(6, 1.0).unwrap();
        store.insert_animation("walk.snan", walk_clip(&other).unwrap());

        let err = store.animation_for("walk.snan", &skeleton).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
        assert!(store.animation_for("walk.snan", &other).is_ok());
    }

    #[test]
    fn test_missing_file_is_io() {
        let store = AssetStore::new();
        let err = store.skeleton("/definitely/not/here.snsk").unwrap_err();
        assert!(matches!(err, PoseError::Io(_)));
        assert_eq!(store.skeleton_count(), 0);
    }

    #[test]
    fn test_evict_and_clear() {
        let store = AssetStore::new();
        let skeleton = chain_skeleton(2, 1.0).unwrap();
        store.insert_animation("a.snan", walk_clip(&skeleton).unwrap());
        store.insert_skeleton("s.snsk", skeleton);

        assert!(store.evict("a.snan"));
        assert!(!store.evict("a.snan"));
        assert_eq!(store.animation_count(), 0);
        store.clear();
        assert_eq!(store.skeleton_count(), 0);
    }
}
