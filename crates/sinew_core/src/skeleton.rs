//! # Skeleton
//!
//! Immutable joint hierarchy shared by every Instance and Workspace built
//! against it. Joints are stored parent-before-child, so a single forward
//! pass resolves model space.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{PoseError, PoseResult};
use crate::pose::{pack_transforms, soa_count, SoaTransform, Transform};

/// Process-wide id source for skeletons and clips.
static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a fresh, never-reused asset id.
pub(crate) fn next_asset_id() -> u64 {
    NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

/// An immutable joint hierarchy with its rest pose.
#[derive(Debug)]
pub struct Skeleton {
    id: u64,
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    rest_pose: Vec<Transform>,
    rest_pose_soa: Vec<SoaTransform>,
}

impl Skeleton {
    /// Upper bound on joint count (indices are stored as `i32` on disk).
    pub const MAX_JOINTS: usize = 1 << 16;

    /// Builds a skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InvalidArgument`] if there are no joints, more than
    /// [`Self::MAX_JOINTS`], the three arrays disagree in length, a parent does
    /// not precede its child, or a rest transform is not finite.
    pub fn new(
        names: Vec<String>,
        parents: Vec<Option<usize>>,
        rest_pose: Vec<Transform>,
    ) -> PoseResult<Self> {
        let num_joints = parents.len();
        if num_joints == 0 {
            return Err(PoseError::invalid("skeleton has no joints"));
        }
        if num_joints > Self::MAX_JOINTS {
            return Err(PoseError::invalid(format!(
                "skeleton has {num_joints} joints, limit is {}",
                Self::MAX_JOINTS
            )));
        }
        if names.len() != num_joints || rest_pose.len() != num_joints {
            return Err(PoseError::invalid(format!(
                "skeleton arrays disagree: {} names, {num_joints} parents, {} rest transforms",
                names.len(),
                rest_pose.len()
            )));
        }
        for (joint, parent) in parents.iter().enumerate() {
            if let Some(parent) = *parent {
                if parent >= joint {
                    return Err(PoseError::invalid(format!(
                        "joint {joint} has parent {parent}, parents must precede children"
                    )));
                }
            }
        }
        if let Some(joint) = rest_pose.iter().position(|t| !t.is_finite()) {
            return Err(PoseError::invalid(format!(
                "rest transform of joint {joint} is not finite"
            )));
        }

        let mut rest_pose_soa = vec![SoaTransform::IDENTITY; soa_count(num_joints)];
        pack_transforms(&rest_pose, &mut rest_pose_soa);

        Ok(Self {
            id: next_asset_id(),
            names,
            parents,
            rest_pose,
            rest_pose_soa,
        })
    }

    /// Process-unique identity of this skeleton.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Number of joints `N`.
    #[inline]
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.parents.len()
    }

    /// Number of SoA groups covering `N` joints.
    #[inline]
    #[must_use]
    pub fn num_soa_joints(&self) -> usize {
        self.rest_pose_soa.len()
    }

    /// Parent index of every joint, `None` for roots.
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }

    /// Parent of one joint. `None` for roots and out-of-range joints.
    #[inline]
    #[must_use]
    pub fn parent(&self, joint: usize) -> Option<usize> {
        self.parents.get(joint).copied().flatten()
    }

    /// Joint names in index order.
    #[inline]
    #[must_use]
    pub fn joint_names(&self) -> &[String] {
        &self.names
    }

    /// Looks up a joint by name.
    #[must_use]
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Rest pose in scalar form.
    #[inline]
    #[must_use]
    pub fn rest_pose(&self) -> &[Transform] {
        &self.rest_pose
    }

    /// Rest pose in SoA form (padding lanes are identity).
    #[inline]
    #[must_use]
    pub fn rest_pose_soa(&self) -> &[SoaTransform] {
        &self.rest_pose_soa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("joint_{i}")).collect()
    }

    #[test]
    fn test_valid_chain() {
        let skel = Skeleton::new(
            names(5),
            vec![None, Some(0), Some(1), Some(2), Some(3)],
            vec![Transform::from_translation(Vec3::Y); 5],
        )
        .unwrap();
        assert_eq!(skel.num_joints(), 5);
        assert_eq!(skel.num_soa_joints(), 2);
        assert_eq!(skel.parent(0), None);
        assert_eq!(skel.parent(3), Some(2));
        assert_eq!(skel.find_joint("joint_4"), Some(4));
        assert_eq!(skel.find_joint("missing"), None);
    }

    #[test]
    fn test_rejects_child_before_parent() {
        let err = Skeleton::new(
            names(3),
            vec![None, Some(2), Some(0)],
            vec![Transform::IDENTITY; 3],
        )
        .unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        assert!(Skeleton::new(Vec::new(), Vec::new(), Vec::new()).is_err());
        assert!(Skeleton::new(names(2), vec![None, Some(0)], vec![Transform::IDENTITY]).is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Skeleton::new(names(1), vec![None], vec![Transform::IDENTITY]).unwrap();
        let b = Skeleton::new(names(1), vec![None], vec![Transform::IDENTITY]).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
