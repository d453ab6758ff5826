//! # Instance
//!
//! Persistent per-entity state, carved out of a caller-owned arena:
//!
//! - the pose accumulation buffer (`S` SoA groups of local transforms)
//! - the sampling cache (one [`TrackCursor`] per joint)
//! - up to [`MAX_LAYERS`] layers and [`MAX_IK_JOBS`] IK jobs
//!
//! An Instance is single-writer: evaluation mutates its accumulation buffer
//! and sampling cache in place. `&mut` access enforces that statically.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::descriptor::{IkDescriptor, LayerDescriptor, MAX_IK_JOBS, MAX_LAYERS};
use crate::error::{PoseError, PoseResult};
use crate::kernel::TrackCursor;
use crate::memory::{required_bytes, ArenaHeader, ArenaRequirements, Carver, ConsumerKind};
use crate::pose::{joint_transform, SoaTransform, Transform};
use crate::skeleton::Skeleton;

/// Per-entity animation state bound to one skeleton.
pub struct Instance<'a> {
    pub(crate) header: &'a mut ArenaHeader,
    pub(crate) skeleton: Arc<Skeleton>,
    pub(crate) accum: &'a mut [SoaTransform],
    pub(crate) cursors: &'a mut [TrackCursor],
    pub(crate) layers: SmallVec<[LayerDescriptor; MAX_LAYERS]>,
    pub(crate) ik: SmallVec<[IkDescriptor; MAX_IK_JOBS]>,
}

impl<'a> Instance<'a> {
    /// Bytes and alignment an Instance of `skeleton` needs.
    #[inline]
    #[must_use]
    pub fn required_bytes(skeleton: &Skeleton) -> ArenaRequirements {
        required_bytes(ConsumerKind::Instance, skeleton)
    }

    /// Carves `buffer` into an Instance bound to `skeleton`.
    ///
    /// The accumulation buffer starts at the rest pose; layer and IK sets
    /// start empty.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if `buffer` is shorter than
    /// [`Instance::required_bytes`] or misaligned. Nothing is written in
    /// that case.
    pub fn init(buffer: &'a mut [u8], skeleton: Arc<Skeleton>) -> PoseResult<Self> {
        let requirements = Self::required_bytes(&skeleton);
        let mut carver = Carver::new(buffer, requirements)?;

        let header = carver.take_one::<ArenaHeader>()?;
        let accum = carver.take::<SoaTransform>(skeleton.num_soa_joints())?;
        let cursors = carver.take::<TrackCursor>(skeleton.num_joints())?;

        *header = ArenaHeader::new(ConsumerKind::Instance, &skeleton);
        accum.copy_from_slice(skeleton.rest_pose_soa());
        cursors.fill(TrackCursor::default());

        tracing::debug!(
            skeleton = skeleton.id(),
            joints = skeleton.num_joints(),
            bytes = requirements.size,
            "instance initialized"
        );

        Ok(Self {
            header,
            skeleton,
            accum,
            cursors,
            layers: SmallVec::new(),
            ik: SmallVec::new(),
        })
    }

    /// Skeleton this Instance was built against.
    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Joint count `N`.
    #[inline]
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.skeleton.num_joints()
    }

    /// Arena header written at init.
    #[inline]
    #[must_use]
    pub fn header(&self) -> &ArenaHeader {
        self.header
    }

    /// Replaces the layer set, keeping at most the first [`MAX_LAYERS`].
    ///
    /// Returns how many layers were stored. Extra entries are dropped with a
    /// warning; use [`Instance::try_set_layers`] to reject them instead.
    pub fn set_layers(&mut self, layers: &[LayerDescriptor]) -> usize {
        if layers.len() > MAX_LAYERS {
            tracing::warn!(
                requested = layers.len(),
                kept = MAX_LAYERS,
                "layer list truncated"
            );
        }
        self.layers.clear();
        self.layers
            .extend(layers.iter().take(MAX_LAYERS).cloned());
        self.layers.len()
    }

    /// Replaces the layer set.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if `layers` holds more than
    /// [`MAX_LAYERS`] entries; the current set is kept.
    pub fn try_set_layers(&mut self, layers: &[LayerDescriptor]) -> PoseResult<()> {
        if layers.len() > MAX_LAYERS {
            return Err(PoseError::invalid(format!(
                "{} layers exceed the limit of {MAX_LAYERS}",
                layers.len()
            )));
        }
        self.set_layers(layers);
        Ok(())
    }

    /// Active layers in stored order.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    /// Replaces the IK job set, keeping at most the first [`MAX_IK_JOBS`].
    ///
    /// Returns how many jobs were stored.
    pub fn set_ik(&mut self, jobs: &[IkDescriptor]) -> usize {
        if jobs.len() > MAX_IK_JOBS {
            tracing::warn!(
                requested = jobs.len(),
                kept = MAX_IK_JOBS,
                "IK job list truncated"
            );
        }
        self.ik.clear();
        self.ik.extend(jobs.iter().take(MAX_IK_JOBS).copied());
        self.ik.len()
    }

    /// Replaces the IK job set.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if `jobs` holds more than
    /// [`MAX_IK_JOBS`] entries; the current set is kept.
    pub fn try_set_ik(&mut self, jobs: &[IkDescriptor]) -> PoseResult<()> {
        if jobs.len() > MAX_IK_JOBS {
            return Err(PoseError::invalid(format!(
                "{} IK jobs exceed the limit of {MAX_IK_JOBS}",
                jobs.len()
            )));
        }
        self.set_ik(jobs);
        Ok(())
    }

    /// Active IK jobs in stored order.
    #[inline]
    #[must_use]
    pub fn ik_jobs(&self) -> &[IkDescriptor] {
        &self.ik
    }

    /// Local-space pose left by the last evaluation.
    ///
    /// Only meaningful after a successful run; a failed run leaves it stale.
    #[inline]
    #[must_use]
    pub fn local_pose(&self) -> &[SoaTransform] {
        self.accum
    }

    /// One joint of [`Instance::local_pose`].
    #[must_use]
    pub fn local_transform(&self, joint: usize) -> Option<Transform> {
        if joint >= self.num_joints() {
            return None;
        }
        joint_transform(self.accum, joint)
    }
}

impl std::fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("skeleton", &self.skeleton.id())
            .field("joints", &self.num_joints())
            .field("layers", &self.layers.len())
            .field("ik", &self.ik.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationClip;
    use crate::descriptor::{AimIk, IkDescriptor};
    use crate::memory::ArenaBuffer;
    use crate::procedural::chain_skeleton;
    use crate::time::PlaybackMode;
    use glam::Vec3;

    fn layers(count: usize) -> Vec<LayerDescriptor> {
        let clip = Arc::new(AnimationClip::new("idle", 1.0, Vec::new()).unwrap());
        (0..count)
            .map(|i| LayerDescriptor::normal(clip.clone(), i as f32, PlaybackMode::Wrap, 1.0))
            .collect()
    }

    fn aim(joint: usize) -> IkDescriptor {
        IkDescriptor::Aim(AimIk {
            joint,
            target: Vec3::ONE,
            forward: Vec3::X,
            up: Vec3::Y,
            weight: 1.0,
        })
    }

    #[test]
    fn test_init_starts_at_rest_pose() {
        let skeleton = Arc::new(chain_skeleton(6, 0.5).unwrap());
        let mut buffer = ArenaBuffer::new(Instance::required_bytes(&skeleton)).unwrap();
        let instance = Instance::init(buffer.as_bytes_mut(), skeleton.clone()).unwrap();

        assert_eq!(instance.num_joints(), 6);
        assert_eq!(instance.header().kind(), Some(ConsumerKind::Instance));
        assert_eq!(instance.local_pose(), skeleton.rest_pose_soa());
        assert_eq!(instance.local_transform(5), Some(skeleton.rest_pose()[5]));
        assert_eq!(instance.local_transform(6), None);
        assert!(instance.layers().is_empty());
    }

    #[test]
    fn test_set_layers_replaces_and_truncates() {
        let skeleton = Arc::new(chain_skeleton(3, 1.0).unwrap());
        let mut buffer = ArenaBuffer::new(Instance::required_bytes(&skeleton)).unwrap();
        let mut instance = Instance::init(buffer.as_bytes_mut(), skeleton).unwrap();

        assert_eq!(instance.set_layers(&layers(3)), 3);
        assert_eq!(instance.set_layers(&layers(2)), 2);
        assert_eq!(instance.layers().len(), 2);

        assert_eq!(instance.set_layers(&layers(11)), MAX_LAYERS);
        assert_eq!(instance.layers()[7].time_seconds, 7.0);
    }

    #[test]
    fn test_try_set_rejects_and_keeps_previous() {
        let skeleton = Arc::new(chain_skeleton(3, 1.0).unwrap());
        let mut buffer = ArenaBuffer::new(Instance::required_bytes(&skeleton)).unwrap();
        let mut instance = Instance::init(buffer.as_bytes_mut(), skeleton).unwrap();

        instance.try_set_layers(&layers(2)).unwrap();
        let err = instance.try_set_layers(&layers(9)).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
        assert_eq!(instance.layers().len(), 2);

        instance.try_set_ik(&[aim(0), aim(1)]).unwrap();
        assert!(instance.try_set_ik(&vec![aim(2); 9]).is_err());
        assert_eq!(instance.ik_jobs(), &[aim(0), aim(1)]);
        assert_eq!(instance.set_ik(&vec![aim(2); 12]), MAX_IK_JOBS);
    }

    #[test]
    fn test_caller_list_can_be_dropped() {
        let skeleton = Arc::new(chain_skeleton(3, 1.0).unwrap());
        let mut buffer = ArenaBuffer::new(Instance::required_bytes(&skeleton)).unwrap();
        let mut instance = Instance::init(buffer.as_bytes_mut(), skeleton).unwrap();
        {
            let list = layers(4);
            instance.set_layers(&list);
        }
        assert_eq!(instance.layers().len(), 4);
        assert_eq!(instance.layers()[3].time_seconds, 3.0);
    }

    #[test]
    fn test_exact_and_short_buffers() {
        let skeleton = Arc::new(chain_skeleton(20, 1.0).unwrap());
        let req = Instance::required_bytes(&skeleton);
        let mut buffer = ArenaBuffer::new(req).unwrap();
        assert!(Instance::init(&mut buffer.as_bytes_mut()[..req.size - 1], skeleton.clone()).is_err());
        assert!(Instance::init(buffer.as_bytes_mut(), skeleton).is_ok());
    }
}
