//! # Workspace
//!
//! Per-worker scratch carved out of a caller-owned arena: a temp sample
//! buffer, model-space matrices and the output palette. A Workspace is not
//! tied to any Instance and is meant to be pooled one per worker thread.

use std::sync::Arc;

use glam::Mat4;

use crate::error::PoseResult;
use crate::memory::{required_bytes, ArenaHeader, ArenaRequirements, Carver, ConsumerKind};
use crate::pose::SoaTransform;
use crate::skeleton::Skeleton;

/// Floats per joint in the palette: three basis columns and a translation,
/// each as `xyz`.
pub const PALETTE_STRIDE: usize = 12;

/// Transient evaluation scratch bound to one skeleton.
pub struct Workspace<'a> {
    pub(crate) header: &'a mut ArenaHeader,
    pub(crate) skeleton: Arc<Skeleton>,
    pub(crate) temp: &'a mut [SoaTransform],
    pub(crate) model: &'a mut [Mat4],
    pub(crate) palette: &'a mut [f32],
}

impl<'a> Workspace<'a> {
    /// Bytes and alignment a Workspace of `skeleton` needs.
    #[inline]
    #[must_use]
    pub fn required_bytes(skeleton: &Skeleton) -> ArenaRequirements {
        required_bytes(ConsumerKind::Workspace, skeleton)
    }

    /// Carves `buffer` into a Workspace bound to `skeleton`.
    ///
    /// # Errors
    ///
    /// [`crate::PoseError::InvalidArgument`] if `buffer` is shorter than
    /// [`Workspace::required_bytes`] or misaligned.
    pub fn init(buffer: &'a mut [u8], skeleton: Arc<Skeleton>) -> PoseResult<Self> {
        let requirements = Self::required_bytes(&skeleton);
        let mut carver = Carver::new(buffer, requirements)?;

        let header = carver.take_one::<ArenaHeader>()?;
        let temp = carver.take::<SoaTransform>(skeleton.num_soa_joints())?;
        let model = carver.take::<Mat4>(skeleton.num_joints())?;
        let palette = carver.take::<f32>(PALETTE_STRIDE * skeleton.num_joints())?;

        *header = ArenaHeader::new(ConsumerKind::Workspace, &skeleton);
        temp.fill(SoaTransform::IDENTITY);
        model.fill(Mat4::IDENTITY);
        palette.fill(0.0);

        tracing::debug!(
            skeleton = skeleton.id(),
            joints = skeleton.num_joints(),
            bytes = requirements.size,
            "workspace initialized"
        );

        Ok(Self {
            header,
            skeleton,
            temp,
            model,
            palette,
        })
    }

    /// Skeleton this Workspace was built against.
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

    /// The `12 * N` palette floats of the last evaluation.
    ///
    /// Overwritten by the next run on this Workspace. After a failed run the
    /// contents are unspecified.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &[f32] {
        self.palette
    }

    /// The 12-float block of one joint.
    #[must_use]
    pub fn joint_palette(&self, joint: usize) -> Option<&[f32]> {
        let start = joint.checked_mul(PALETTE_STRIDE)?;
        self.palette.get(start..start + PALETTE_STRIDE)
    }

    /// Model-space matrices of the last evaluation.
    #[inline]
    #[must_use]
    pub fn model_matrices(&self) -> &[Mat4] {
        self.model
    }
}

impl std::fmt::Debug for Workspace<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("skeleton", &self.skeleton.id())
            .field("joints", &self.num_joints())
            .finish_non_exhaustive()
    }
}

/// Writes `matrix` as a column-major 3x4 block into `out[..12]`.
#[inline]
pub(crate) fn store_3x4(matrix: &Mat4, out: &mut [f32]) {
    out[0..3].copy_from_slice(&matrix.x_axis.truncate().to_array());
    out[3..6].copy_from_slice(&matrix.y_axis.truncate().to_array());
    out[6..9].copy_from_slice(&matrix.z_axis.truncate().to_array());
    out[9..12].copy_from_slice(&matrix.w_axis.truncate().to_array());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ArenaBuffer;
    use crate::procedural::chain_skeleton;
    use glam::{Quat, Vec3};

    #[test]
    fn test_palette_is_twelve_per_joint() {
        let skeleton = Arc::new(chain_skeleton(20, 1.0).unwrap());
        let mut buffer = ArenaBuffer::new(Workspace::required_bytes(&skeleton)).unwrap();
        let workspace = Workspace::init(buffer.as_bytes_mut(), skeleton).unwrap();
        assert_eq!(workspace.palette().len(), 240);
        assert_eq!(workspace.model_matrices().len(), 20);
        assert_eq!(workspace.joint_palette(19).map(<[f32]>::len), Some(12));
        assert!(workspace.joint_palette(20).is_none());
        assert_eq!(workspace.header().kind(), Some(ConsumerKind::Workspace));
    }

    #[test]
    fn test_store_3x4_column_major() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::IDENTITY,
            Vec3::new(7.0, 8.0, 9.0),
        );
        let mut out = [0.0; 12];
        store_3x4(&m, &mut out);
        assert_eq!(
            out,
            [2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        let skeleton = Arc::new(chain_skeleton(4, 1.0).unwrap());
        let req = Workspace::required_bytes(&skeleton);
        let mut buffer = ArenaBuffer::new(req).unwrap();
        assert!(Workspace::init(&mut buffer.as_bytes_mut()[..req.size - 1], skeleton.clone()).is_err());
        assert!(Workspace::init(buffer.as_bytes_mut(), skeleton).is_ok());
    }
}
