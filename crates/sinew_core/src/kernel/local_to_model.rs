//! Local-to-model space conversion.

use glam::Mat4;

use super::KernelError;
use crate::pose::{joint_transform, SoaTransform};
use crate::skeleton::Skeleton;

/// Resolves every joint of `locals` into model space.
///
/// Joints are processed in index order, which is parent-first for any valid
/// [`Skeleton`]. Roots use their local matrix unchanged.
///
/// # Errors
///
/// Fails if `locals` has fewer SoA groups than the skeleton or `output` has
/// fewer than `N` matrices.
pub fn local_to_model(
    skeleton: &Skeleton,
    locals: &[SoaTransform],
    output: &mut [Mat4],
) -> Result<(), KernelError> {
    let num_joints = skeleton.num_joints();
    if locals.len() < skeleton.num_soa_joints() {
        return Err(KernelError::LayerSizeMismatch {
            expected: skeleton.num_soa_joints(),
            found: locals.len(),
        });
    }
    if output.len() < num_joints {
        return Err(KernelError::OutputTooSmall {
            required: num_joints,
            provided: output.len(),
        });
    }

    for (joint, parent) in skeleton.parents().iter().enumerate() {
        let local = joint_transform(locals, joint)
            .map_or(Mat4::IDENTITY, |t| t.to_matrix());
        output[joint] = match *parent {
            Some(parent) => output[parent] * local,
            None => local,
        };
    }
    Ok(())
}
