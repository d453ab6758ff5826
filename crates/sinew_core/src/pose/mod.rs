//! # Pose Representation
//!
//! Local joint transforms in scalar and SoA form.

mod soa;
mod transform;

pub use soa::{
    joint_slot, joint_transform, pack_transforms, post_multiply_rotation, set_joint_transform,
    soa_count, SoaFloat3, SoaQuaternion, SoaTransform, LANES,
};
pub use transform::Transform;
