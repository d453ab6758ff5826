//! # Structure-of-Arrays Transforms
//!
//! Joints are grouped in lanes of four. Each component is stored as a
//! `Vec4` holding the same component of four joints, so the batch kernels can
//! process a whole group per instruction.
//!
//! ```text
//! SoaTransform (group g):
//! ├── translation.x = [j4g+0, j4g+1, j4g+2, j4g+3]
//! ├── translation.y = ...
//! ├── rotation.{x,y,z,w}
//! └── scale.{x,y,z}
//! ```
//!
//! Single-joint access goes through [`joint_transform`],
//! [`set_joint_transform`] and [`post_multiply_rotation`]. Only IK correction
//! needs the last one; everything else stays batch-oriented.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3, Vec4};

use super::Transform;

/// Number of joints per SoA group.
pub const LANES: usize = 4;

/// Number of SoA groups needed for `num_joints` joints.
#[inline]
#[must_use]
pub const fn soa_count(num_joints: usize) -> usize {
    num_joints.div_ceil(LANES)
}

/// Four 3-vectors in SoA form.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SoaFloat3 {
    /// X components of the four lanes.
    pub x: Vec4,
    /// Y components of the four lanes.
    pub y: Vec4,
    /// Z components of the four lanes.
    pub z: Vec4,
}

impl SoaFloat3 {
    /// All lanes zero.
    pub const ZERO: Self = Self::splat_const(0.0);
    /// All lanes one.
    pub const ONE: Self = Self::splat_const(1.0);

    const fn splat_const(v: f32) -> Self {
        Self {
            x: Vec4::splat(v),
            y: Vec4::splat(v),
            z: Vec4::splat(v),
        }
    }

    /// Reads one lane.
    #[inline]
    #[must_use]
    pub fn lane(&self, lane: usize) -> Vec3 {
        Vec3::new(self.x[lane], self.y[lane], self.z[lane])
    }

    /// Writes one lane.
    #[inline]
    pub fn set_lane(&mut self, lane: usize, v: Vec3) {
        self.x[lane] = v.x;
        self.y[lane] = v.y;
        self.z[lane] = v.z;
    }

    /// Lane-wise `self * a + other * b`.
    #[inline]
    #[must_use]
    pub fn weighted_sum(self, a: Vec4, other: Self, b: Vec4) -> Self {
        Self {
            x: self.x * a + other.x * b,
            y: self.y * a + other.y * b,
            z: self.z * a + other.z * b,
        }
    }

    /// Lane-wise scale by a per-lane factor.
    #[inline]
    #[must_use]
    pub fn scale_by(self, factor: Vec4) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }

    /// Lane-wise finiteness mask folded to a single bool.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Four quaternions in SoA form.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SoaQuaternion {
    /// X components of the four lanes.
    pub x: Vec4,
    /// Y components of the four lanes.
    pub y: Vec4,
    /// Z components of the four lanes.
    pub z: Vec4,
    /// W components of the four lanes.
    pub w: Vec4,
}

impl SoaQuaternion {
    /// All lanes identity.
    pub const IDENTITY: Self = Self {
        x: Vec4::ZERO,
        y: Vec4::ZERO,
        z: Vec4::ZERO,
        w: Vec4::ONE,
    };

    /// Reads one lane.
    #[inline]
    #[must_use]
    pub fn lane(&self, lane: usize) -> Quat {
        Quat::from_xyzw(self.x[lane], self.y[lane], self.z[lane], self.w[lane])
    }

    /// Writes one lane.
    #[inline]
    pub fn set_lane(&mut self, lane: usize, q: Quat) {
        self.x[lane] = q.x;
        self.y[lane] = q.y;
        self.z[lane] = q.z;
        self.w[lane] = q.w;
    }

    /// Lane-wise 4D dot product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> Vec4 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Lane-wise `self * a + other * b`.
    #[inline]
    #[must_use]
    pub fn weighted_sum(self, a: Vec4, other: Self, b: Vec4) -> Self {
        Self {
            x: self.x * a + other.x * b,
            y: self.y * a + other.y * b,
            z: self.z * a + other.z * b,
            w: self.w * a + other.w * b,
        }
    }

    /// Lane-wise normalization. Zero-length lanes become identity.
    #[inline]
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(&self);
        let mut out = self;
        for lane in 0..LANES {
            let len2 = len_sq[lane];
            if len2 > f32::EPSILON {
                let inv = len2.sqrt().recip();
                out.x[lane] *= inv;
                out.y[lane] *= inv;
                out.z[lane] *= inv;
                out.w[lane] *= inv;
            } else {
                out.set_lane(lane, Quat::IDENTITY);
            }
        }
        out
    }

    /// Lane-wise Hamilton product `self * rhs`.
    #[inline]
    #[must_use]
    pub fn compose(self, rhs: Self) -> Self {
        let (ax, ay, az, aw) = (self.x, self.y, self.z, self.w);
        let (bx, by, bz, bw) = (rhs.x, rhs.y, rhs.z, rhs.w);
        Self {
            x: aw * bx + ax * bw + ay * bz - az * by,
            y: aw * by - ax * bz + ay * bw + az * bx,
            z: aw * bz + ax * by - ay * bx + az * bw,
            w: aw * bw - ax * bx - ay * by - az * bz,
        }
    }

    /// Lane-wise finiteness folded to a single bool.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

/// Four joint transforms in SoA form.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SoaTransform {
    /// Translations.
    pub translation: SoaFloat3,
    /// Rotations.
    pub rotation: SoaQuaternion,
    /// Scales.
    pub scale: SoaFloat3,
}

impl SoaTransform {
    /// All four lanes identity.
    pub const IDENTITY: Self = Self {
        translation: SoaFloat3::ZERO,
        rotation: SoaQuaternion::IDENTITY,
        scale: SoaFloat3::ONE,
    };

    /// Reads one lane as a scalar transform.
    #[inline]
    #[must_use]
    pub fn lane(&self, lane: usize) -> Transform {
        Transform {
            translation: self.translation.lane(lane),
            rotation: self.rotation.lane(lane),
            scale: self.scale.lane(lane),
        }
    }

    /// Writes one lane from a scalar transform.
    #[inline]
    pub fn set_lane(&mut self, lane: usize, transform: &Transform) {
        self.translation.set_lane(lane, transform.translation);
        self.rotation.set_lane(lane, transform.rotation);
        self.scale.set_lane(lane, transform.scale);
    }

    /// Returns true when every lane of every component is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for SoaTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Splits a joint index into `(group, lane)`.
#[inline]
#[must_use]
pub const fn joint_slot(joint: usize) -> (usize, usize) {
    (joint / LANES, joint % LANES)
}

/// Reads a single joint out of a SoA pose.
#[inline]
#[must_use]
pub fn joint_transform(pose: &[SoaTransform], joint: usize) -> Option<Transform> {
    let (group, lane) = joint_slot(joint);
    pose.get(group).map(|soa| soa.lane(lane))
}

/// Overwrites a single joint of a SoA pose.
///
/// Returns `false` if the joint lies outside the pose.
#[inline]
pub fn set_joint_transform(pose: &mut [SoaTransform], joint: usize, transform: &Transform) -> bool {
    let (group, lane) = joint_slot(joint);
    match pose.get_mut(group) {
        Some(soa) => {
            soa.set_lane(lane, transform);
            true
        }
        None => false,
    }
}

/// Composes `correction` onto the right of one joint's local rotation and
/// renormalizes, leaving every other joint (and this joint's translation and
/// scale) untouched.
///
/// Returns `false` if the joint lies outside the pose.
#[inline]
pub fn post_multiply_rotation(pose: &mut [SoaTransform], joint: usize, correction: Quat) -> bool {
    let (group, lane) = joint_slot(joint);
    let Some(soa) = pose.get_mut(group) else {
        return false;
    };
    let local = soa.rotation.lane(lane);
    soa.rotation.set_lane(lane, (local * correction).normalize());
    true
}

/// Packs scalar transforms into SoA groups. Padding lanes are identity.
///
/// Every group of `out` is written; groups past the last transform are reset
/// to identity. Returns how many transforms were packed, which is less than
/// `transforms.len()` only when `out` holds fewer than
/// `soa_count(transforms.len())` groups.
pub fn pack_transforms(transforms: &[Transform], out: &mut [SoaTransform]) -> usize {
    let mut chunks = transforms.chunks(LANES);
    for soa in out.iter_mut() {
        *soa = SoaTransform::IDENTITY;
        if let Some(chunk) = chunks.next() {
            for (lane, transform) in chunk.iter().enumerate() {
                soa.set_lane(lane, transform);
            }
        }
    }
    transforms.len().min(out.len() * LANES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_reports_what_fits() {
        let transforms: Vec<Transform> = (0..5)
            .map(|i| Transform::from_translation(Vec3::splat(i as f32)))
            .collect();

        let mut short = [SoaTransform::IDENTITY; 1];
        assert_eq!(pack_transforms(&transforms, &mut short), 4);
        assert_eq!(joint_transform(&short, 3), Some(transforms[3]));

        let mut roomy = [SoaTransform::IDENTITY; 3];
        assert_eq!(pack_transforms(&transforms, &mut roomy), 5);
        assert_eq!(joint_transform(&roomy, 4), Some(transforms[4]));
        assert_eq!(joint_transform(&roomy, 5), Some(Transform::IDENTITY));
        assert_eq!(roomy[2], SoaTransform::IDENTITY);
    }

    #[test]
    fn test_soa_count_rounds_up() {
        assert_eq!(soa_count(1), 1);
        assert_eq!(soa_count(4), 1);
        assert_eq!(soa_count(5), 2);
        assert_eq!(soa_count(20), 5);
    }

    #[test]
    fn test_lane_roundtrip_leaves_neighbours() {
        let mut pose = [SoaTransform::IDENTITY; 2];
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            Vec3::splat(2.0),
        );
        assert!(set_joint_transform(&mut pose, 5, &t));
        assert_eq!(joint_transform(&pose, 5), Some(t));
        assert_eq!(joint_transform(&pose, 4), Some(Transform::IDENTITY));
        assert_eq!(joint_transform(&pose, 6), Some(Transform::IDENTITY));
        assert!(!set_joint_transform(&mut pose, 8, &t));
    }

    #[test]
    fn test_post_multiply_only_touches_rotation_of_one_lane() {
        let mut pose = [SoaTransform::IDENTITY; 1];
        let base = Transform::new(Vec3::X, Quat::from_rotation_z(0.3), Vec3::ONE);
        set_joint_transform(&mut pose, 2, &base);

        let corr = Quat::from_rotation_x(0.7);
        assert!(post_multiply_rotation(&mut pose, 2, corr));

        let after = joint_transform(&pose, 2).unwrap();
        assert_eq!(after.translation, Vec3::X);
        assert!(after.rotation.abs_diff_eq(base.rotation * corr, 1e-6));
        assert_eq!(joint_transform(&pose, 1), Some(Transform::IDENTITY));
    }

    #[test]
    fn test_soa_quaternion_mul_matches_scalar() {
        let a = Quat::from_rotation_y(0.4);
        let b = Quat::from_rotation_x(-1.1);
        let mut sa = SoaQuaternion::IDENTITY;
        let mut sb = SoaQuaternion::IDENTITY;
        sa.set_lane(3, a);
        sb.set_lane(3, b);
        let product = sa.compose(sb);
        assert!(product.lane(3).abs_diff_eq(a * b, 1e-6));
        assert!(product.lane(0).abs_diff_eq(Quat::IDENTITY, 1e-6));
    }
}
