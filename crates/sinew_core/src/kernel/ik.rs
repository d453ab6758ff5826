//! Analytic IK solvers.
//!
//! Solvers read model-space matrices and return local-space rotation
//! corrections. A correction `c` for joint `j` is meant to be applied as
//! `local_j = local_j * c`, see [`crate::pose::post_multiply_rotation`].
//! Converting a model-space rotation `R` about the joint pivot into that form
//! is a change of basis: `c = Q⁻¹ · R · Q`, with `Q` the joint's model rotation.

use glam::{Mat4, Quat, Vec3};

use super::{KernelError, DEGENERATE_LENGTH_SQ};

/// Solver options for [`solve_two_bone`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneSettings {
    /// Mid-joint axis (mid-joint local space) the chain bends around when the
    /// chain is straight and the bend plane is otherwise undefined.
    pub mid_axis: Vec3,
    /// Extra rotation in radians of the chain plane around the start-target
    /// axis, applied after pole alignment.
    pub twist_angle: f32,
}

impl Default for TwoBoneSettings {
    fn default() -> Self {
        Self {
            mid_axis: Vec3::Z,
            twist_angle: 0.0,
        }
    }
}

/// Output of [`solve_two_bone`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneCorrection {
    /// Local-space correction for the start joint.
    pub start: Quat,
    /// Local-space correction for the mid joint.
    pub mid: Quat,
    /// Whether the target lies within the chain's reach.
    pub reached: bool,
}

/// Solves a two-bone chain (start, mid, end) so the end joint reaches
/// `target`, with the chain plane turned towards `pole`.
///
/// All positions are model space. `pole` is a direction; a zero pole skips
/// pole alignment. Unreachable targets stretch the chain straight towards
/// the target. `weight` is clamped to `[0, 1]` and blends each correction
/// from identity.
///
/// # Errors
///
/// Returns [`KernelError::NonFiniteTarget`] if `target` or `pole` is not
/// finite, and [`KernelError::DegenerateChain`] if either bone has zero length.
pub fn solve_two_bone(
    start: &Mat4,
    mid: &Mat4,
    end: &Mat4,
    target: Vec3,
    pole: Vec3,
    weight: f32,
    settings: &TwoBoneSettings,
) -> Result<TwoBoneCorrection, KernelError> {
    if !target.is_finite() || !pole.is_finite() {
        return Err(KernelError::NonFiniteTarget);
    }

    let (_, start_rot, start_pos) = start.to_scale_rotation_translation();
    let (_, mid_rot, mid_pos) = mid.to_scale_rotation_translation();
    let end_pos = end.w_axis.truncate();

    let upper = mid_pos - start_pos;
    let lower = end_pos - mid_pos;
    let upper_len = upper.length();
    let lower_len = lower.length();
    if upper_len * upper_len < DEGENERATE_LENGTH_SQ || lower_len * lower_len < DEGENERATE_LENGTH_SQ {
        return Err(KernelError::DegenerateChain);
    }

    let to_target = target - start_pos;
    let target_dist = to_target.length();
    let min_reach = (upper_len - lower_len).abs();
    let max_reach = upper_len + lower_len;
    let reached = target_dist >= min_reach - 1e-5 && target_dist <= max_reach + 1e-5;
    let clamped_dist = target_dist.clamp(min_reach, max_reach);

    // Mid joint: open or close the elbow until start-end spans clamped_dist.
    let current = (-upper).angle_between(lower);
    let desired = ((upper_len * upper_len + lower_len * lower_len - clamped_dist * clamped_dist)
        / (2.0 * upper_len * lower_len))
        .clamp(-1.0, 1.0)
        .acos();
    let axis = bend_axis(upper, lower, mid_rot * settings.mid_axis, pole);
    let mid_ms = Quat::from_axis_angle(axis, current - desired);

    // Start joint: swing the corrected end onto the target line.
    let bent_end = upper + mid_ms * lower;
    let swing = if to_target.length_squared() > DEGENERATE_LENGTH_SQ
        && bent_end.length_squared() > DEGENERATE_LENGTH_SQ
    {
        Quat::from_rotation_arc(bent_end.normalize(), to_target.normalize())
    } else {
        Quat::IDENTITY
    };

    let twist = if to_target.length_squared() > DEGENERATE_LENGTH_SQ {
        let target_axis = to_target.normalize();
        let pole_angle = pole_twist(target_axis, swing * upper, pole);
        Quat::from_axis_angle(target_axis, pole_angle + settings.twist_angle)
    } else {
        Quat::IDENTITY
    };
    let start_ms = twist * swing;

    let weight = weight.clamp(0.0, 1.0);
    Ok(TwoBoneCorrection {
        start: weighted(to_local(start_rot, start_ms), weight),
        mid: weighted(to_local(mid_rot, mid_ms), weight),
        reached,
    })
}

/// Rotates `joint` so its local `forward` axis points at `target`.
///
/// `up` (joint local space) picks the rotation axis when the target lies
/// straight behind the joint. A target at the joint position yields identity.
///
/// # Errors
///
/// Returns [`KernelError::NonFiniteTarget`] for a non-finite target and
/// [`KernelError::DegenerateAxis`] if `forward` or `up` has zero length.
pub fn solve_aim(
    joint: &Mat4,
    target: Vec3,
    forward: Vec3,
    up: Vec3,
    weight: f32,
) -> Result<Quat, KernelError> {
    if !target.is_finite() {
        return Err(KernelError::NonFiniteTarget);
    }
    if !forward.is_finite() || forward.length_squared() < DEGENERATE_LENGTH_SQ {
        return Err(KernelError::DegenerateAxis { axis: "forward" });
    }
    if !up.is_finite() || up.length_squared() < DEGENERATE_LENGTH_SQ {
        return Err(KernelError::DegenerateAxis { axis: "up" });
    }

    let (_, rot, pos) = joint.to_scale_rotation_translation();
    let to_target = target - pos;
    if to_target.length_squared() < DEGENERATE_LENGTH_SQ {
        return Ok(Quat::IDENTITY);
    }

    let forward_ms = (rot * forward).normalize();
    let to_target = to_target.normalize();
    let model = if forward_ms.dot(to_target) < -1.0 + 1e-6 {
        let up_ms = (rot * up).reject_from_normalized(forward_ms);
        let axis = if up_ms.length_squared() > DEGENERATE_LENGTH_SQ {
            up_ms.normalize()
        } else {
            forward_ms.any_orthonormal_vector()
        };
        Quat::from_axis_angle(axis, std::f32::consts::PI)
    } else {
        Quat::from_rotation_arc(forward_ms, to_target)
    };

    Ok(weighted(to_local(rot, model), weight.clamp(0.0, 1.0)))
}

/// Picks the model-space axis the mid joint bends around.
fn bend_axis(upper: Vec3, lower: Vec3, mid_axis_ms: Vec3, pole: Vec3) -> Vec3 {
    let plane = upper.cross(lower);
    if plane.length_squared() > DEGENERATE_LENGTH_SQ {
        return plane.normalize();
    }
    // Straight chain: any axis perpendicular to the bones works.
    let upper_dir = upper.normalize();
    let from_mid = mid_axis_ms.reject_from_normalized(upper_dir);
    if from_mid.length_squared() > DEGENERATE_LENGTH_SQ {
        return from_mid.normalize();
    }
    let from_pole = upper_dir.cross(pole);
    if from_pole.length_squared() > DEGENERATE_LENGTH_SQ {
        return from_pole.normalize();
    }
    upper_dir.any_orthonormal_vector()
}

/// Signed angle around `axis` that turns `arm` into the half-plane of `pole`.
fn pole_twist(axis: Vec3, arm: Vec3, pole: Vec3) -> f32 {
    let a = arm.reject_from_normalized(axis);
    let b = pole.reject_from_normalized(axis);
    if a.length_squared() < DEGENERATE_LENGTH_SQ || b.length_squared() < DEGENERATE_LENGTH_SQ {
        return 0.0;
    }
    axis.dot(a.cross(b)).atan2(a.dot(b))
}

#[inline]
fn to_local(joint_rotation: Quat, model_rotation: Quat) -> Quat {
    (joint_rotation.inverse() * model_rotation * joint_rotation).normalize()
}

#[inline]
fn weighted(correction: Quat, weight: f32) -> Quat {
    if weight >= 1.0 {
        correction
    } else {
        Quat::IDENTITY.slerp(correction, weight).normalize()
    }
}
