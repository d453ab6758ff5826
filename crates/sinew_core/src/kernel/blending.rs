//! Weighted and additive blending of SoA poses.
//!
//! Both jobs write back into their first argument, so the evaluator can
//! stream any number of layers through one accumulation buffer.

use glam::Vec4;

use super::KernelError;
use crate::pose::{SoaFloat3, SoaQuaternion, SoaTransform};

/// Blends `layer` into `base` as a normalized weighted average.
///
/// `base` counts with `base_weight` (usually the running sum of every layer
/// already folded into it), `layer` with `weight`. Rotations are sign-aligned
/// to `base` before the nlerp. When the combined weight is below `threshold`,
/// `rest_pose` makes up the difference.
///
/// # Errors
///
/// Fails if the three buffers differ in length, a weight is negative or not
/// finite, or the effective total weight is zero.
pub fn blend_into(
    base: &mut [SoaTransform],
    base_weight: f32,
    layer: &[SoaTransform],
    weight: f32,
    rest_pose: &[SoaTransform],
    threshold: f32,
) -> Result<(), KernelError> {
    check_len(base.len(), layer.len())?;
    check_len(base.len(), rest_pose.len())?;
    if !valid_weight(base_weight) || !valid_weight(weight) || !valid_weight(threshold) {
        return Err(KernelError::InvalidWeight);
    }

    // Weights are rescaled by their maximum first, so huge finite weights
    // never overflow the sums below.
    let largest = base_weight.max(weight).max(threshold);
    if largest <= 0.0 {
        return Err(KernelError::InvalidWeight);
    }
    let (base_weight, weight, threshold) = (base_weight / largest, weight / largest, threshold / largest);
    let combined = base_weight + weight;
    let rest_weight = (threshold - combined).max(0.0);
    let total = combined + rest_weight;
    if total <= 0.0 {
        return Err(KernelError::InvalidWeight);
    }

    let wa = Vec4::splat(base_weight / total);
    let wb = Vec4::splat(weight / total);
    let wr = Vec4::splat(rest_weight / total);

    for ((acc, other), rest) in base.iter_mut().zip(layer).zip(rest_pose) {
        let other_rotation_weight = wb * hemisphere_sign(&acc.rotation, &other.rotation);

        let mut rotation = acc.rotation.weighted_sum(wa, other.rotation, other_rotation_weight);
        let mut translation = acc.translation.weighted_sum(wa, other.translation, wb);
        let mut scale = acc.scale.weighted_sum(wa, other.scale, wb);

        if rest_weight > 0.0 {
            let rest_rotation_weight = wr * hemisphere_sign(&rotation, &rest.rotation);
            rotation = rotation.weighted_sum(Vec4::ONE, rest.rotation, rest_rotation_weight);
            translation = translation.weighted_sum(Vec4::ONE, rest.translation, wr);
            scale = scale.weighted_sum(Vec4::ONE, rest.scale, wr);
        }

        acc.translation = translation;
        acc.scale = scale;
        acc.rotation = rotation.normalize();
    }
    Ok(())
}

/// Composes `addend` onto `base` as a delta scaled by `weight`.
///
/// Per joint: translation `+= t * w`, rotation `= nlerp(identity, q, w) *
/// rotation`, scale `*= lerp(1, s, w)`. The delta is applied on the left, so a
/// sequence of additive layers is order-dependent.
///
/// # Errors
///
/// Fails if the buffers differ in length or `weight` is not finite.
#[allow(clippy::float_cmp)]
pub fn blend_additive_into(
    base: &mut [SoaTransform],
    addend: &[SoaTransform],
    weight: f32,
) -> Result<(), KernelError> {
    check_len(base.len(), addend.len())?;
    if !weight.is_finite() {
        return Err(KernelError::InvalidWeight);
    }
    if weight == 0.0 {
        return Ok(());
    }

    let w = Vec4::splat(weight);
    for (acc, add) in base.iter_mut().zip(addend) {
        // Take the shortest arc of the delta before scaling it.
        let sign = add.rotation.w.signum();
        let delta = SoaQuaternion {
            x: add.rotation.x * sign * w,
            y: add.rotation.y * sign * w,
            z: add.rotation.z * sign * w,
            w: (add.rotation.w * sign - Vec4::ONE) * w + Vec4::ONE,
        }
        .normalize();

        acc.rotation = delta.compose(acc.rotation).normalize();
        acc.translation = acc.translation.weighted_sum(Vec4::ONE, add.translation, w);
        acc.scale = SoaFloat3 {
            x: acc.scale.x * ((add.scale.x - Vec4::ONE) * w + Vec4::ONE),
            y: acc.scale.y * ((add.scale.y - Vec4::ONE) * w + Vec4::ONE),
            z: acc.scale.z * ((add.scale.z - Vec4::ONE) * w + Vec4::ONE),
        };
    }
    Ok(())
}

/// Per-lane `+1` / `-1` so that `b * sign` lies in the same hemisphere as `a`.
#[inline]
fn hemisphere_sign(a: &SoaQuaternion, b: &SoaQuaternion) -> Vec4 {
    let dot = a.dot(b);
    Vec4::select(dot.cmplt(Vec4::ZERO), Vec4::NEG_ONE, Vec4::ONE)
}

#[inline]
fn valid_weight(weight: f32) -> bool {
    weight.is_finite() && weight >= 0.0
}

#[inline]
fn check_len(expected: usize, found: usize) -> Result<(), KernelError> {
    if expected == found {
        Ok(())
    } else {
        Err(KernelError::LayerSizeMismatch { expected, found })
    }
}
