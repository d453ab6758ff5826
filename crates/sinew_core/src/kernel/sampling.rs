//! Keyframe sampling into SoA local transforms.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use super::KernelError;
use crate::animation::{AnimationClip, Keyframe};
use crate::pose::{set_joint_transform, soa_count, SoaTransform, Transform};

/// Per-track search hint: the key index each channel resolved to last time.
///
/// Hints only speed up the search. A stale hint (different clip, time went
/// backwards) is detected and replaced, so sharing one cache across the
/// layers of an Instance is safe.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TrackCursor {
    translation: u32,
    rotation: u32,
    scale: u32,
    _padding: u32,
}

/// Samples `clip` at `ratio` (`0` = start, `1` = end) into `output`.
///
/// Lanes past the last track are reset to identity.
///
/// # Errors
///
/// Fails if `output` or `cursors` are too small for the clip, a channel is
/// empty or unsorted, or interpolation yields a non-finite transform.
pub fn sample(
    clip: &AnimationClip,
    ratio: f32,
    cursors: &mut [TrackCursor],
    output: &mut [SoaTransform],
) -> Result<(), KernelError> {
    let num_tracks = clip.track_count();
    let required = soa_count(num_tracks);
    if output.len() < required {
        return Err(KernelError::OutputTooSmall {
            required,
            provided: output.len(),
        });
    }
    if cursors.len() < num_tracks {
        return Err(KernelError::CacheTooSmall {
            required: num_tracks,
            provided: cursors.len(),
        });
    }

    let time = ratio.clamp(0.0, 1.0) * clip.duration();

    for soa in &mut output[..required] {
        *soa = SoaTransform::IDENTITY;
    }

    for (track_index, (track, cursor)) in clip.tracks().iter().zip(cursors.iter_mut()).enumerate() {
        let translation = sample_channel(
            &track.translations,
            time,
            &mut cursor.translation,
            (track_index, "translation"),
            Vec3::lerp,
        )?;
        let rotation = sample_channel(
            &track.rotations,
            time,
            &mut cursor.rotation,
            (track_index, "rotation"),
            Quat::slerp,
        )?;
        let scale = sample_channel(
            &track.scales,
            time,
            &mut cursor.scale,
            (track_index, "scale"),
            Vec3::lerp,
        )?;

        let transform = Transform::new(translation, rotation.normalize(), scale);
        if !transform.is_finite() {
            return Err(KernelError::NonFiniteSample { track: track_index });
        }
        set_joint_transform(output, track_index, &transform);
    }

    Ok(())
}

/// Interpolates one channel at `time`, updating `hint`.
fn sample_channel<T: Copy>(
    keys: &[Keyframe<T>],
    time: f32,
    hint: &mut u32,
    (track, channel): (usize, &'static str),
    interpolate: impl Fn(T, T, f32) -> T,
) -> Result<T, KernelError> {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return Err(KernelError::EmptyChannel { track, channel });
    };
    if !time.is_finite() {
        return Err(KernelError::NonFiniteSample { track });
    }
    if time <= first.time {
        *hint = 0;
        return Ok(first.value);
    }
    if time >= last.time {
        *hint = u32::try_from(keys.len() - 1).unwrap_or(0);
        return Ok(last.value);
    }

    // first.time < time < last.time, so at least two keys exist and the
    // bracket below always has a right neighbour.
    let mut index = *hint as usize;
    if index + 1 >= keys.len() || keys[index].time > time {
        index = keys.partition_point(|k| k.time <= time).saturating_sub(1);
    }
    while index + 2 < keys.len() && keys[index + 1].time <= time {
        if keys[index + 1].time < keys[index].time {
            return Err(KernelError::UnsortedKeys { track, channel });
        }
        index += 1;
    }

    let (Some(&k0), Some(&k1)) = (keys.get(index), keys.get(index + 1)) else {
        return Err(KernelError::UnsortedKeys { track, channel });
    };
    if k1.time < k0.time || k0.time > time {
        return Err(KernelError::UnsortedKeys { track, channel });
    }
    *hint = u32::try_from(index).unwrap_or(0);

    let span = k1.time - k0.time;
    let alpha = if span > 0.0 {
        ((time - k0.time) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    Ok(interpolate(k0.value, k1.value, alpha))
}
