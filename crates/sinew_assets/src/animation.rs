//! # Animation Clip Files
//!
//! ```text
//! [20 bytes: AnimationHeader "SNAN", version, duration, track count, name length]
//! [name_len bytes: UTF-8 clip name]
//! per track:
//!   [12 bytes: TrackHeader key counts]
//!   [16 bytes x T: Vec3Key translations]
//!   [20 bytes x R: QuatKey rotations]
//!   [16 bytes x S: Vec3Key scales]
//! [4 bytes: CRC32]
//! ```
//!
//! Key order is written as stored. Unsorted or empty channels load fine and
//! fail when sampled.

use std::fs;
use std::path::Path;

use glam::{Quat, Vec3};
use sinew_core::{AnimationClip, JointTrack, Keyframe, PoseError, PoseResult};

use crate::format::{
    check_preamble, count_u32, invalid_data, AnimationHeader, QuatKey, Reader, TrackHeader,
    Vec3Key, Writer, ANIMATION_MAGIC, FORMAT_VERSION,
};

fn vec3_keys(keys: &[Keyframe<Vec3>]) -> impl Iterator<Item = Vec3Key> + '_ {
    keys.iter().map(|key| Vec3Key {
        time: key.time,
        value: key.value.to_array(),
    })
}

/// Serializes a clip to its file image.
///
/// # Errors
///
/// [`PoseError::Io`] if a count does not fit the format.
pub fn encode_animation(clip: &AnimationClip) -> PoseResult<Vec<u8>> {
    let mut writer = Writer::default();
    writer.put(&AnimationHeader {
        magic: ANIMATION_MAGIC,
        version: FORMAT_VERSION,
        duration: clip.duration(),
        num_tracks: count_u32(clip.track_count(), "track")?,
        name_len: count_u32(clip.name().len(), "name byte")?,
    });
    writer.put_bytes(clip.name().as_bytes());

    for track in clip.tracks() {
        writer.put(&TrackHeader {
            translations: count_u32(track.translations.len(), "key")?,
            rotations: count_u32(track.rotations.len(), "key")?,
            scales: count_u32(track.scales.len(), "key")?,
        });
        for key in vec3_keys(&track.translations) {
            writer.put(&key);
        }
        for key in &track.rotations {
            writer.put(&QuatKey {
                time: key.time,
                value: key.value.to_array(),
            });
        }
        for key in vec3_keys(&track.scales) {
            writer.put(&key);
        }
    }

    Ok(writer.finish())
}

/// Parses a clip file image.
///
/// # Errors
///
/// [`PoseError::Io`] of kind `InvalidData` on a bad magic, version or CRC, a
/// truncated or oversized payload, a non-UTF-8 name, or a duration the clip
/// constructor rejects.
pub fn decode_animation(bytes: &[u8]) -> PoseResult<AnimationClip> {
    let mut reader = Reader::verified(bytes)?;
    let header: AnimationHeader = reader.read()?;
    check_preamble(header.magic, ANIMATION_MAGIC, header.version)?;

    let raw_name = reader.bytes(header.name_len as usize)?;
    let name = std::str::from_utf8(raw_name)
        .map_err(|err| invalid_data(format!("clip name is not UTF-8: {err}")))?;

    // Every track costs at least its header, so a lying count fails here
    // instead of reserving a huge Vec.
    let mut tracks = Vec::new();
    for _ in 0..header.num_tracks {
        let counts: TrackHeader = reader.read()?;
        let translations: Vec<Vec3Key> = reader.read_many(counts.translations)?;
        let rotations: Vec<QuatKey> = reader.read_many(counts.rotations)?;
        let scales: Vec<Vec3Key> = reader.read_many(counts.scales)?;
        tracks.push(JointTrack {
            translations: translations
                .iter()
                .map(|key| Keyframe::new(key.time, Vec3::from_array(key.value)))
                .collect(),
            rotations: rotations
                .iter()
                .map(|key| Keyframe::new(key.time, Quat::from_array(key.value)))
                .collect(),
            scales: scales
                .iter()
                .map(|key| Keyframe::new(key.time, Vec3::from_array(key.value)))
                .collect(),
        });
    }
    reader.finish()?;

    AnimationClip::new(name, header.duration, tracks).map_err(|err| match err {
        PoseError::InvalidArgument(reason) => invalid_data(reason).into(),
        other => other,
    })
}

/// Reads and parses a clip file.
///
/// # Errors
///
/// [`PoseError::Io`] if the file cannot be read or fails [`decode_animation`].
pub fn load_animation(path: impl AsRef<Path>) -> PoseResult<AnimationClip> {
    let path = path.as_ref();
    let clip = decode_animation(&fs::read(path)?)?;
    tracing::debug!(
        path = %path.display(),
        name = clip.name(),
        tracks = clip.track_count(),
        duration = clip.duration(),
        "loaded animation"
    );
    Ok(clip)
}

/// Encodes and writes a clip file.
///
/// # Errors
///
/// [`PoseError::Io`] if encoding or the write fails.
pub fn save_animation(path: impl AsRef<Path>, clip: &AnimationClip) -> PoseResult<()> {
    fs::write(path, encode_animation(clip)?)?;
    Ok(())
}
