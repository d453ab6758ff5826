//! # Skeleton Files
//!
//! ```text
//! [16 bytes: SkeletonHeader "SNSK", version, joint count, reserved]
//! [44 bytes x N: JointRecord (parent, translation, rotation, scale)]
//! [per joint: 4 bytes name length + UTF-8 name]
//! [4 bytes: CRC32]
//! ```

use std::fs;
use std::path::Path;

use glam::{Quat, Vec3};
use sinew_core::{PoseError, PoseResult, Skeleton, Transform};

use crate::format::{
    check_preamble, count_u32, invalid_data, JointRecord, Reader, SkeletonHeader, Writer,
    FORMAT_VERSION, NO_PARENT, SKELETON_MAGIC,
};

/// Serializes a skeleton to its file image.
///
/// # Errors
///
/// [`PoseError::Io`] if a count or name length does not fit the format.
pub fn encode_skeleton(skeleton: &Skeleton) -> PoseResult<Vec<u8>> {
    let mut writer = Writer::default();
    writer.put(&SkeletonHeader {
        magic: SKELETON_MAGIC,
        version: FORMAT_VERSION,
        num_joints: count_u32(skeleton.num_joints(), "joint")?,
        reserved: 0,
    });

    for (parent, rest) in skeleton.parents().iter().zip(skeleton.rest_pose()) {
        let parent = match parent {
            Some(index) => i32::try_from(*index)
                .map_err(|_| invalid_data(format!("parent index {index} does not fit in an i32")))?,
            None => NO_PARENT,
        };
        writer.put(&JointRecord {
            parent,
            translation: rest.translation.to_array(),
            rotation: rest.rotation.to_array(),
            scale: rest.scale.to_array(),
        });
    }

    for name in skeleton.joint_names() {
        writer.put(&count_u32(name.len(), "name byte")?);
        writer.put_bytes(name.as_bytes());
    }

    Ok(writer.finish())
}

/// Parses a skeleton file image.
///
/// # Errors
///
/// [`PoseError::Io`] of kind `InvalidData` on a bad magic, version or CRC, a
/// truncated or oversized payload, a non-UTF-8 name, or a hierarchy the
/// skeleton constructor rejects.
pub fn decode_skeleton(bytes: &[u8]) -> PoseResult<Skeleton> {
    let mut reader = Reader::verified(bytes)?;
    let header: SkeletonHeader = reader.read()?;
    check_preamble(header.magic, SKELETON_MAGIC, header.version)?;
    if header.reserved != 0 {
        return Err(invalid_data("reserved skeleton header field is not zero").into());
    }

    let records: Vec<JointRecord> = reader.read_many(header.num_joints)?;
    let mut parents = Vec::with_capacity(records.len());
    let mut rest_pose = Vec::with_capacity(records.len());
    for (joint, record) in records.iter().enumerate() {
        let parent = match record.parent {
            NO_PARENT => None,
            index => Some(usize::try_from(index).map_err(|_| {
                invalid_data(format!("joint {joint} has parent index {index}"))
            })?),
        };
        parents.push(parent);
        rest_pose.push(Transform::new(
            Vec3::from_array(record.translation),
            Quat::from_array(record.rotation),
            Vec3::from_array(record.scale),
        ));
    }

    let mut names = Vec::with_capacity(records.len());
    for joint in 0..records.len() {
        let len: u32 = reader.read()?;
        let raw = reader.bytes(len as usize)?;
        let name = std::str::from_utf8(raw)
            .map_err(|err| invalid_data(format!("joint {joint} name is not UTF-8: {err}")))?;
        names.push(name.to_owned());
    }
    reader.finish()?;

    Skeleton::new(names, parents, rest_pose).map_err(|err| match err {
        PoseError::InvalidArgument(reason) => invalid_data(reason).into(),
        other => other,
    })
}

/// Reads and parses a skeleton file.
///
/// # Errors
///
/// [`PoseError::Io`] if the file cannot be read or fails [`decode_skeleton`].
pub fn load_skeleton(path: impl AsRef<Path>) -> PoseResult<Skeleton> {
    let path = path.as_ref();
    let skeleton = decode_skeleton(&fs::read(path)?)?;
    tracing::debug!(
        path = %path.display(),
        joints = skeleton.num_joints(),
        id = skeleton.id(),
        "loaded skeleton"
    );
    Ok(skeleton)
}

/// Encodes and writes a skeleton file.
///
/// # Errors
///
/// [`PoseError::Io`] if encoding or the write fails.
pub fn save_skeleton(path: impl AsRef<Path>, skeleton: &Skeleton) -> PoseResult<()> {
    fs::write(path, encode_skeleton(skeleton)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::io;

    use sinew_core::procedural::chain_skeleton;

    use super::*;

    fn io_kind(err: &PoseError) -> Option<io::ErrorKind> {
        match err {
            PoseError::Io(io) => Some(io.kind()),
            _ => None,
        }
    }

    fn branching() -> Skeleton {
        Skeleton::new(
            vec!["hips".into(), "spine".into(), "left_leg".into(), "right_leg".into()],
            vec![None, Some(0), Some(0), Some(0)],
            vec![
                Transform::IDENTITY,
                Transform::from_translation(Vec3::Y),
                Transform::new(
                    Vec3::new(-0.2, -0.1, 0.0),
                    Quat::from_rotation_z(FRAC_PI_2),
                    Vec3::splat(1.5),
                ),
                Transform::from_translation(Vec3::new(0.2, -0.1, 0.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decode_restores_hierarchy() {
        let original = branching();
        let decoded = decode_skeleton(&encode_skeleton(&original).unwrap()).unwrap();

        assert_eq!(decoded.parents(), original.parents());
        assert_eq!(decoded.joint_names(), original.joint_names());
        assert_eq!(decoded.rest_pose(), original.rest_pose());
        assert_eq!(decoded.find_joint("left_leg"), Some(2));
        assert_ne!(decoded.id(), original.id());
    }

    #[test]
    fn test_file_size() {
        let skeleton = chain_skeleton(3, 1.0).unwrap();
        let bytes = encode_skeleton(&skeleton).unwrap();
        // Header, joints, three "joint_i" names, CRC.
        assert_eq!(bytes.len(), 16 + 3 * 44 + 3 * (4 + 7) + 4);
    }

    #[test]
    fn test_corruption_is_invalid_data() {
        let mut bytes = encode_skeleton(&branching()).unwrap();
        bytes[20] ^= 0x01;
        let err = decode_skeleton(&bytes).unwrap_err();
        assert_eq!(io_kind(&err), Some(io::ErrorKind::InvalidData));
    }

    #[test]
    fn test_truncation_is_invalid_data() {
        let bytes = encode_skeleton(&branching()).unwrap();
        let mut writer = Writer::default();
        writer.put_bytes(&bytes[..40]);
        let err = decode_skeleton(&writer.finish()).unwrap_err();
        assert_eq!(io_kind(&err), Some(io::ErrorKind::InvalidData));
    }

    #[test]
    fn test_bad_hierarchy_is_invalid_data() {
        let mut writer = Writer::default();
        writer.put(&SkeletonHeader {
            magic: SKELETON_MAGIC,
            version: FORMAT_VERSION,
            num_joints: 1,
            reserved: 0,
        });
        writer.put(&JointRecord {
            parent: 3,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        });
        writer.put(&1_u32);
        writer.put_bytes(b"a");
        let err = decode_skeleton(&writer.finish()).unwrap_err();
        assert_eq!(io_kind(&err), Some(io::ErrorKind::InvalidData));
    }

    #[test]
    fn test_wrong_magic() {
        let mut writer = Writer::default();
        writer.put(&SkeletonHeader {
            magic: *b"SNAN",
            version: FORMAT_VERSION,
            num_joints: 0,
            reserved: 0,
        });
        assert!(decode_skeleton(&writer.finish()).is_err());
    }
}
