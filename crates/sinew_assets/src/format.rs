//! # Binary Layout
//!
//! Shared building blocks of the skeleton and clip files: fixed-size Pod
//! records, the CRC32 trailer, and a bounds-checked reader.
//!
//! ```text
//! [header record]
//! [payload records...]
//! [4 bytes: CRC32 of everything above]
//! ```
//!
//! All integers and floats are little-endian.

use std::io;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

/// Magic bytes of a skeleton file.
pub const SKELETON_MAGIC: [u8; 4] = *b"SNSK";

/// Magic bytes of an animation clip file.
pub const ANIMATION_MAGIC: [u8; 4] = *b"SNAN";

/// Current format version of both file kinds.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the CRC32 trailer.
const CRC_LEN: usize = 4;

/// Parent index written for a root joint.
pub(crate) const NO_PARENT: i32 = -1;

/// Skeleton file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SkeletonHeader {
    /// [`SKELETON_MAGIC`].
    pub magic: [u8; 4],
    /// [`FORMAT_VERSION`].
    pub version: u32,
    /// Number of joint records that follow.
    pub num_joints: u32,
    /// Must be zero.
    pub reserved: u32,
}

/// One joint: parent index and rest transform.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct JointRecord {
    /// Parent index, [`NO_PARENT`] for roots.
    pub parent: i32,
    /// Rest translation.
    pub translation: [f32; 3],
    /// Rest rotation as `xyzw`.
    pub rotation: [f32; 4],
    /// Rest scale.
    pub scale: [f32; 3],
}

/// Animation clip file header.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct AnimationHeader {
    /// [`ANIMATION_MAGIC`].
    pub magic: [u8; 4],
    /// [`FORMAT_VERSION`].
    pub version: u32,
    /// Clip length in seconds.
    pub duration: f32,
    /// Number of tracks that follow.
    pub num_tracks: u32,
    /// Byte length of the UTF-8 clip name following the header.
    pub name_len: u32,
}

/// Key counts of one track's three channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TrackHeader {
    /// Translation key count.
    pub translations: u32,
    /// Rotation key count.
    pub rotations: u32,
    /// Scale key count.
    pub scales: u32,
}

/// A translation or scale key.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vec3Key {
    /// Key time in seconds.
    pub time: f32,
    /// Key value.
    pub value: [f32; 3],
}

/// A rotation key, `xyzw`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct QuatKey {
    /// Key time in seconds.
    pub time: f32,
    /// Key value.
    pub value: [f32; 4],
}

/// Builds an [`io::ErrorKind::InvalidData`] error.
pub(crate) fn invalid_data(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

/// Converts a count to its on-disk `u32`.
pub(crate) fn count_u32(count: usize, what: &str) -> io::Result<u32> {
    u32::try_from(count).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} count {count} does not fit in a u32"),
        )
    })
}

/// Appends records to a file image, then seals it with the CRC trailer.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub(crate) fn put<T: Pod>(&mut self, record: &T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(record));
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let crc = crc32fast::hash(&self.bytes);
        self.bytes.extend_from_slice(&crc.to_le_bytes());
        self.bytes
    }
}

/// Sequential reader over a CRC-verified payload.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Checks the CRC trailer and returns a reader over the payload.
    pub(crate) fn verified(file: &'a [u8]) -> io::Result<Self> {
        if file.len() < CRC_LEN {
            return Err(invalid_data("file too short for a CRC trailer"));
        }
        let (payload, trailer) = file.split_at(file.len() - CRC_LEN);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(invalid_data(format!(
                "CRC mismatch: stored {stored:#010x}, computed {computed:#010x}"
            )));
        }
        Ok(Self {
            bytes: payload,
            offset: 0,
        })
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub(crate) fn bytes(&mut self, len: usize) -> io::Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(invalid_data(format!(
                "truncated file: need {len} bytes at offset {}, {} left",
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub(crate) fn read<T: Pod>(&mut self) -> io::Result<T> {
        let bytes = self.bytes(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads `count` records, checking the byte budget before allocating.
    pub(crate) fn read_many<T: Pod>(&mut self, count: u32) -> io::Result<Vec<T>> {
        let count = count as usize;
        let len = count
            .checked_mul(size_of::<T>())
            .ok_or_else(|| invalid_data("record count overflows"))?;
        let bytes = self.bytes(len)?;
        Ok(bytes
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Fails if bytes remain before the trailer.
    pub(crate) fn finish(self) -> io::Result<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(invalid_data(format!(
                "{} trailing bytes after payload",
                self.remaining()
            )))
        }
    }
}

/// Checks magic and version of a header.
pub(crate) fn check_preamble(magic: [u8; 4], expected: [u8; 4], version: u32) -> io::Result<()> {
    if magic != expected {
        return Err(invalid_data(format!(
            "bad magic {:?}, expected {:?}",
            String::from_utf8_lossy(&magic),
            String::from_utf8_lossy(&expected)
        )));
    }
    if version != FORMAT_VERSION {
        return Err(invalid_data(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    Ok(())
}
