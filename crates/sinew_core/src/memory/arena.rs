//! # Arena Layout
//!
//! Deterministic bump layout over a caller-supplied byte buffer.
//!
//! ```text
//! Instance arena:   [ArenaHeader][SoaTransform; S][TrackCursor; N]
//! Workspace arena:  [ArenaHeader][SoaTransform; S][Mat4; N][f32; 12 * N]
//! ```
//!
//! `S` is the SoA group count, `N` the joint count. Each region starts at the
//! natural alignment of its element type; the buffer base must satisfy the
//! largest of them.

use std::mem::{align_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::error::{PoseError, PoseResult};
use crate::kernel::TrackCursor;
use crate::pose::SoaTransform;
use crate::skeleton::Skeleton;
use crate::workspace::PALETTE_STRIDE;

/// Magic number stamped at the start of every carved arena (`"SNAR"`).
pub const ARENA_MAGIC: u32 = u32::from_le_bytes(*b"SNAR");

/// Which consumer an arena is laid out for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConsumerKind {
    /// Persistent per-entity state.
    Instance = 1,
    /// Per-worker scratch.
    Workspace = 2,
}

impl ConsumerKind {
    /// Decodes the value stored in an [`ArenaHeader`].
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Instance),
            2 => Some(Self::Workspace),
            _ => None,
        }
    }
}

/// Size and alignment a caller must provide for one consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaRequirements {
    /// Minimum buffer length in bytes.
    pub size: usize,
    /// Required alignment of the buffer base address.
    pub alignment: usize,
}

/// Bookkeeping record at offset 0 of every carved arena.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ArenaHeader {
    magic: u32,
    kind: u32,
    num_joints: u32,
    num_soa: u32,
    skeleton_id: u64,
}

impl ArenaHeader {
    /// Header for `kind` built against `skeleton`.
    #[must_use]
    pub fn new(kind: ConsumerKind, skeleton: &Skeleton) -> Self {
        Self {
            magic: ARENA_MAGIC,
            kind: kind as u32,
            num_joints: u32::try_from(skeleton.num_joints()).unwrap_or(u32::MAX),
            num_soa: u32::try_from(skeleton.num_soa_joints()).unwrap_or(u32::MAX),
            skeleton_id: skeleton.id(),
        }
    }

    /// True when the magic number is intact.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic == ARENA_MAGIC
    }

    /// Consumer kind, `None` if the stored value is unknown.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Option<ConsumerKind> {
        ConsumerKind::from_u32(self.kind)
    }

    /// Joint count recorded at init.
    #[inline]
    #[must_use]
    pub const fn num_joints(&self) -> u32 {
        self.num_joints
    }

    /// SoA group count recorded at init.
    #[inline]
    #[must_use]
    pub const fn num_soa(&self) -> u32 {
        self.num_soa
    }

    /// Id of the skeleton the arena was carved for.
    #[inline]
    #[must_use]
    pub const fn skeleton_id(&self) -> u64 {
        self.skeleton_id
    }
}

/// Running offset/alignment tally shared by sizing and carving.
#[derive(Clone, Copy, Debug, Default)]
struct Layout {
    offset: usize,
    alignment: usize,
}

impl Layout {
    fn push<T: Pod>(&mut self, count: usize) -> &mut Self {
        let align = align_of::<T>();
        self.offset = self.offset.next_multiple_of(align) + count * size_of::<T>();
        self.alignment = self.alignment.max(align);
        self
    }

    const fn finish(self) -> ArenaRequirements {
        ArenaRequirements {
            size: self.offset,
            alignment: self.alignment,
        }
    }
}

/// Bytes and alignment needed to initialize `kind` against `skeleton`.
///
/// Callable before any consumer exists. The result depends only on the
/// skeleton's joint count.
#[must_use]
pub fn required_bytes(kind: ConsumerKind, skeleton: &Skeleton) -> ArenaRequirements {
    let num_joints = skeleton.num_joints();
    let num_soa = skeleton.num_soa_joints();

    let mut layout = Layout::default();
    layout.push::<ArenaHeader>(1).push::<SoaTransform>(num_soa);
    match kind {
        ConsumerKind::Instance => {
            layout.push::<TrackCursor>(num_joints);
        }
        ConsumerKind::Workspace => {
            layout
                .push::<Mat4>(num_joints)
                .push::<f32>(PALETTE_STRIDE * num_joints);
        }
    }
    layout.finish()
}

/// Splits a checked buffer into typed regions, front to back.
///
/// All size and alignment checks against the requirements happen in
/// [`Carver::new`], so a carve that starts never fails halfway.
pub(crate) struct Carver<'a> {
    rest: &'a mut [u8],
    offset: usize,
}

impl<'a> Carver<'a> {
    /// Validates `buffer` against `requirements`.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if the buffer is too short or its base
    /// address is misaligned.
    pub(crate) fn new(buffer: &'a mut [u8], requirements: ArenaRequirements) -> PoseResult<Self> {
        if buffer.len() < requirements.size {
            return Err(PoseError::invalid(format!(
                "arena buffer too small: need {} bytes, got {}",
                requirements.size,
                buffer.len()
            )));
        }
        if buffer.as_ptr() as usize % requirements.alignment != 0 {
            return Err(PoseError::invalid(format!(
                "arena buffer must be {}-byte aligned",
                requirements.alignment
            )));
        }
        Ok(Self {
            rest: buffer,
            offset: 0,
        })
    }

    /// Takes the next `count` elements of `T`.
    pub(crate) fn take<T: Pod>(&mut self, count: usize) -> PoseResult<&'a mut [T]> {
        let start = self.offset.next_multiple_of(align_of::<T>());
        let padding = start - self.offset;
        let bytes = count * size_of::<T>();

        let rest = std::mem::take(&mut self.rest);
        if rest.len() < padding + bytes {
            return Err(PoseError::invalid("arena region exceeds buffer"));
        }
        let (region, tail) = rest[padding..].split_at_mut(bytes);
        self.rest = tail;
        self.offset = start + bytes;

        bytemuck::try_cast_slice_mut(region)
            .map_err(|err| PoseError::invalid(format!("arena region rejected: {err:?}")))
    }

    /// Takes a single `T`.
    pub(crate) fn take_one<T: Pod>(&mut self) -> PoseResult<&'a mut T> {
        self.take::<T>(1)?
            .first_mut()
            .ok_or_else(|| PoseError::invalid("arena region is empty"))
    }
}

/// An owned, zero-initialized buffer aligned for any arena consumer.
///
/// Backed by 16-byte blocks, so the base address always satisfies
/// [`ArenaRequirements::alignment`] for the layouts in this module.
#[derive(Clone, Debug)]
pub struct ArenaBuffer {
    blocks: Vec<Vec4>,
    len: usize,
}

impl ArenaBuffer {
    /// Allocates a buffer meeting `requirements`.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if the requested alignment exceeds
    /// what the block storage guarantees.
    pub fn new(requirements: ArenaRequirements) -> PoseResult<Self> {
        if requirements.alignment > align_of::<Vec4>() {
            return Err(PoseError::invalid(format!(
                "arena alignment {} exceeds {}",
                requirements.alignment,
                align_of::<Vec4>()
            )));
        }
        let blocks = vec![Vec4::ZERO; requirements.size.div_ceil(size_of::<Vec4>())];
        Ok(Self {
            blocks,
            len: requirements.size,
        })
    }

    /// Allocates a buffer for `kind` against `skeleton`.
    ///
    /// # Errors
    ///
    /// See [`ArenaBuffer::new`].
    pub fn for_consumer(kind: ConsumerKind, skeleton: &Skeleton) -> PoseResult<Self> {
        Self::new(required_bytes(kind, skeleton))
    }

    /// Usable length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length buffer.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read-only byte view.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Vec4, u8>(&self.blocks)[..self.len]
    }

    /// Mutable byte view, ready to pass to `Instance::init` or
    /// `Workspace::init`.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Vec4, u8>(&mut self.blocks)[..self.len]
    }

    /// Zeroes every byte.
    pub fn clear(&mut self) {
        self.blocks.fill(Vec4::ZERO);
    }
}
