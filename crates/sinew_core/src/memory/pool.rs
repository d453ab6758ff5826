//! # Arena Pool
//!
//! Fixed-capacity pool of equally sized [`ArenaBuffer`]s.

use super::arena::{required_bytes, ArenaBuffer, ArenaRequirements, ConsumerKind};
use crate::error::{PoseError, PoseResult};
use crate::skeleton::Skeleton;

/// A pool of pre-allocated arena buffers.
///
/// Buffers can be leased and released individually; all share one
/// [`ArenaRequirements`]. Entities come and go, their Instance memory is
/// recycled instead of reallocated.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Lease on one thread, then hand the leased
/// buffers to workers.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ArenaPool::for_consumer(ConsumerKind::Instance, &skeleton, 1024)?;
///
/// // Lease - O(1), no heap allocation
/// let handle = pool.lease().ok_or(...)?;
/// let instance = Instance::init(pool.buffer_mut(handle)?.as_bytes_mut(), skeleton)?;
///
/// // Release - O(1), the bytes stay allocated
/// pool.release(handle);
/// ```
#[derive(Debug)]
pub struct ArenaPool {
    /// Buffer storage, one per slot.
    buffers: Box<[ArenaBuffer]>,
    /// Lease flag per slot.
    leased: Box<[bool]>,
    /// Free list - indices of available slots.
    free_list: Vec<usize>,
    /// Number of leased buffers.
    leased_count: usize,
    /// Shared requirements.
    requirements: ArenaRequirements,
}

/// Handle to a leased buffer in an [`ArenaPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaHandle {
    /// Index into the pool.
    index: usize,
}

impl ArenaHandle {
    /// Slot index inside the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl ArenaPool {
    /// Creates a pool of `capacity` buffers meeting `requirements`.
    ///
    /// All memory is allocated upfront.
    ///
    /// # Arguments
    ///
    /// * `requirements` - Size and alignment of every buffer
    /// * `capacity` - Number of buffers
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] for a zero capacity or an alignment the
    /// buffers cannot satisfy.
    pub fn new(requirements: ArenaRequirements, capacity: usize) -> PoseResult<Self> {
        if capacity == 0 {
            return Err(PoseError::invalid("arena pool capacity must be greater than zero"));
        }
        let buffers = (0..capacity)
            .map(|_| ArenaBuffer::new(requirements))
            .collect::<PoseResult<Vec<_>>>()?;

        Ok(Self {
            buffers: buffers.into_boxed_slice(),
            leased: vec![false; capacity].into_boxed_slice(),
            free_list: (0..capacity).rev().collect(),
            leased_count: 0,
            requirements,
        })
    }

    /// Creates a pool sized for `kind` against `skeleton`.
    ///
    /// # Errors
    ///
    /// See [`ArenaPool::new`].
    pub fn for_consumer(kind: ConsumerKind, skeleton: &Skeleton, capacity: usize) -> PoseResult<Self> {
        Self::new(required_bytes(kind, skeleton), capacity)
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the number of leased buffers.
    #[inline]
    #[must_use]
    pub const fn leased_count(&self) -> usize {
        self.leased_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.leased_count
    }

    /// Requirements every buffer was built for.
    #[inline]
    #[must_use]
    pub const fn requirements(&self) -> ArenaRequirements {
        self.requirements
    }

    /// Leases a free buffer, zeroing it first.
    ///
    /// Returns `None` if the pool is exhausted.
    pub fn lease(&mut self) -> Option<ArenaHandle> {
        let index = self.free_list.pop()?;
        self.buffers[index].clear();
        self.leased[index] = true;
        self.leased_count += 1;
        Some(ArenaHandle { index })
    }

    /// Returns a leased buffer to the pool.
    ///
    /// Returns `false` if the handle was not leased.
    pub fn release(&mut self, handle: ArenaHandle) -> bool {
        match self.leased.get_mut(handle.index) {
            Some(leased) if *leased => {
                *leased = false;
                self.free_list.push(handle.index);
                self.leased_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Mutable access to a leased buffer.
    #[inline]
    pub fn buffer_mut(&mut self, handle: ArenaHandle) -> Option<&mut ArenaBuffer> {
        if *self.leased.get(handle.index)? {
            self.buffers.get_mut(handle.index)
        } else {
            None
        }
    }

    /// Releases every buffer.
    pub fn clear(&mut self) {
        self.leased.fill(false);
        self.free_list.clear();
        self.free_list.extend((0..self.capacity()).rev());
        self.leased_count = 0;
    }

    /// Iterates mutably over all leased buffers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArenaHandle, &mut ArenaBuffer)> {
        self.buffers
            .iter_mut()
            .zip(self.leased.iter())
            .enumerate()
            .filter_map(|(index, (buffer, leased))| {
                leased.then_some((ArenaHandle { index }, buffer))
            })
    }
}
