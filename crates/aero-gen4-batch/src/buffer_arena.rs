use std::fmt;

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be a power of two. Returns `None` if the rounded value does not
/// fit in a `u32` (Gen4 state offsets are 32-bit).
pub(crate) fn align_up(value: u32, alignment: u32) -> Option<u32> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// Linear sub-allocator over one state segment.
///
/// Offsets are relative to the start of the segment, which is also the start of the
/// buffer the GPU sees for that submission. Only offsets are tracked; the bytes live in
/// [`crate::StateBatch`].
#[derive(Clone)]
pub struct BufferArena {
    capacity: u32,
    cursor: u32,
    allocations: u32,
}

impl BufferArena {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            cursor: 0,
            allocations: 0,
        }
    }

    /// Forget every allocation. Called when a segment is reused after retirement.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.allocations = 0;
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes in use, including alignment padding.
    pub fn used(&self) -> u32 {
        self.cursor
    }

    pub fn remaining(&self) -> u32 {
        self.capacity - self.cursor
    }

    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// Whether a `size`-byte allocation would fit in an empty arena of this capacity.
    ///
    /// Offset 0 satisfies every alignment, so only the size matters.
    pub fn could_ever_fit(&self, size: u32) -> bool {
        size <= self.capacity
    }

    /// Allocate `size` bytes aligned to `alignment` (a power of two).
    ///
    /// Returns the segment-relative offset, or `None` if the arena cannot satisfy the
    /// request.
    pub fn alloc(&mut self, size: u32, alignment: u32) -> Option<u32> {
        let alignment = alignment.max(1);
        let offset = align_up(self.cursor, alignment)?;
        let end = offset.checked_add(size)?;
        if end > self.capacity {
            return None;
        }

        self.cursor = end;
        self.allocations += 1;
        Some(offset)
    }
}

impl fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferArena")
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .field("allocations", &self.allocations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 32), Some(0));
        assert_eq!(align_up(1, 32), Some(32));
        assert_eq!(align_up(32, 32), Some(32));
        assert_eq!(align_up(33, 64), Some(64));
        assert_eq!(align_up(u32::MAX, 64), None);
    }

    #[test]
    fn arena_alloc_respects_alignment_and_capacity() {
        let mut arena = BufferArena::new(128);

        assert_eq!(arena.alloc(4, 4), Some(0));
        // 32-byte viewport block after a 4-byte allocation lands on the next boundary.
        assert_eq!(arena.alloc(32, 32), Some(32));
        // 64-byte aligned unit state.
        assert_eq!(arena.alloc(32, 64), Some(64));
        assert_eq!(arena.used(), 96);
        assert_eq!(arena.remaining(), 32);
        assert_eq!(arena.allocations(), 3);

        assert_eq!(arena.alloc(33, 1), None);
        // A failed allocation leaves the cursor untouched.
        assert_eq!(arena.used(), 96);
    }

    #[test]
    fn arena_reset_reuses_space() {
        let mut arena = BufferArena::new(64);
        assert_eq!(arena.alloc(32, 32), Some(0));
        assert_eq!(arena.alloc(32, 32), Some(32));
        assert_eq!(arena.alloc(1, 1), None);

        arena.reset();
        assert_eq!(arena.allocations(), 0);
        assert_eq!(arena.alloc(32, 32), Some(0));
    }
}
