//! # Fixed-Capacity Ring Buffer
//!
//! Zero-initialised circular storage backing both the signal window and the
//! peak history. Capacity is a const generic, so the whole buffer lives inline
//! in its owner and nothing is allocated after construction.
//!
//! All modular index arithmetic in the crate happens here. Callers address
//! slots relative to the newest entry (`at`) or by role (`newest`, `oldest`).

/// Circular buffer of `N` slots that overwrites the oldest entry on push.
///
/// Every slot starts as `T::default()`, so the buffer is always "full" from
/// the reader's point of view; owners that care about real entries track
/// that count themselves.
#[derive(Debug, Clone)]
pub struct Ring<T, const N: usize> {
    slots: [T; N],
    /// Next slot to be overwritten, always in `0..N`
    write_pos: usize,
}

impl<T: Copy + Default, const N: usize> Ring<T, N> {
    const NON_EMPTY: () = assert!(N > 0, "ring capacity must be at least 1");

    pub fn new() -> Self {
        let _ = Self::NON_EMPTY;
        Self {
            slots: [T::default(); N],
            write_pos: 0,
        }
    }

    /// Overwrite the oldest slot and advance the cursor.
    pub fn push(&mut self, value: T) {
        self.slots[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % N;
    }

    /// Value pushed `offset` pushes before the most recent one.
    ///
    /// `at(0)` is the newest entry. Panics if `offset >= N`: offsets are
    /// compile-time constants of the callers, so a bad one is a bug.
    pub fn at(&self, offset: usize) -> T {
        assert!(offset < N, "ring offset {} out of range for capacity {}", offset, N);
        self.slots[(self.write_pos + N - 1 - offset) % N]
    }

    pub fn newest(&self) -> T {
        self.at(0)
    }

    /// Least recently written entry still resident (the next one to go).
    pub fn oldest(&self) -> T {
        self.slots[self.write_pos]
    }

    /// Iterate from oldest to newest.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots[self.write_pos..]
            .iter()
            .chain(self.slots[..self.write_pos].iter())
    }
}

impl<T: Copy + Default + Ord, const N: usize> Ring<T, N> {
    /// Smallest stored value, linear scan over all `N` slots.
    pub fn min(&self) -> T {
        self.slots.iter().copied().fold(self.slots[0], T::min)
    }

    /// Largest stored value, linear scan over all `N` slots.
    pub fn max(&self) -> T {
        self.slots.iter().copied().fold(self.slots[0], T::max)
    }
}

impl<T: Copy + Default, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
