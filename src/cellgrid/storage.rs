// A contiguous buffer sliced into one range per grid cell.
// Cells do not own their slices; `CellSliceMeta` only records a range into `CellStorage`
// and a cursor, so out-of-range access panics instead of being unsound.
// Reusing the buffer across rebuilds avoids re-allocating one `Vec` per cell.
use core::ops::Range;

#[derive(Debug, Clone)]
pub struct CellStorage<T> {
    buffer: Vec<T>,
}

impl<T> Default for CellStorage<T> {
    fn default() -> Self {
        Self { buffer: Vec::new() }
    }
}

impl<T> CellStorage<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn cell_slice(&self, metadata: &CellSliceMeta) -> &[T] {
        &self.buffer[metadata.range.start..metadata.range.start + metadata.cursor]
    }

    /// Write `value` at the cursor position of the cell described by `metadata`.
    ///
    /// Panics if the cell is already full.
    pub fn push(&mut self, value: T, metadata: &mut CellSliceMeta) {
        let position = metadata.range.start + metadata.cursor;
        metadata.move_cursor(1);
        self.buffer[position] = value;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops all contents but keeps the allocation.
    pub fn clear(&mut self) {
        self.buffer.clear()
    }
}

impl<T: Clone> CellStorage<T> {
    /// Append a range of `capacity` copies of `filler` for a new cell.
    ///
    /// `filler` is only a placeholder until the cell gets filled by [`CellStorage::push`].
    pub fn reserve_cell(&mut self, capacity: usize, filler: &T) -> CellSliceMeta {
        let range = self.buffer.len()..(self.buffer.len() + capacity);
        self.buffer.resize(range.end, filler.clone());

        CellSliceMeta::new(range)
    }
}

/// Location of one cell's slice inside [`CellStorage`].
///
/// Before a range is reserved, the cursor doubles as a counter of the cell's members.
// bounds are checked by CellStorage, not here
#[derive(Debug, Default, Clone)]
pub struct CellSliceMeta {
    cursor: usize,
    range: Range<usize>,
}

impl CellSliceMeta {
    fn new(range: Range<usize>) -> Self {
        Self { cursor: 0, range }
    }

    /// Reset the cursor so the cell can be refilled in place.
    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.range.len()
    }

    /// Count one more member of a cell whose range has not been reserved yet.
    pub(crate) fn count(&mut self) {
        self.cursor += 1;
    }

    pub fn move_cursor(&mut self, steps: usize) {
        assert!(
            self.cursor + steps <= self.range.len(),
            "cell slice overflow ({} + {steps} > {})",
            self.cursor,
            self.range.len()
        );
        self.cursor += steps;
    }
}
