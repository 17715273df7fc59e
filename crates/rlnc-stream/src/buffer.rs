//! # Encoder Symbol Buffer
//!
//! Circular buffer of not-yet-acknowledged source symbols, addressed by
//! source id. Ids are contiguous, `[head_id, tail_id]`. When full the
//! capacity doubles and the wrapped prefix is relocated past the old end, so
//! the id → slot mapping stays `(head + id - head_id) % capacity`.

use bytes::Bytes;

/// Initial number of slots.
pub const INITIAL_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct SymbolBuffer {
    slots: Vec<Option<Bytes>>,
    /// Slot of `head_id`.
    head: usize,
    len: usize,
    head_id: u32,
}

impl SymbolBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0);
        SymbolBuffer {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
            head_id: 0,
        }
    }

    /// Append the symbols for `id`, which must follow `tail_id` unless the
    /// buffer is empty. Returns `true` if the buffer had to grow.
    pub fn push(&mut self, id: u32, symbols: Bytes) -> bool {
        if self.len == 0 {
            self.head = 0;
            self.head_id = id;
            self.slots[0] = Some(symbols);
            self.len = 1;
            return false;
        }
        debug_assert_eq!(Some(id), self.tail_id().map(|t| t + 1));

        let grew = self.len == self.slots.len();
        if grew {
            self.grow();
        }
        let pos = (self.head + self.len) % self.slots.len();
        self.slots[pos] = Some(symbols);
        self.len += 1;
        grew
    }

    fn grow(&mut self) {
        let old = self.slots.len();
        self.slots.resize(old * 2, None);
        // Entries that wrapped to the front move to just past the old end.
        let wrapped = (self.head + self.len).saturating_sub(old);
        for i in 0..wrapped {
            self.slots[old + i] = self.slots[i].take();
        }
    }

    /// Symbols for `id`, if buffered.
    pub fn get(&self, id: u32) -> Option<&Bytes> {
        let offset = self.offset_of(id)?;
        self.slots[(self.head + offset) % self.slots.len()].as_ref()
    }

    /// Buffered symbols for `start..=end`, in id order. Ids outside the
    /// buffer are skipped.
    pub fn range(&self, start: u32, end: u32) -> impl Iterator<Item = &Bytes> + '_ {
        (start..=end).filter_map(move |id| self.get(id))
    }

    /// Release every id `<= ack_id`. Returns the number of slots freed.
    pub fn release_through(&mut self, ack_id: u32) -> usize {
        let Some(tail_id) = self.tail_id() else {
            return 0;
        };
        if ack_id < self.head_id {
            return 0;
        }
        let last = ack_id.min(tail_id);
        let count = (last - self.head_id) as usize + 1;
        let cap = self.slots.len();
        for i in 0..count {
            self.slots[(self.head + i) % cap] = None;
        }
        if count == self.len {
            self.head = 0;
            self.len = 0;
        } else {
            self.head = (self.head + count) % cap;
            self.len -= count;
        }
        self.head_id = last + 1;
        count
    }

    pub fn head_id(&self) -> Option<u32> {
        (self.len > 0).then_some(self.head_id)
    }

    pub fn tail_id(&self) -> Option<u32> {
        (self.len > 0).then(|| self.head_id + self.len as u32 - 1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn offset_of(&self, id: u32) -> Option<usize> {
        if self.len == 0 || id < self.head_id {
            return None;
        }
        let offset = (id - self.head_id) as usize;
        (offset < self.len).then_some(offset)
    }
}

impl Default for SymbolBuffer {
    fn default() -> Self {
        Self::new()
    }
}
