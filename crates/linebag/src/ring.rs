use crate::invariants::{
    debug_assert_can_seal, debug_assert_cursor_advance, debug_assert_drain_sealed,
    debug_assert_index_in_range,
};
use crate::{BagError, Config, Metrics};
use std::fmt;
use std::io::{self, Read, Write};
use std::ops::Range;

// =============================================================================
// SLOT DISCIPLINE
// =============================================================================
//
// The ring holds `slots` fixed-capacity byte slots in one contiguous region.
// Two indices describe occupancy:
//
// - `tail`: the slot currently being filled from the producer.
// - `head + 1`: the slot currently being drained to the consumer.
//
// One slot is sacrificed so that two indices can tell empty from full:
// - Full:  `head == tail`              (no slot to fill, input stalls)
// - Empty: `head + 1 == tail (mod n)`  (nothing sealed, output stalls)
//
// Each slot carries a `len` and a `cursor`:
// - Filling:  `len == capacity`, `cursor` = bytes received so far.
// - Sealed:   `len` = bytes held, `cursor == 0`.
// - Draining: `cursor` = bytes already written out, `cursor < len`.
//
// A drained slot is zeroed and returns to `len == capacity, cursor == 0`.
// Indices only ever move forward by one, modulo the slot count, through
// `SlotIndex::next`.
//
// =============================================================================

/// Position of a slot in the ring. Always lower than the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// Returns the raw slot number.
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }

    /// Returns the following slot, wrapping around at `slots`.
    #[inline]
    fn next(self, slots: usize) -> Self {
        debug_assert_index_in_range!(self.0, slots);
        Self((self.0 + 1) % slots)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    /// Bytes of valid data once sealed; the capacity while filling
    len: usize,
    /// Progress of the in-flight read or write within this slot
    cursor: usize,
}

impl Slot {
    const fn empty(capacity: usize) -> Self {
        Self {
            len: capacity,
            cursor: 0,
        }
    }
}

/// Result of a single [`RingBuffer::ingest`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Bytes were appended; the slot keeps filling.
    Filling(usize),
    /// Bytes were appended and the slot was sealed.
    Sealed(usize),
    /// The source returned zero bytes.
    EndOfStream,
    /// The ring is full; nothing was read.
    NoSpace,
}

/// Result of a single [`RingBuffer::drain`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Bytes were written; the slot still has data left.
    Partial(usize),
    /// Bytes were written and the slot was released.
    Complete(usize),
    /// No sealed slot; nothing was written.
    Empty,
}

/// Bounded circular buffer of line-sized slots.
///
/// All slots live in a single allocation of `slots * slot_capacity` bytes
/// made once in [`RingBuffer::new`] and released when the ring is dropped.
/// Neither [`ingest`](Self::ingest) nor [`drain`](Self::drain) blocks on its
/// own: each performs at most one `read` or `write` call.
pub struct RingBuffer {
    storage: Box<[u8]>,
    slots: Box<[Slot]>,
    head: SlotIndex,
    tail: SlotIndex,
    config: Config,
    metrics: Metrics,
}

impl RingBuffer {
    /// Allocates the ring described by `config`.
    ///
    /// Fails with [`BagError::Argument`] if the configuration is unusable and
    /// with [`BagError::Allocation`] if the backing region cannot be obtained.
    pub fn new(config: Config) -> Result<Self, BagError> {
        config.validate()?;

        let allocation_error = || BagError::Allocation {
            slots: config.slots,
            slot_capacity: config.slot_capacity,
        };

        let len = config.backing_len().ok_or_else(allocation_error)?;
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(len)
            .map_err(|_| allocation_error())?;
        storage.resize(len, 0);

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.slots)
            .map_err(|_| allocation_error())?;
        slots.resize(config.slots, Slot::empty(config.slot_capacity));

        Ok(Self {
            storage: storage.into_boxed_slice(),
            slots: slots.into_boxed_slice(),
            head: SlotIndex(config.slots - 1),
            tail: SlotIndex(0),
            config,
            metrics: Metrics::new(),
        })
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Returns the number of slots, including the unaddressable one.
    #[inline]
    pub fn slots(&self) -> usize {
        self.config.slots
    }

    /// Returns the capacity of each slot in bytes.
    #[inline]
    pub fn slot_capacity(&self) -> usize {
        self.config.slot_capacity
    }

    /// Returns true if a slot is available for filling.
    #[inline]
    pub fn has_space(&self) -> bool {
        self.head != self.tail
    }

    /// Returns true if a sealed slot is waiting to be drained.
    #[inline]
    pub fn has_data(&self) -> bool {
        self.head.next(self.config.slots) != self.tail
    }

    /// Returns the number of sealed slots not yet fully drained.
    #[inline]
    pub fn sealed_records(&self) -> usize {
        let n = self.config.slots;
        (self.tail.get() + n - self.head.get() - 1) % n
    }

    /// Returns the index of the most recently drained slot.
    #[inline]
    pub fn head(&self) -> SlotIndex {
        self.head
    }

    /// Returns the index of the slot being filled.
    #[inline]
    pub fn tail(&self) -> SlotIndex {
        self.tail
    }

    /// Returns the bytes of the next slot that are still to be written out.
    pub fn pending(&self) -> &[u8] {
        if !self.has_data() {
            return &[];
        }
        let idx = self.head.next(self.config.slots).get();
        let slot = self.slots[idx];
        let start = self.slot_range(idx).start;
        &self.storage[start + slot.cursor..start + slot.len]
    }

    /// Returns collected metrics (all zero unless enabled in the config).
    #[inline]
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Returns the counters for callers that record loop-level events.
    #[inline]
    pub(crate) fn metrics_mut(&mut self) -> Option<&mut Metrics> {
        self.config.enable_metrics.then_some(&mut self.metrics)
    }

    /// Byte range of slot `index` inside the backing region.
    #[inline]
    fn slot_range(&self, index: usize) -> Range<usize> {
        debug_assert_index_in_range!(index, self.config.slots);
        let start = index * self.config.slot_capacity;
        start..start + self.config.slot_capacity
    }

    // ---------------------------------------------------------------------
    // PRODUCER SIDE
    // ---------------------------------------------------------------------

    /// Reads once from `source` into the slot being filled.
    ///
    /// The slot is sealed, and `tail` advances, when its filled region
    /// contains a `\n` anywhere or when it reaches capacity. A line longer
    /// than one slot therefore continues in the next slot without a
    /// terminator in the first part.
    ///
    /// A zero-byte read is reported as [`Ingest::EndOfStream`] rather than as
    /// an error. Errors from `source` are returned unchanged and leave the
    /// slot as it was.
    pub fn ingest<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<Ingest> {
        if !self.has_space() {
            return Ok(Ingest::NoSpace);
        }

        let idx = self.tail.get();
        let slot = self.slots[idx];
        let start = self.slot_range(idx).start;

        let n = source.read(&mut self.storage[start + slot.cursor..start + slot.len])?;
        if n == 0 {
            return Ok(Ingest::EndOfStream);
        }

        let cursor = slot.cursor + n;
        debug_assert_cursor_advance!(slot.cursor, cursor, slot.len);
        self.slots[idx].cursor = cursor;

        if self.config.enable_metrics {
            self.metrics.add_bytes_in(n);
        }

        // The whole filled region is scanned, not only the new bytes. Slots
        // are zeroed on release so stale terminators cannot match.
        let filled = &self.storage[start..start + cursor];
        if filled.contains(&b'\n') || cursor == self.config.slot_capacity {
            self.seal_tail();
            Ok(Ingest::Sealed(n))
        } else {
            Ok(Ingest::Filling(n))
        }
    }

    /// Seals the slot being filled if it holds any bytes.
    ///
    /// Used once the producer has reached end-of-stream so that a trailing
    /// line without a terminator is still delivered. Returns `true` if a slot
    /// was sealed; calling it again without new input is a no-op.
    pub fn seal_partial(&mut self) -> bool {
        if self.slots[self.tail.get()].cursor == 0 {
            return false;
        }
        self.seal_tail();
        true
    }

    fn seal_tail(&mut self) {
        debug_assert_can_seal!(self.head.get(), self.tail.get());

        let slot = &mut self.slots[self.tail.get()];
        slot.len = slot.cursor;
        slot.cursor = 0;
        self.tail = self.tail.next(self.config.slots);

        if self.config.enable_metrics {
            self.metrics.records_sealed += 1;
        }
    }

    // ---------------------------------------------------------------------
    // CONSUMER SIDE
    // ---------------------------------------------------------------------

    /// Writes once to `sink` from the next sealed slot, resuming where the
    /// previous partial write stopped.
    ///
    /// When the slot has been written completely it is zeroed, made ready
    /// for filling again, and `head` advances onto it. A sink that accepts
    /// zero bytes of a non-empty buffer yields [`io::ErrorKind::WriteZero`].
    pub fn drain<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<Drain> {
        if !self.has_data() {
            return Ok(Drain::Empty);
        }

        let next = self.head.next(self.config.slots);
        let idx = next.get();
        let slot = self.slots[idx];
        let range = self.slot_range(idx);

        let n = sink.write(&self.storage[range.start + slot.cursor..range.start + slot.len])?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }

        let cursor = slot.cursor + n;
        debug_assert_cursor_advance!(slot.cursor, cursor, slot.len);

        if self.config.enable_metrics {
            self.metrics.add_bytes_out(n);
        }

        if cursor < slot.len {
            self.slots[idx].cursor = cursor;
            if self.config.enable_metrics {
                self.metrics.partial_writes += 1;
            }
            return Ok(Drain::Partial(n));
        }

        debug_assert_drain_sealed!(idx, self.tail.get());
        self.storage[range].fill(0);
        self.slots[idx] = Slot::empty(self.config.slot_capacity);
        self.head = next;

        if self.config.enable_metrics {
            self.metrics.records_drained += 1;
        }

        Ok(Drain::Complete(n))
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("slots", &self.config.slots)
            .field("slot_capacity", &self.config.slot_capacity)
            .field("head", &self.head.get())
            .field("tail", &self.tail.get())
            .field("sealed_records", &self.sealed_records())
            .finish_non_exhaustive()
    }
}
