//! Debug assertion macros for ring buffer invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Index Range
// =============================================================================

/// Assert that a slot index addresses a slot of the ring.
///
/// **Invariant**: `0 ≤ index < slots`
///
/// Used in: `SlotIndex::next()`, `RingBuffer::slot_range()`
macro_rules! debug_assert_index_in_range {
    ($index:expr, $slots:expr) => {
        debug_assert!(
            $index < $slots,
            "slot index {} out of range for {} slots",
            $index,
            $slots
        )
    };
}

// =============================================================================
// Cursor Progress
// =============================================================================

/// Assert that a slot cursor only moves forward and stays within its limit.
///
/// **Invariant**: `old ≤ new ≤ limit`
///
/// Used in: `ingest()` against the slot capacity, `drain()` against the
/// sealed length
macro_rules! debug_assert_cursor_advance {
    ($old:expr, $new:expr, $limit:expr) => {
        debug_assert!(
            $old <= $new && $new <= $limit,
            "slot cursor moved from {} to {} (limit {})",
            $old,
            $new,
            $limit
        )
    };
}

// =============================================================================
// Occupancy
// =============================================================================

/// Assert that sealing a slot leaves the ring in a representable state.
///
/// **Invariant**: a slot may only be sealed while `head != tail`; sealing
/// when full would make the ring look empty.
///
/// Used in: `seal_tail()`
macro_rules! debug_assert_can_seal {
    ($head:expr, $tail:expr) => {
        debug_assert!(
            $head != $tail,
            "sealing slot {} while the ring is full (head {})",
            $tail,
            $head
        )
    };
}

/// Assert that a drained slot actually held sealed data.
///
/// **Invariant**: `(head + 1) mod slots != tail` before head advances
///
/// Used in: `drain()` before advancing head
macro_rules! debug_assert_drain_sealed {
    ($next:expr, $tail:expr) => {
        debug_assert!(
            $next != $tail,
            "draining slot {} which is still being filled",
            $next
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_can_seal;
pub(crate) use debug_assert_cursor_advance;
pub(crate) use debug_assert_drain_sealed;
pub(crate) use debug_assert_index_in_range;
