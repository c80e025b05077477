//! Byte-pattern search primitives.
//!
//! Both functions are pure and work on any immutable slice, so the same
//! memory map can be searched from many workers at once.

use memchr::memmem;

/// Find the first occurrence of `pattern` at or after `start_offset`.
///
/// Returns the absolute offset of the match. An empty pattern, a start past
/// the end of `data`, or a pattern longer than what remains all report
/// `None`.
pub fn find_simple(data: &[u8], start_offset: usize, pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || start_offset >= data.len() {
        return None;
    }
    if data.len() - start_offset < pattern.len() {
        return None;
    }
    memmem::find(&data[start_offset..], pattern).map(|pos| start_offset + pos)
}

/// Find a `start` marker and an `end` marker separated by exactly `gap` bytes.
///
/// The two markers are searched independently from `start_offset`; the end
/// search is not chained after the start match. The pair is accepted only
/// when `end_offset - start_offset - start.len() == gap`, otherwise both are
/// reported missing. Retrying further along is the caller's job.
pub fn find_split(
    data: &[u8],
    start_offset: usize,
    start: &[u8],
    gap: usize,
    end: &[u8],
) -> Option<(usize, usize)> {
    let start_at = find_simple(data, start_offset, start)?;
    let end_at = find_simple(data, start_offset, end)?;

    // An end marker found before the start marker can never satisfy the gap.
    let distance = end_at.checked_sub(start_at)?.checked_sub(start.len())?;
    (distance == gap).then_some((start_at, end_at))
}
