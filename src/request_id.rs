//! Correlation identifier allocation.

/// Issues unique, monotonically increasing request identifiers with
/// bounded-range wraparound.
///
/// Identifiers start at 1 and stay within the positive 31-bit range; when the
/// counter would reach `i32::MAX` it resets to 1. Identifier 0 is never
/// issued, so an unset/zero id can never match a live request.
///
/// Uniqueness only holds among simultaneously outstanding requests. Once an
/// entry is resolved and removed from the pending table, its identifier may
/// legitimately be reused after wraparound.
///
/// Not safe for concurrent use by itself; the pending table owns the
/// allocator inside its lock, which serializes all calls to [`next`].
///
/// [`next`]: RequestIdAllocator::next
#[derive(Debug)]
pub struct RequestIdAllocator {
    counter: i32,
}

impl RequestIdAllocator {
    /// Create a new allocator. The first identifier issued is 1.
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Allocate the next identifier.
    pub fn next(&mut self) -> i32 {
        self.counter += 1;
        if self.counter >= i32::MAX {
            self.counter = 1;
        }
        self.counter
    }

    #[cfg(test)]
    fn set(&mut self, value: i32) {
        self.counter = value;
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_id_is_one() {
        let mut alloc = RequestIdAllocator::new();
        assert_eq!(alloc.next(), 1);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut alloc = RequestIdAllocator::new();
        let ids: Vec<i32> = (0..100).map(|_| alloc.next()).collect();
        for window in ids.windows(2) {
            assert_eq!(window[1], window[0] + 1);
        }
    }

    #[test]
    fn test_wraparound_resets_to_one_never_zero() {
        let mut alloc = RequestIdAllocator::new();
        alloc.set(i32::MAX - 2);

        assert_eq!(alloc.next(), i32::MAX - 1);
        // Counter would reach i32::MAX here; must wrap to 1, never 0.
        assert_eq!(alloc.next(), 1);
        assert_eq!(alloc.next(), 2);
    }

    #[test]
    fn test_zero_is_never_issued() {
        let mut alloc = RequestIdAllocator::new();
        alloc.set(i32::MAX - 3);
        for _ in 0..10 {
            assert_ne!(alloc.next(), 0);
        }
    }
}
