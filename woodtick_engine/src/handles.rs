use std::collections::BTreeSet;
use std::ops::Range;

pub const SOUND_IDS: Range<u32> = 250_000..300_000;
pub const THREAD_IDS: Range<u32> = 300_000..8_000_000;
pub const CALLBACK_IDS: Range<u32> = 8_000_000..10_000_000;

/// Hands out integer ids from a fixed range. Ids are issued in increasing
/// order and wrap around inside the range, skipping ids that are still live,
/// so a released id only comes back after the rest of the range was used.
#[derive(Debug, Clone)]
pub struct HandlePool {
    range: Range<u32>,
    next: u32,
    live: BTreeSet<u32>,
}

impl HandlePool {
    pub fn new(range: Range<u32>) -> Self {
        HandlePool {
            next: range.start,
            range,
            live: BTreeSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Option<u32> {
        let capacity = self.range.len();
        if self.live.len() >= capacity {
            return None;
        }
        loop {
            let candidate = self.next;
            self.next = if candidate + 1 >= self.range.end {
                self.range.start
            } else {
                candidate + 1
            };
            if self.live.insert(candidate) {
                return Some(candidate);
            }
        }
    }

    pub fn release(&mut self, id: u32) -> bool {
        self.live.remove(&id)
    }

    /// Whether `id` falls inside this pool's range, live or not.
    pub fn owns(&self, id: u32) -> bool {
        self.range.contains(&id)
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::HandlePool;

    #[test]
    fn ids_are_sequential_and_skip_live_entries() {
        let mut pool = HandlePool::new(10..13);
        assert_eq!(pool.allocate(), Some(10));
        assert_eq!(pool.allocate(), Some(11));
        assert!(pool.release(10));
        assert_eq!(pool.allocate(), Some(12));
        // wraps to the released id, never to the live one
        assert_eq!(pool.allocate(), Some(10));
        assert_eq!(pool.allocate(), None);
        assert!(pool.owns(12));
        assert!(!pool.owns(13));
    }

    #[test]
    fn released_ids_are_not_reissued_immediately() {
        let mut pool = HandlePool::new(1..100);
        let first = pool.allocate().expect("id");
        pool.release(first);
        let second = pool.allocate().expect("id");
        assert_ne!(first, second);
        assert!(!pool.is_live(first));
        assert_eq!(pool.live_count(), 1);
    }
}
