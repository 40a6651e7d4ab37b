//! Lazy descending identifier ranges for reverse scans.

use bridge_traits::ItemId;

/// Identifiers from `top` down to `floor`, both inclusive, produced on demand.
///
/// The range is restartable: [`next_id`](Self::next_id) is the next id to
/// visit, and `DescendingIds::new(next_id, floor)` continues where a previous
/// walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescendingIds {
    next: u64,
    floor: u64,
}

impl DescendingIds {
    /// `floor` is clamped to 1; identifier 0 is never produced.
    pub fn new(top: u64, floor: u64) -> Self {
        let floor = floor.max(1);
        Self { next: top, floor }
    }

    /// Next id that would be produced, or `None` once the floor was passed.
    pub fn next_id(&self) -> Option<u64> {
        (self.next >= self.floor).then_some(self.next)
    }

    pub fn remaining(&self) -> u64 {
        if self.next >= self.floor {
            self.next - self.floor + 1
        } else {
            0
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Take up to `n` ids.
    pub fn take_chunk(&mut self, n: usize) -> Vec<ItemId> {
        self.by_ref().take(n).collect()
    }
}

impl Iterator for DescendingIds {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        let id = self.next_id()?;
        self.next = id - 1;
        Some(ItemId(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_down_to_one() {
        let ids: Vec<u64> = DescendingIds::new(3, 0).map(ItemId::get).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_chunks_and_resume() {
        let mut ids = DescendingIds::new(10, 1);
        assert_eq!(ids.take_chunk(4).len(), 4);
        assert_eq!(ids.next_id(), Some(6));
        assert_eq!(ids.remaining(), 6);

        let resumed = DescendingIds::new(ids.next_id().unwrap(), 1);
        assert_eq!(resumed.map(ItemId::get).collect::<Vec<_>>(), vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_explicit_floor() {
        let mut ids = DescendingIds::new(105, 103);
        assert_eq!(ids.take_chunk(10), vec![ItemId(105), ItemId(104), ItemId(103)]);
        assert!(ids.is_exhausted());
        assert_eq!(ids.next_id(), None);
    }

    #[test]
    fn test_next_steps_down_and_stops_at_floor() {
        let mut ids = DescendingIds::new(8, 7);
        assert_eq!(ids.next(), Some(ItemId(8)));
        assert_eq!(ids.next_id(), Some(7));
        assert_eq!(ids.next(), Some(ItemId(7)));
        assert_eq!(ids.next(), None);
        assert_eq!(ids.next_id(), None);
    }

    #[test]
    fn test_empty_range() {
        let mut ids = DescendingIds::new(0, 1);
        assert!(ids.is_exhausted());
        assert!(ids.next().is_none());
    }
}
