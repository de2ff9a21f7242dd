//! Sorted membership sets over segment-local doc ids.

use roaring::RoaringBitmap;

/// The doc ids of one segment that satisfy a structural predicate.
///
/// Nested resolution only ever asks two questions of a set: the next member
/// at or after a position, and how many members lie strictly between two
/// positions. Both are answered from rank/select without scanning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipSet {
    bits: RoaringBitmap,
}

impl MembershipSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing bitmap.
    pub fn from_bitmap(bits: RoaringBitmap) -> Self {
        Self { bits }
    }

    /// Add a member. Returns false if it was already present.
    pub fn insert(&mut self, doc: u32) -> bool {
        self.bits.insert(doc)
    }

    /// Check membership.
    pub fn contains(&self, doc: u32) -> bool {
        self.bits.contains(doc)
    }

    /// Number of members.
    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    /// Check if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The smallest member `>= pos`.
    pub fn next_at_or_after(&self, pos: u32) -> Option<u32> {
        let preceding = if pos == 0 { 0 } else { self.bits.rank(pos - 1) };
        u32::try_from(preceding)
            .ok()
            .and_then(|n| self.bits.select(n))
    }

    /// Number of members `m` with `lo < m < hi`.
    pub fn count_between(&self, lo: u32, hi: u32) -> u64 {
        if hi <= lo.saturating_add(1) {
            return 0;
        }
        self.bits.rank(hi - 1) - self.bits.rank(lo)
    }

    /// The largest member `< pos`.
    pub fn prev_before(&self, pos: u32) -> Option<u32> {
        if pos == 0 {
            return None;
        }
        match self.bits.rank(pos - 1) {
            0 => None,
            preceding => u32::try_from(preceding - 1)
                .ok()
                .and_then(|n| self.bits.select(n)),
        }
    }

    /// Members `m` with `lo < m < hi`, ascending.
    pub fn members_between(&self, lo: u32, hi: u32) -> Vec<u32> {
        let count = self.count_between(lo, hi);
        let Ok(first) = u32::try_from(self.bits.rank(lo)) else {
            return Vec::new();
        };
        (0..count as u32)
            .filter_map(|i| self.bits.select(first + i))
            .collect()
    }

    /// Iterate members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }
}

impl FromIterator<u32> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_at_or_after() {
        let set: MembershipSet = [3, 7, 8].into_iter().collect();
        assert_eq!(set.next_at_or_after(0), Some(3));
        assert_eq!(set.next_at_or_after(3), Some(3));
        assert_eq!(set.next_at_or_after(4), Some(7));
        assert_eq!(set.next_at_or_after(8), Some(8));
        assert_eq!(set.next_at_or_after(9), None);
        assert_eq!(MembershipSet::new().next_at_or_after(0), None);
    }

    #[test]
    fn test_count_between_is_exclusive() {
        let set: MembershipSet = [1, 2, 3, 5].into_iter().collect();
        assert_eq!(set.count_between(0, 6), 4);
        assert_eq!(set.count_between(1, 5), 2);
        assert_eq!(set.count_between(2, 3), 0);
        assert_eq!(set.count_between(3, 3), 0);
        assert_eq!(set.count_between(5, 1), 0);
    }

    #[test]
    fn test_prev_before_and_range() {
        let set: MembershipSet = [2, 5, 6, 9].into_iter().collect();
        assert_eq!(set.prev_before(0), None);
        assert_eq!(set.prev_before(2), None);
        assert_eq!(set.prev_before(3), Some(2));
        assert_eq!(set.prev_before(9), Some(6));
        assert_eq!(set.prev_before(100), Some(9));

        assert_eq!(set.members_between(2, 9), vec![5, 6]);
        assert_eq!(set.members_between(0, 3), vec![2]);
        assert!(set.members_between(6, 9).is_empty());
    }

    #[test]
    fn test_membership() {
        let mut set = MembershipSet::new();
        assert!(set.is_empty());
        assert!(set.insert(4));
        assert!(!set.insert(4));
        assert!(set.contains(4));
        assert!(!set.contains(5));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![4]);
    }
}
