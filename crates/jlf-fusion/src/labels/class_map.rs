//! Dense class index to label id mapping.

use std::collections::BTreeSet;

/// Sorted, deduplicated label ids; position `k` is dense class `k`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassMap {
    labels: Vec<i64>,
}

impl ClassMap {
    /// Build from any collection of observed ids.
    pub fn from_labels(labels: impl IntoIterator<Item = i64>) -> Self {
        let unique: BTreeSet<i64> = labels.into_iter().collect();
        Self {
            labels: unique.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label ids in class order.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Label id of dense class `index`.
    pub fn label_of(&self, index: usize) -> Option<i64> {
        self.labels.get(index).copied()
    }

    /// Dense class of label id `label`.
    pub fn index_of(&self, label: i64) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_deduplicated() {
        let map = ClassMap::from_labels([9, 0, 5, 9, 0]);
        assert_eq!(map.labels(), &[0, 5, 9]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_bijection() {
        let map = ClassMap::from_labels([9, 0, 5]);
        for (index, label) in [(0, 0), (1, 5), (2, 9)] {
            assert_eq!(map.label_of(index), Some(label));
            assert_eq!(map.index_of(label), Some(index));
        }
        assert_eq!(map.label_of(3), None);
        assert_eq!(map.index_of(4), None);
    }

    #[test]
    fn test_negative_ids() {
        let map = ClassMap::from_labels([3, -2]);
        assert_eq!(map.index_of(-2), Some(0));
    }
}
