//! Small value types shared by the search: task bitmask, placement record and the
//! canonical state signature.

use crate::interner::TaskId;
use crate::models::Time;

/// Fixed-size set of task ids backed by 64-bit words.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TaskMask {
    words: Vec<u64>,
}

impl TaskMask {
    /// Empty mask able to hold ids `0..task_count`.
    pub fn new(task_count: usize) -> Self {
        Self {
            words: vec![0; task_count.div_ceil(64)],
        }
    }

    #[inline]
    pub fn insert(&mut self, task: TaskId) {
        self.words[(task / 64) as usize] |= 1u64 << (task % 64);
    }

    #[inline]
    pub fn remove(&mut self, task: TaskId) {
        self.words[(task / 64) as usize] &= !(1u64 << (task % 64));
    }

    #[inline]
    pub fn contains(&self, task: TaskId) -> bool {
        self.words
            .get((task / 64) as usize)
            .is_some_and(|w| w & (1u64 << (task % 64)) != 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            let base = (index * 64) as TaskId;
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros();
                remaining &= remaining - 1;
                Some(base + bit)
            })
        })
    }
}

/// Where and when a task runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub processor: usize,
    pub start: Time,
    pub finish: Time,
}

/// Token separating processor sequences inside a signature.
const SEQUENCE_SEPARATOR: u32 = u32::MAX;

/// Processor-permutation-invariant identity of a schedule state.
///
/// The non-empty per-processor task sequences, ordered by their first task id and
/// concatenated. Start times follow from the sequences, so two states with equal
/// signatures are the same state up to processor relabelling.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateSignature(Box<[u32]>);

impl StateSignature {
    pub fn from_sequences(sequences: &[Vec<TaskId>]) -> Self {
        let mut non_empty: Vec<&Vec<TaskId>> = sequences.iter().filter(|s| !s.is_empty()).collect();
        // Sequences are disjoint, so first ids are unique
        non_empty.sort_unstable_by_key(|s| s[0]);

        let len = non_empty.iter().map(|s| s.len() + 1).sum();
        let mut words = Vec::with_capacity(len);
        for sequence in non_empty {
            words.extend_from_slice(sequence);
            words.push(SEQUENCE_SEPARATOR);
        }
        Self(words.into_boxed_slice())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_membership_across_words() {
        let mut mask = TaskMask::new(130);
        assert!(mask.is_empty());

        for task in [0, 63, 64, 129] {
            mask.insert(task);
        }
        mask.remove(63);

        assert!(mask.contains(0));
        assert!(!mask.contains(63));
        assert!(mask.contains(129));
        assert!(!mask.contains(500));
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
    }

    #[test]
    fn test_signature_ignores_processor_order() {
        let left = StateSignature::from_sequences(&[vec![2, 3], vec![0], vec![]]);
        let right = StateSignature::from_sequences(&[vec![], vec![0], vec![2, 3]]);
        assert_eq!(left, right);
        assert_eq!(left.as_slice(), &[0, u32::MAX, 2, 3, u32::MAX]);
    }

    #[test]
    fn test_signature_distinguishes_sequence_order() {
        let left = StateSignature::from_sequences(&[vec![0, 1]]);
        let right = StateSignature::from_sequences(&[vec![1, 0]]);
        let split = StateSignature::from_sequences(&[vec![0], vec![1]]);
        assert_ne!(left, right);
        assert_ne!(left, split);
    }
}
