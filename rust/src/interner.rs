//! Task label interning.
//!
//! Labels from the input graph are mapped to dense `u32` ids, assigned in declaration
//! order, so the rest of the crate can index plain vectors instead of hashing strings.

use rustc_hash::FxHashMap;

/// Dense task id (index into the graph's task table).
pub type TaskId = u32;

/// Bidirectional label <-> id table.
#[derive(Debug, Clone, Default)]
pub struct TaskIdInterner {
    to_id: FxHashMap<String, TaskId>,
    labels: Vec<String>,
}

impl TaskIdInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            labels: Vec::with_capacity(capacity),
        }
    }

    /// Register a new label. Returns `None` if the label is already known.
    pub fn insert_new(&mut self, label: &str) -> Option<TaskId> {
        if self.to_id.contains_key(label) {
            return None;
        }
        let id = self.labels.len() as TaskId;
        self.labels.push(label.to_string());
        self.to_id.insert(label.to_string(), id);
        Some(id)
    }

    #[inline]
    pub fn get(&self, label: &str) -> Option<TaskId> {
        self.to_id.get(label).copied()
    }

    #[inline]
    pub fn label(&self, id: TaskId) -> Option<&str> {
        self.labels.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_declaration_order() {
        let mut interner = TaskIdInterner::with_capacity(4);

        assert_eq!(interner.insert_new("b"), Some(0));
        assert_eq!(interner.insert_new("a"), Some(1));
        assert_eq!(interner.insert_new("b"), None); // duplicate

        assert_eq!(interner.get("a"), Some(1));
        assert_eq!(interner.label(0), Some("b"));
        assert_eq!(interner.label(7), None);
        assert_eq!(interner.len(), 2);
        assert!(!interner.is_empty());
    }
}
