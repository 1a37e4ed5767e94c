use std::collections::VecDeque;

use super::hit::Hit;

/// Pending hits in the order they were computed.
#[derive(Debug, Clone, Default)]
pub struct CombatQueue {
    hits: VecDeque<Hit>,
}

impl CombatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, hit: Hit) {
        self.hits.push_back(hit);
    }

    pub fn has_queue(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Oldest pending hit; `None` on an empty queue, which is left untouched.
    pub fn get_hit(&mut self) -> Option<Hit> {
        self.hits.pop_front()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::HitKind;

    #[test]
    fn hits_come_back_in_insertion_order() {
        let mut queue = CombatQueue::new();
        for damage in [5, 1, 9, 3] {
            queue.add(Hit::new(HitKind::Damage, damage));
        }
        let order: Vec<u32> = std::iter::from_fn(|| queue.get_hit())
            .map(|h| h.damage)
            .collect();
        assert_eq!(order, vec![5, 1, 9, 3]);
        assert!(!queue.has_queue());
    }

    #[test]
    fn empty_queue_get_is_noop() {
        let mut queue = CombatQueue::new();
        assert!(queue.get_hit().is_none());
        assert!(queue.is_empty());
        queue.add(Hit::new(HitKind::Stun, 2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue = CombatQueue::new();
        queue.add(Hit::new(HitKind::Damage, 1));
        queue.add(Hit::new(HitKind::Damage, 2));
        queue.clear();
        assert!(!queue.has_queue());
        assert!(queue.get_hit().is_none());
    }
}
