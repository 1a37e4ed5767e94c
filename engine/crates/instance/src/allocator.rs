use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{EntityKind, InstanceId};

/// Hands out instance ids. Sequences are per kind and never reused, so a
/// stale id held as a weak reference can never alias a newer entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceAllocator {
    next_seq: BTreeMap<EntityKind, u32>,
    alive: BTreeSet<InstanceId>,
}

impl InstanceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: EntityKind) -> InstanceId {
        let seq = self.next_seq.entry(kind).or_insert(0);
        let id = InstanceId::new(kind, *seq);
        *seq = seq.wrapping_add(1);
        self.alive.insert(id);
        id
    }

    pub fn deallocate(&mut self, id: InstanceId) -> bool {
        self.alive.remove(&id)
    }

    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.alive.contains(&id)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }
}
