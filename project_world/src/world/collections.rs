use std::collections::BTreeMap;

use instance::{EntityKind, InstanceId};

use crate::entity::{Character, Combatant, Entity, Item, Mob, Npc, Player, Projectile, Visible};

/// Every live entity, one map per variant, looked up by id.
#[derive(Debug, Default)]
pub struct Collections {
    pub players: BTreeMap<InstanceId, Player>,
    pub mobs: BTreeMap<InstanceId, Mob>,
    pub items: BTreeMap<InstanceId, Item>,
    pub projectiles: BTreeMap<InstanceId, Projectile>,
    pub npcs: BTreeMap<InstanceId, Npc>,
}

impl Collections {
    pub fn combatant(&self, id: InstanceId) -> Option<&dyn Combatant> {
        match id.kind {
            EntityKind::Player => self.players.get(&id).map(|p| p as &dyn Combatant),
            EntityKind::Mob => self.mobs.get(&id).map(|m| m as &dyn Combatant),
            _ => None,
        }
    }

    pub fn combatant_mut(&mut self, id: InstanceId) -> Option<&mut dyn Combatant> {
        match id.kind {
            EntityKind::Player => self.players.get_mut(&id).map(|p| p as &mut dyn Combatant),
            EntityKind::Mob => self.mobs.get_mut(&id).map(|m| m as &mut dyn Combatant),
            _ => None,
        }
    }

    pub fn character(&self, id: InstanceId) -> Option<&Character> {
        self.combatant(id).map(Combatant::character)
    }

    pub fn character_mut(&mut self, id: InstanceId) -> Option<&mut Character> {
        self.combatant_mut(id).map(Combatant::character_mut)
    }

    pub fn is_alive_character(&self, id: InstanceId) -> bool {
        self.character(id).is_some_and(|c| !c.is_dead())
    }

    pub fn visible(&self, id: InstanceId) -> Option<&dyn Visible> {
        match id.kind {
            EntityKind::Player => self.players.get(&id).map(|e| e as &dyn Visible),
            EntityKind::Mob => self.mobs.get(&id).map(|e| e as &dyn Visible),
            EntityKind::Item => self.items.get(&id).map(|e| e as &dyn Visible),
            EntityKind::Projectile => self.projectiles.get(&id).map(|e| e as &dyn Visible),
            EntityKind::Npc => self.npcs.get(&id).map(|e| e as &dyn Visible),
            EntityKind::Chest | EntityKind::Effect => None,
        }
    }

    pub fn entity(&self, id: InstanceId) -> Option<&Entity> {
        self.visible(id).map(Visible::entity)
    }

    pub fn entity_mut(&mut self, id: InstanceId) -> Option<&mut Entity> {
        match id.kind {
            EntityKind::Player => self.players.get_mut(&id).map(|p| &mut p.character.entity),
            EntityKind::Mob => self.mobs.get_mut(&id).map(|m| &mut m.character.entity),
            EntityKind::Item => self.items.get_mut(&id).map(|i| &mut i.entity),
            EntityKind::Projectile => self.projectiles.get_mut(&id).map(|p| &mut p.entity),
            EntityKind::Npc => self.npcs.get_mut(&id).map(|n| &mut n.entity),
            EntityKind::Chest | EntityKind::Effect => None,
        }
    }

    /// Drop the entity from its map. Returns whether it existed.
    pub fn remove(&mut self, id: InstanceId) -> bool {
        match id.kind {
            EntityKind::Player => self.players.remove(&id).is_some(),
            EntityKind::Mob => self.mobs.remove(&id).is_some(),
            EntityKind::Item => self.items.remove(&id).is_some(),
            EntityKind::Projectile => self.projectiles.remove(&id).is_some(),
            EntityKind::Npc => self.npcs.remove(&id).is_some(),
            EntityKind::Chest | EntityKind::Effect => false,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len() + self.mobs.len() + self.items.len() + self.projectiles.len() + self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
