use engine_core::TimerOwner;
use instance::{EntityKind, InstanceId};
use net::{PacketScope, ServerMessage};
use rand::seq::SliceRandom;
use space::{GridPos, SpaceError};

use super::{Task, World};
use crate::combat::Hit;
use crate::entity::{Entity, Item, Mob, Npc, Projectile};
use crate::error::WorldError;

const CARDINALS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

const MIN_FLIGHT_MS: u64 = 50;

fn manhattan(a: GridPos, b: GridPos) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

impl World {
    pub(crate) fn is_walkable(&self, pos: GridPos) -> bool {
        self.map.in_bounds(pos) && !self.map.is_colliding(pos)
    }

    fn check_bounds(&self, pos: GridPos) -> Result<(), WorldError> {
        if !self.map.in_bounds(pos) {
            return Err(SpaceError::OutOfBounds { x: pos.x, y: pos.y }.into());
        }
        Ok(())
    }

    // --- spawner ---

    pub fn spawn_mob(&mut self, key: &str, pos: GridPos) -> Result<InstanceId, WorldError> {
        self.spawn_mob_in(key, pos, None)
    }

    /// Spawn a mob that lives in `owner`'s instance and is visible to them
    /// only. It never respawns.
    pub(crate) fn spawn_private_mob(&mut self, owner: InstanceId, key: &str, pos: GridPos) -> Result<InstanceId, WorldError> {
        self.spawn_mob_in(key, pos, Some(owner))
    }

    fn spawn_mob_in(&mut self, key: &str, pos: GridPos, instance: Option<InstanceId>) -> Result<InstanceId, WorldError> {
        let data = self
            .content
            .mob(key)
            .ok_or_else(|| WorldError::UnknownMob(key.to_string()))?
            .clone();
        self.check_bounds(pos)?;

        let id = self.allocator.allocate(EntityKind::Mob);
        let mut mob = Mob::new(id, key, &data, pos);
        mob.character.entity.instance = instance;
        mob.respawns = instance.is_none();
        self.entities.mobs.insert(id, mob);
        self.place(id);
        self.start_mob_timers(id);
        tracing::debug!(mob = %id, key, %pos, "mob spawned");
        Ok(id)
    }

    pub(crate) fn start_mob_timers(&mut self, id: InstanceId) {
        let owner = TimerOwner::Entity(id);
        let roam = self.config.mobs.roam_interval_ms.max(1);
        let heal = self.config.mobs.heal_interval_ms.max(1);
        self.scheduler.every(owner, self.now + roam, roam, Task::Roam(id));
        self.scheduler.every(owner, self.now + heal, heal, Task::Heal(id));
    }

    /// Spawn a minion next to `boss`, sharing its instance layer.
    pub(crate) fn spawn_minion(&mut self, boss: InstanceId, key: &str) -> Option<InstanceId> {
        let (pos, instance) = self
            .entities
            .mobs
            .get(&boss)
            .filter(|m| !m.character.is_dead())
            .map(|m| (m.character.pos(), m.character.entity.instance))?;
        let at = CARDINALS
            .iter()
            .map(|(dx, dy)| pos.offset(*dx, *dy))
            .find(|p| self.is_walkable(*p))
            .unwrap_or(pos);

        let id = match self.spawn_mob_in(key, at, instance) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%boss, key, error = %e, "minion not spawned");
                return None;
            }
        };
        if let Some(minion) = self.entities.mobs.get_mut(&id) {
            minion.master = Some(boss);
            minion.respawns = false;
        }
        if let Some(master) = self.entities.mobs.get_mut(&boss) {
            master.minions.push(id);
        }
        Some(id)
    }

    pub fn spawn_item(&mut self, key: &str, pos: GridPos, dropped: bool, count: u32) -> Result<InstanceId, WorldError> {
        self.spawn_item_in(key, pos, dropped, count, None)
    }

    pub(crate) fn spawn_item_in(
        &mut self,
        key: &str,
        pos: GridPos,
        dropped: bool,
        count: u32,
        instance: Option<InstanceId>,
    ) -> Result<InstanceId, WorldError> {
        self.check_bounds(pos)?;
        let id = self.allocator.allocate(EntityKind::Item);
        let mut entity = Entity::new(id, key, pos);
        entity.instance = instance;
        self.entities.items.insert(id, Item::new(entity, count, dropped));
        self.place(id);

        if dropped {
            let owner = TimerOwner::Entity(id);
            let blink = self.now + self.config.mobs.item_blink_ms;
            let despawn = self.now + self.config.mobs.item_despawn_ms;
            self.scheduler.once(owner, blink, Task::ItemBlink(id));
            self.scheduler.once(owner, despawn, Task::ItemDespawn(id));
        }
        Ok(id)
    }

    pub fn spawn_npc(&mut self, key: &str, pos: GridPos) -> Result<InstanceId, WorldError> {
        self.check_bounds(pos)?;
        let id = self.allocator.allocate(EntityKind::Npc);
        self.entities.npcs.insert(id, Npc { entity: Entity::new(id, key, pos) });
        self.place(id);
        Ok(id)
    }

    /// Launch a projectile from `owner` at `target`. It is announced with its
    /// own packet and removed once its flight time is over.
    pub(crate) fn spawn_projectile(&mut self, owner: InstanceId, target: InstanceId, hit: Hit) -> Option<InstanceId> {
        let (from, instance) = self
            .entities
            .character(owner)
            .map(|c| (c.pos(), c.entity.instance))?;
        let to = self.entities.character(target)?.pos();

        let id = self.allocator.allocate(EntityKind::Projectile);
        let mut entity = Entity::new(id, "projectile", from);
        entity.instance = instance;
        let wire = hit.to_wire();
        self.entities.projectiles.insert(
            id,
            Projectile {
                entity,
                owner,
                target,
                hit,
            },
        );
        self.place(id);

        if let Some(key) = self.entities.entity(id).and_then(|e| e.region) {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Projectile {
                    instance: id,
                    owner,
                    target,
                    hit: wire,
                },
            );
        }
        let flight = (u64::from(from.distance(to)) * self.config.combat.projectile_ms_per_tile).max(MIN_FLIGHT_MS);
        self.scheduler
            .once(TimerOwner::Entity(id), self.now + flight, Task::ProjectileLand(id));
        Some(id)
    }

    // --- placement and movement ---

    /// Register an entity at its current position in the grid and regions.
    pub(crate) fn place(&mut self, id: InstanceId) {
        let Some(entity) = self.entities.entity_mut(id) else {
            return;
        };
        let pos = entity.pos;
        self.regions.handle(entity);
        entity.recently_left.clear();
        self.grid.add_entity(id, pos);
    }

    /// Move without region resends. Returns whether the region changed.
    fn relocate(&mut self, id: InstanceId, pos: GridPos) -> bool {
        let Some(entity) = self.entities.entity_mut(id) else {
            return false;
        };
        let old = entity.pos;
        entity.set_position(pos);
        let changed = self.regions.handle(entity);
        let left = entity.take_recently_left();
        let region = entity.region;
        self.grid.update_entity(id, old, pos);

        if let Some(key) = region {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Movement {
                    instance: id,
                    x: pos.x,
                    y: pos.y,
                },
            );
        }
        if !left.is_empty() {
            self.outbox
                .push(PacketScope::Regions(left), ServerMessage::Despawn { instance: id });
        }
        changed
    }

    /// Move an entity and keep a moving player's view of the map current.
    pub fn move_entity(&mut self, id: InstanceId, pos: GridPos) -> bool {
        let changed = self.relocate(id, pos);
        if changed && id.is_player() {
            self.send_region(id, false);
            self.send_entities(id);
        }
        changed
    }

    /// Move anywhere on the map; players get a forced region resend.
    pub fn teleport(&mut self, id: InstanceId, pos: GridPos) {
        if !self.map.in_bounds(pos) {
            tracing::warn!(entity = %id, %pos, "teleport target off map");
            return;
        }
        self.relocate(id, pos);
        if id.is_player() {
            self.send_region(id, true);
            self.send_entities(id);
        }
    }

    /// Remove an entity everywhere: timers, combat, regions, grid, tables.
    pub fn remove_entity(&mut self, id: InstanceId, broadcast: bool) {
        if id.kind.is_character() {
            self.detach_from_combat(id);
        }
        self.scheduler.cancel_owner(TimerOwner::Entity(id));

        let master = self.entities.mobs.get(&id).and_then(|m| m.master);
        if let Some(master) = master.and_then(|m| self.entities.mobs.get_mut(&m)) {
            master.minions.retain(|m| *m != id);
        }

        let Some(entity) = self.entities.entity_mut(id) else {
            return;
        };
        let pos = entity.pos;
        let region = entity.region;
        self.regions.remove(entity);
        self.grid.remove_entity(id, pos);
        if let (true, Some(key)) = (broadcast, region) {
            self.outbox
                .push(PacketScope::Region(key), ServerMessage::Despawn { instance: id });
        }
        self.entities.remove(id);
        self.allocator.deallocate(id);
        tracing::debug!(entity = %id, "entity removed");
    }

    /// Take `id` out of every fight it is part of. Attackers that were
    /// targeting it stop; a mob that still has attackers turns on the
    /// closest one.
    pub(crate) fn detach_from_combat(&mut self, id: InstanceId) {
        let attackers = self.combat(id).attackers();
        for attacker in attackers {
            let was_target = self
                .entities
                .character(attacker)
                .is_some_and(|c| c.target == Some(id));
            if was_target {
                if let Some(c) = self.entities.character_mut(attacker) {
                    c.target = None;
                }
                self.combat(attacker).stop();
            }
            self.combat(attacker).remove_attacker(id);
            if was_target && attacker.is_mob() {
                if let Some(next) = self.closest_attacker(attacker) {
                    self.combat(attacker).begin(next);
                }
            }
        }
        let mut ctl = self.combat(id);
        ctl.stop();
        ctl.forget();
    }

    fn closest_attacker(&self, id: InstanceId) -> Option<InstanceId> {
        let me = self.entities.character(id).filter(|c| !c.is_dead())?;
        me.combat
            .attackers()
            .filter_map(|a| self.entities.character(a))
            .filter(|c| !c.is_dead())
            .min_by_key(|c| (me.pos().distance(c.pos()), c.id()))
            .map(|c| c.id())
    }

    /// Leash a mob home: it stops fighting and walks back to its spawn.
    pub(crate) fn send_to_spawn(&mut self, id: InstanceId) {
        let Some(mob) = self.entities.mobs.get_mut(&id) else {
            return;
        };
        if mob.character.is_dead() {
            return;
        }
        mob.character.target = None;
        let spawn = mob.spawn;
        let here = mob.character.pos();
        self.combat(id).stop();
        if here != spawn {
            self.move_entity(id, spawn);
        }
    }

    /// One cardinal step that brings `id` closer to `goal`, if any is free.
    pub(crate) fn step_towards(&mut self, id: InstanceId, goal: GridPos) {
        let Some(from) = self.entities.entity(id).map(|e| e.pos) else {
            return;
        };
        let current = manhattan(from, goal);
        if current <= 1 {
            return;
        }
        let step = CARDINALS
            .iter()
            .map(|(dx, dy)| from.offset(*dx, *dy))
            .filter(|p| self.is_walkable(*p) && manhattan(*p, goal) < current)
            .min_by_key(|p| (manhattan(*p, goal), p.distance(goal)));
        if let Some(pos) = step {
            self.move_entity(id, pos);
        }
    }

    /// Nudge an idle mob off a tile it shares with another character.
    pub(crate) fn unstack(&mut self, id: InstanceId) {
        let Some(pos) = self.entities.entity(id).map(|e| e.pos) else {
            return;
        };
        let stacked = self
            .grid
            .entities_at(pos)
            .into_iter()
            .any(|other| other != id && other.kind.is_character());
        if !stacked {
            return;
        }
        let options: Vec<GridPos> = CARDINALS
            .iter()
            .map(|(dx, dy)| pos.offset(*dx, *dy))
            .filter(|p| self.is_walkable(*p))
            .collect();
        if let Some(next) = options.choose(&mut self.rng).copied() {
            self.move_entity(id, next);
        }
    }

    /// Remove every minion `boss` owns.
    pub(crate) fn despawn_minions(&mut self, boss: InstanceId) {
        let minions = self
            .entities
            .mobs
            .get_mut(&boss)
            .map(|m| std::mem::take(&mut m.minions))
            .unwrap_or_default();
        for minion in minions {
            if let Some(m) = self.entities.mobs.get_mut(&minion) {
                m.master = None;
            }
            self.remove_entity(minion, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_counts_both_axes() {
        assert_eq!(manhattan(GridPos::new(1, 1), GridPos::new(4, 3)), 5);
        assert_eq!(manhattan(GridPos::new(2, 2), GridPos::new(2, 2)), 0);
    }
}
