use std::collections::BTreeMap;

use engine_core::{TimerHandle, TimerOwner};
use instance::InstanceId;
use net::{PacketScope, ServerMessage};
use rand::Rng;
use space::GridPos;

use super::{Task, World, WorldEvent};
use crate::combat::{Hit, HitKind};
use crate::entity::{BehaviorState, Damageable, Status};

const SKILL_EXPERIENCE_PER_DAMAGE: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Stun,
    Freeze,
    Poison,
}

impl Effect {
    fn slots(self, status: &mut Status) -> (&mut bool, &mut Option<TimerHandle>) {
        match self {
            Effect::Stun => (&mut status.stunned, &mut status.stun_clear),
            Effect::Freeze => (&mut status.frozen, &mut status.freeze_clear),
            Effect::Poison => (&mut status.poisoned, &mut status.poison_clear),
        }
    }

    fn clear_task(self, id: InstanceId) -> Task {
        match self {
            Effect::Stun => Task::ClearStun(id),
            Effect::Freeze => Task::ClearFreeze(id),
            Effect::Poison => Task::ClearPoison(id),
        }
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl World {
    /// Apply a landed hit: hit points, experience, side effects, death and
    /// retaliation.
    pub(crate) fn handle_damage(&mut self, attacker: InstanceId, target: InstanceId, hit: &Hit) {
        let Some(c) = self.entities.character_mut(target) else {
            return;
        };
        if c.is_dead() {
            return;
        }
        let remaining = c.take_damage(hit.damage);
        c.last_attacker = Some(attacker);
        let max = c.max_hit_points;
        if let Some(key) = c.entity.region {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Points {
                    instance: target,
                    hit_points: remaining,
                    max_hit_points: max,
                },
            );
        }

        if attacker.is_player() {
            self.credit_skills(attacker, hit);
            if !hit.ranged && !hit.aoe {
                self.roll_weapon_break(attacker, target);
            }
        }

        if remaining == 0 {
            self.kill(target, Some(attacker));
            return;
        }

        if target.is_mob() {
            self.with_behavior(target, |behavior, ctl| behavior.on_damage(ctl, attacker, hit.damage));
        }
        match hit.kind {
            HitKind::Stun => self.apply_effect(target, Effect::Stun, self.config.combat.stun_duration_ms),
            HitKind::Freeze => self.apply_effect(target, Effect::Freeze, self.config.combat.freeze_duration_ms),
            HitKind::Poison => self.apply_effect(target, Effect::Poison, self.config.combat.poison_duration_ms),
            HitKind::Damage | HitKind::Critical => {}
        }

        let retaliates = target.is_mob()
            && self
                .entities
                .character(target)
                .is_some_and(|c| !c.is_dead() && c.target.is_none());
        if retaliates && self.entities.is_alive_character(attacker) {
            self.combat(target).begin(attacker);
        }
    }

    fn credit_skills(&mut self, player: InstanceId, hit: &Hit) {
        if hit.damage == 0 || hit.skills.is_empty() {
            return;
        }
        let amount = u64::from(hit.damage) * SKILL_EXPERIENCE_PER_DAMAGE;
        let Some(p) = self.entities.players.get_mut(&player) else {
            return;
        };
        for skill in &hit.skills {
            p.add_skill_experience(skill, amount);
            self.outbox.push(
                PacketScope::Player(player),
                ServerMessage::Experience {
                    instance: player,
                    amount: clamp_u32(amount),
                    skill: Some(skill.clone()),
                },
            );
        }
    }

    fn roll_weapon_break(&mut self, player: InstanceId, target: InstanceId) {
        let (Some(p), Some(t)) = (self.entities.players.get(&player), self.entities.character(target)) else {
            return;
        };
        if !self.formulas.weapon_break(p, t) {
            return;
        }
        let Some(weapon) = self.entities.players.get_mut(&player).and_then(|p| p.weapon.take()) else {
            return;
        };
        tracing::debug!(%player, %weapon, "weapon broke");
        self.outbox.push(
            PacketScope::Player(player),
            ServerMessage::Notification {
                message: format!("Your {weapon} has broken."),
            },
        );
    }

    // --- status effects ---

    fn apply_effect(&mut self, id: InstanceId, effect: Effect, duration: u64) {
        let Some(c) = self.entities.character_mut(id) else {
            return;
        };
        let region = c.entity.region;
        let (flag, slot) = effect.slots(&mut c.status);
        *flag = true;
        if let Some(previous) = slot.take() {
            self.scheduler.cancel(previous);
        }
        let handle = self
            .scheduler
            .once(TimerOwner::Entity(id), self.now + duration, effect.clear_task(id));
        if let Some(c) = self.entities.character_mut(id) {
            *effect.slots(&mut c.status).1 = Some(handle);
        }
        if let (Effect::Stun, Some(key)) = (effect, region) {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Stun {
                    instance: id,
                    state: true,
                },
            );
        }
    }

    fn clear_effect(&mut self, id: InstanceId, effect: Effect) {
        let Some(c) = self.entities.character_mut(id) else {
            return;
        };
        let region = c.entity.region;
        let (flag, slot) = effect.slots(&mut c.status);
        let was_set = std::mem::replace(flag, false);
        *slot = None;
        if let (true, Effect::Stun, Some(key)) = (was_set, effect, region) {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Stun {
                    instance: id,
                    state: false,
                },
            );
        }
    }

    pub(crate) fn clear_stun(&mut self, id: InstanceId) {
        self.clear_effect(id, Effect::Stun);
    }

    pub(crate) fn clear_freeze(&mut self, id: InstanceId) {
        self.clear_effect(id, Effect::Freeze);
    }

    pub(crate) fn clear_poison(&mut self, id: InstanceId) {
        self.clear_effect(id, Effect::Poison);
    }

    // --- death ---

    pub(crate) fn kill(&mut self, id: InstanceId, killer: Option<InstanceId>) {
        if id.is_player() {
            self.player_death(id, killer);
        } else if id.is_mob() {
            self.mob_death(id, killer);
        }
    }

    fn mob_death(&mut self, id: InstanceId, killer: Option<InstanceId>) {
        let Some(mob) = self.entities.mobs.get_mut(&id) else {
            return;
        };
        if mob.character.is_dead() {
            return;
        }
        mob.character.entity.dead = true;
        let key = mob.character.entity.key.clone();
        let pos = mob.character.pos();
        let region = mob.character.entity.region;
        let owner = mob.character.entity.instance;
        let experience = mob.data.experience;
        let drops = mob.data.drops.clone();
        let respawns = mob.respawns && !mob.is_minion();
        let delay = mob.data.respawn_delay_ms;

        self.with_behavior(id, |behavior, ctl| behavior.on_death(ctl));
        self.detach_from_combat(id);

        if let Some(key) = region {
            self.outbox
                .push(PacketScope::Region(key), ServerMessage::Despawn { instance: id });
        }
        self.roll_drop(&drops, pos, owner);
        if let Some(player) = killer.filter(|k| k.is_player()) {
            self.award_experience(player, experience);
        }
        self.events.emit(WorldEvent::Killed {
            victim: id,
            key,
            killer,
            owner,
        });
        tracing::debug!(mob = %id, killer = ?killer, respawns, "mob died");

        if !respawns {
            self.remove_entity(id, false);
            return;
        }
        self.scheduler.cancel_owner(TimerOwner::Entity(id));
        if let Some(mob) = self.entities.mobs.get_mut(&id) {
            self.regions.remove(&mut mob.character.entity);
        }
        self.grid.remove_entity(id, pos);
        self.scheduler
            .once(TimerOwner::Entity(id), self.now + delay, Task::Respawn(id));
    }

    /// Roll the drop table once; at most one item drops.
    fn roll_drop(&mut self, drops: &BTreeMap<String, u32>, pos: GridPos, instance: Option<InstanceId>) {
        if drops.is_empty() {
            return;
        }
        let roll = self.rng.gen_range(0..1000);
        let mut cumulative = 0;
        for (item, chance) in drops {
            cumulative += chance;
            if roll < cumulative {
                if let Err(e) = self.spawn_item_in(item, pos, true, 1, instance) {
                    tracing::warn!(%item, error = %e, "drop not spawned");
                }
                return;
            }
        }
    }

    fn award_experience(&mut self, player: InstanceId, amount: u64) {
        let Some(p) = self.entities.players.get_mut(&player) else {
            return;
        };
        let levelled = p.add_experience(amount);
        let level = p.character.level;
        self.outbox.push(
            PacketScope::Player(player),
            ServerMessage::Experience {
                instance: player,
                amount: clamp_u32(amount),
                skill: None,
            },
        );
        if levelled {
            self.outbox.push(
                PacketScope::Player(player),
                ServerMessage::Notification {
                    message: format!("You are now level {level}."),
                },
            );
        }
    }

    fn player_death(&mut self, id: InstanceId, killer: Option<InstanceId>) {
        if self.coursing.is_active(id) {
            self.leave_coursing(id);
        }
        let Some(p) = self.entities.players.get_mut(&id) else {
            return;
        };
        if p.character.is_dead() {
            return;
        }
        p.character.entity.dead = true;
        let region = p.character.entity.region;
        let pos = p.character.pos();

        self.outbox
            .push(PacketScope::Player(id), ServerMessage::Death { instance: id });
        if let Some(key) = region {
            self.outbox
                .push(PacketScope::Region(key), ServerMessage::Despawn { instance: id });
        }
        self.detach_from_combat(id);
        if let Some(p) = self.entities.players.get_mut(&id) {
            self.regions.remove(&mut p.character.entity);
        }
        self.grid.remove_entity(id, pos);
        self.events.emit(WorldEvent::PlayerDied { player: id, killer });
        tracing::info!(player = %id, killer = ?killer, "player died");
    }

    // --- respawn ---

    pub(crate) fn respawn_player(&mut self, id: InstanceId) {
        let spawn = self
            .team_war
            .respawn_point(id)
            .unwrap_or_else(|| self.config.map.spawn());
        let Some(p) = self.entities.players.get_mut(&id) else {
            return;
        };
        if !p.character.is_dead() {
            return;
        }
        p.character.revive();
        p.character.entity.set_position(spawn);
        p.loaded_regions.clear();
        let (hit_points, max_hit_points) = (p.character.hit_points, p.character.max_hit_points);

        self.place(id);
        self.outbox.push(
            PacketScope::Player(id),
            ServerMessage::Points {
                instance: id,
                hit_points,
                max_hit_points,
            },
        );
        self.send_region(id, true);
        self.send_entities(id);
    }

    pub(crate) fn respawn_mob(&mut self, id: InstanceId) {
        let Some(mob) = self.entities.mobs.get_mut(&id) else {
            return;
        };
        if !mob.character.is_dead() {
            return;
        }
        mob.character.revive();
        mob.behavior = BehaviorState::default();
        let spawn = mob.spawn;
        mob.character.entity.set_position(spawn);
        self.place(id);
        self.start_mob_timers(id);
        tracing::debug!(mob = %id, "mob respawned");
    }

    // --- intervals ---

    /// Poison ticks down to 1 hit point at most; otherwise an idle
    /// character regenerates.
    pub(crate) fn heal_tick(&mut self, id: InstanceId) {
        let poison = self.config.combat.poison_damage;
        let player_heal = self.config.player.heal_amount;
        let Some(c) = self.entities.character_mut(id) else {
            return;
        };
        if c.is_dead() {
            return;
        }
        if c.status.poisoned {
            let damage = poison.min(c.hit_points.saturating_sub(1));
            if damage == 0 {
                return;
            }
            c.take_damage(damage);
        } else if !c.combat.is_engaged() && c.hit_points < c.max_hit_points {
            let amount = if id.is_player() {
                player_heal
            } else {
                (c.max_hit_points / 10).max(1)
            };
            c.heal(amount);
        } else {
            return;
        }
        let (hit_points, max_hit_points) = (c.hit_points, c.max_hit_points);
        if let Some(key) = c.entity.region {
            self.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Points {
                    instance: id,
                    hit_points,
                    max_hit_points,
                },
            );
        }
    }

    /// Idle mobs wander around their spawn point.
    pub(crate) fn roam(&mut self, id: InstanceId) {
        let Some(mob) = self.entities.mobs.get(&id) else {
            return;
        };
        let c = &mob.character;
        let idle = !c.is_dead() && c.target.is_none() && !c.combat.is_engaged() && c.status.can_move();
        let distance = mob.data.roam_distance as i32;
        if !idle || distance == 0 {
            return;
        }
        let (spawn, here) = (mob.spawn, c.pos());
        if !self.rng.gen_bool(0.5) {
            return;
        }
        let dx = self.rng.gen_range(-distance..=distance);
        let dy = self.rng.gen_range(-distance..=distance);
        let pos = spawn.offset(dx, dy);
        if pos == here || !self.is_walkable(pos) {
            return;
        }
        self.move_entity(id, pos);
    }

    pub(crate) fn blink_item(&mut self, id: InstanceId) {
        let Some(item) = self.entities.items.get_mut(&id) else {
            return;
        };
        if item.blinking {
            return;
        }
        item.blinking = true;
        if let Some(key) = item.entity.region {
            self.outbox
                .push(PacketScope::Region(key), ServerMessage::Blink { instance: id });
        }
    }
}
