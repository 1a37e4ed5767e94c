//! Per-character combat state machine.
//!
//! `Combat` is the data each character carries. `CombatCtl` drives it: it
//! holds the world and the character's id, and looks the character up again
//! on every access, so a target or attacker that vanished mid-fight is just
//! a failed lookup.

mod hit;
mod queue;

pub use hit::{Hit, HitKind};
pub use queue::CombatQueue;

use std::collections::BTreeSet;

use engine_core::{TimerHandle, TimerOwner};
use instance::InstanceId;
use net::{PacketScope, ServerMessage};
use rand::Rng;

use crate::entity::{BehaviorState, Character};
use crate::world::{Task, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CombatTimers {
    attack: TimerHandle,
    follow: TimerHandle,
    check: TimerHandle,
}

/// Idle while `timers` is `None`, engaged otherwise.
#[derive(Debug, Clone, Default)]
pub struct Combat {
    timers: Option<CombatTimers>,
    attackers: BTreeSet<InstanceId>,
    queue: CombatQueue,
    started_at: Option<u64>,
    last_action: u64,
    last_hit: Option<u64>,
}

impl Combat {
    pub fn is_engaged(&self) -> bool {
        self.timers.is_some()
    }

    pub fn is_attacked(&self) -> bool {
        !self.attackers.is_empty()
    }

    pub fn has_attacker(&self, id: InstanceId) -> bool {
        self.attackers.contains(&id)
    }

    pub fn attackers(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.attackers.iter().copied()
    }

    pub fn queue(&self) -> &CombatQueue {
        &self.queue
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn last_action(&self) -> u64 {
        self.last_action
    }

    pub fn last_hit(&self) -> Option<u64> {
        self.last_hit
    }
}

impl World {
    /// Combat controller for character `id`.
    pub fn combat(&mut self, id: InstanceId) -> CombatCtl<'_> {
        CombatCtl { world: self, id }
    }
}

pub struct CombatCtl<'w> {
    world: &'w mut World,
    id: InstanceId,
}

impl CombatCtl<'_> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    fn character(&self) -> Option<&Character> {
        self.world.entities.character(self.id)
    }

    fn character_mut(&mut self) -> Option<&mut Character> {
        self.world.entities.character_mut(self.id)
    }

    fn alive(&self) -> Option<&Character> {
        self.character().filter(|c| !c.is_dead())
    }

    /// Controller for another character, for behaviors that direct minions.
    pub fn other(&mut self, id: InstanceId) -> CombatCtl<'_> {
        self.world.combat(id)
    }

    pub fn target(&self) -> Option<InstanceId> {
        self.character().and_then(|c| c.target)
    }

    pub fn hit_points(&self) -> Option<(u32, u32)> {
        self.character().map(|c| (c.hit_points, c.max_hit_points))
    }

    pub fn is_engaged(&self) -> bool {
        self.character().is_some_and(|c| c.combat.is_engaged())
    }

    pub fn is_attacked(&self) -> bool {
        self.character().is_some_and(|c| c.combat.is_attacked())
    }

    pub fn attackers(&self) -> Vec<InstanceId> {
        self.character()
            .map(|c| c.combat.attackers().collect())
            .unwrap_or_default()
    }

    /// Run `f` for every current attacker.
    pub fn for_each_attacker<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut World, InstanceId),
    {
        for attacker in self.attackers() {
            f(&mut *self.world, attacker);
        }
    }

    pub fn add_attacker(&mut self, attacker: InstanceId) {
        if let Some(c) = self.character_mut() {
            c.combat.attackers.insert(attacker);
        }
    }

    /// Drop `attacker` from the roster; a mob left with nobody fighting it
    /// goes home.
    pub fn remove_attacker(&mut self, attacker: InstanceId) {
        let id = self.id;
        let Some(c) = self.character_mut() else {
            return;
        };
        c.combat.attackers.remove(&attacker);
        let go_home = !c.combat.is_attacked() && !c.is_dead() && id.is_mob();
        if go_home {
            self.world.send_to_spawn(id);
        }
    }

    /// Engage `opponent`: it becomes the target, both sides list each other
    /// as attackers, and one attack is queued right away unless a hit is
    /// already pending.
    pub fn begin(&mut self, opponent: InstanceId) {
        if opponent == self.id || self.alive().is_none() {
            return;
        }
        if !self.world.entities.is_alive_character(opponent) {
            return;
        }
        self.start();
        if let Some(c) = self.character_mut() {
            c.target = Some(opponent);
        }
        self.add_attacker(opponent);
        self.world.combat(opponent).add_attacker(self.id);
        let pending = self.character().is_some_and(|c| c.combat.queue.has_queue());
        if !pending {
            self.attack(opponent);
        }
    }

    /// Launch the attack, follow and check intervals. No-op when engaged.
    pub fn start(&mut self) {
        let now = self.world.now;
        let follow_every = self.world.config.combat.follow_interval_ms.max(1);
        let check_every = self.world.config.combat.check_interval_ms.max(1);
        let Some(c) = self.character() else {
            return;
        };
        if c.combat.is_engaged() {
            return;
        }
        let attack_every = c.attack_rate.max(1);
        let id = self.id;
        let owner = TimerOwner::Entity(id);
        let scheduler = &mut self.world.scheduler;
        let timers = CombatTimers {
            attack: scheduler.every(owner, now + attack_every, attack_every, Task::CombatAttack(id)),
            follow: scheduler.every(owner, now + follow_every, follow_every, Task::CombatFollow(id)),
            check: scheduler.every(owner, now + check_every, check_every, Task::CombatCheck(id)),
        };
        if let Some(c) = self.character_mut() {
            c.combat.timers = Some(timers);
            c.combat.started_at = Some(now);
            c.combat.last_action = now;
        }
        tracing::debug!(entity = %id, "combat started");
    }

    /// Cancel the three intervals. Roster and target are kept.
    pub fn stop(&mut self) {
        let Some(timers) = self.character_mut().and_then(|c| c.combat.timers.take()) else {
            return;
        };
        let scheduler = &mut self.world.scheduler;
        scheduler.cancel(timers.attack);
        scheduler.cancel(timers.follow);
        scheduler.cancel(timers.check);
        if let Some(c) = self.character_mut() {
            c.combat.started_at = None;
        }
        tracing::debug!(entity = %self.id, "combat stopped");
    }

    /// Clear roster, target and pending hits. A mob also loses its minions.
    pub fn forget(&mut self) {
        let Some(c) = self.character_mut() else {
            return;
        };
        c.combat.attackers.clear();
        c.combat.queue.clear();
        c.target = None;
        if self.id.is_mob() {
            self.world.despawn_minions(self.id);
            self.world.with_behavior(self.id, |behavior, ctl| behavior.on_forget(ctl));
        }
    }

    /// Compute a hit against `target` and queue it for the next attack tick.
    pub fn attack(&mut self, target: InstanceId) {
        let world = &mut *self.world;
        let (Some(me), Some(them)) = (world.entities.character(self.id), world.entities.character(target)) else {
            return;
        };
        if me.is_dead() || them.is_dead() {
            return;
        }
        let damage = world.formulas.damage(me, them);
        let ranged = me.is_ranged();

        let special = world
            .entities
            .mobs
            .get(&self.id)
            .and_then(|mob| mob.data.special.map(|kind| (kind, mob.data.special_per_mille)));
        let kind = match special {
            Some((kind, chance)) if world.rng.gen_range(0..1000) < chance => kind,
            _ => HitKind::Damage,
        };

        let mut hit = Hit::new(kind, damage).ranged(ranged);
        if self.id.is_player() {
            hit = if ranged {
                hit.with_skills(["archery"])
            } else {
                hit.with_skills(["accuracy", "strength"])
            };
        }
        if let Some(c) = self.character_mut() {
            c.combat.queue.add(hit);
        }
    }

    /// Server-side attack speed limit.
    pub fn can_hit(&self) -> bool {
        let Some(c) = self.character() else {
            return false;
        };
        match c.combat.last_hit {
            None => true,
            Some(last) => {
                let elapsed = self.world.now.saturating_sub(last);
                elapsed + self.world.config.combat.hit_tolerance_ms >= c.attack_rate
            }
        }
    }

    /// Apply `hit` to `target`. Rate limited unless `override_rate` is set.
    /// Ranged hits launch a projectile; damage still lands immediately.
    pub fn hit(&mut self, target: InstanceId, hit: Hit, override_rate: bool) -> bool {
        if !override_rate && !self.can_hit() {
            tracing::debug!(entity = %self.id, %target, "hit rejected, attack rate");
            return false;
        }
        let Some(me) = self.alive() else {
            return false;
        };
        let ranged = hit.ranged || me.is_ranged();
        let region = me.entity.region;
        if !self.world.entities.is_alive_character(target) {
            return false;
        }

        if ranged {
            let hit = hit.clone().ranged(true);
            self.world.spawn_projectile(self.id, target, hit);
        } else if let Some(key) = region {
            self.world.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Combat {
                    attacker: self.id,
                    target,
                    hit: hit.to_wire(),
                },
            );
        }

        let now = self.world.now;
        if let Some(c) = self.character_mut() {
            c.combat.last_hit = Some(now);
        }
        self.world.handle_damage(self.id, target, &hit);
        true
    }

    /// Hit every hostile character within `radius`. Area hits bypass the
    /// attack rate, so a volley lands even between regular attacks.
    pub fn deal_aoe(&mut self, radius: u32, has_terror: bool) -> usize {
        let Some(me) = self.alive() else {
            return 0;
        };
        let center = me.pos();
        let layer = me.entity.instance;
        let hits_players = self.id.is_mob();

        let world = &mut *self.world;
        let targets: Vec<InstanceId> = world
            .grid
            .entities_in_radius(center, radius)
            .into_iter()
            .filter(|t| *t != self.id)
            .filter(|t| if hits_players { t.is_player() } else { t.is_mob() })
            .filter(|t| {
                world
                    .entities
                    .character(*t)
                    .is_some_and(|c| !c.is_dead() && c.entity.instance == layer)
            })
            .collect();

        let mut landed = 0;
        for target in targets {
            let world = &mut *self.world;
            let (Some(me), Some(them)) = (world.entities.character(self.id), world.entities.character(target)) else {
                continue;
            };
            let damage = world.formulas.aoe_damage(me, them);
            if self.hit(target, Hit::area(damage, radius, has_terror), true) {
                landed += 1;
            }
        }
        self.world
            .with_behavior(self.id, |behavior, ctl| behavior.on_sub_aoe(ctl, radius, has_terror));
        landed
    }

    /// Queue a delayed `deal_aoe`, the wind-up of a special attack.
    pub fn schedule_aoe(&mut self, radius: u32, terror: bool) {
        let at = self.world.now + self.world.config.combat.aoe_windup_ms;
        let id = self.id;
        self.world.scheduler.once(
            TimerOwner::Entity(id),
            at,
            Task::AreaAttack {
                mob: id,
                radius,
                terror,
            },
        );
    }

    /// Spawn a minion of `key` next to this mob and record the ownership.
    pub fn spawn_minion(&mut self, key: &str) -> Option<InstanceId> {
        self.world.spawn_minion(self.id, key)
    }

    pub fn minions(&self) -> Vec<InstanceId> {
        self.world
            .entities
            .mobs
            .get(&self.id)
            .map(|m| m.minions.clone())
            .unwrap_or_default()
    }

    pub fn behavior_state(&mut self) -> Option<&mut BehaviorState> {
        self.world.entities.mobs.get_mut(&self.id).map(|m| &mut m.behavior)
    }

    // --- interval handlers ---

    pub(crate) fn parse_attack(&mut self) {
        let Some(me) = self.alive() else {
            return;
        };
        if !me.status.can_attack() {
            return;
        }
        let Some(target) = me.target else {
            return;
        };
        let reachable = self
            .world
            .entities
            .character(target)
            .filter(|them| !them.is_dead())
            .is_some_and(|them| me.in_proximity(them.pos()) && me.entity.instance == them.entity.instance);
        if !reachable {
            if let Some(c) = self.character_mut() {
                c.combat.queue.clear();
            }
            return;
        }

        self.attack(target);
        let pending = self.character_mut().and_then(|c| c.combat.queue.get_hit());
        if let Some(hit) = pending {
            self.hit(target, hit, false);
        }
        let now = self.world.now;
        if let Some(c) = self.character_mut() {
            c.combat.last_action = now;
        }
    }

    pub(crate) fn parse_follow(&mut self) {
        let Some(me) = self.alive() else {
            return;
        };
        if !me.status.can_move() {
            return;
        }
        let target = me.target;
        let target_pos = target
            .and_then(|t| self.world.entities.character(t))
            .filter(|them| !them.is_dead())
            .map(|them| them.pos());

        if self.id.is_player() {
            let chasing_player = target.is_some_and(|t| t.is_player());
            if let (true, Some(t), Some(pos)) = (chasing_player, target, target_pos) {
                if !me.in_proximity(pos) {
                    self.world.outbox.push(
                        PacketScope::Player(self.id),
                        ServerMessage::Follow {
                            instance: self.id,
                            target: t,
                        },
                    );
                }
            }
            return;
        }

        let leashed = match (self.world.entities.mobs.get(&self.id), target_pos) {
            (Some(mob), Some(pos)) => !mob.within_leash(pos),
            _ => false,
        };
        if leashed {
            tracing::debug!(mob = %self.id, "target left leash range");
            self.stop();
            self.forget();
            self.world.send_to_spawn(self.id);
            return;
        }

        match target_pos {
            Some(pos) if !me.in_proximity(pos) => self.follow_closest_attacker(),
            None if target.is_none() => self.world.unstack(self.id),
            _ => {}
        }
    }

    fn follow_closest_attacker(&mut self) {
        let Some(me) = self.alive() else {
            return;
        };
        let here = me.pos();
        let closest = me
            .combat
            .attackers()
            .filter_map(|a| self.world.entities.character(a))
            .filter(|c| !c.is_dead())
            .min_by_key(|c| (here.distance(c.pos()), c.id()))
            .map(|c| (c.id(), c.pos()));
        let Some((next, pos)) = closest else {
            return;
        };
        if let Some(c) = self.character_mut() {
            c.target = Some(next);
        }
        if let Some(key) = self.alive().and_then(|c| c.entity.region) {
            self.world.outbox.push(
                PacketScope::Region(key),
                ServerMessage::Follow {
                    instance: self.id,
                    target: next,
                },
            );
        }
        self.world.step_towards(self.id, pos);
    }

    pub(crate) fn parse_check(&mut self) {
        let threshold = self.world.config.combat.last_action_threshold_ms;
        let now = self.world.now;
        let Some(c) = self.character() else {
            return;
        };
        if now.saturating_sub(c.combat.last_action) > threshold {
            tracing::debug!(entity = %self.id, "combat timed out");
            self.stop();
            self.forget();
        }
    }
}
