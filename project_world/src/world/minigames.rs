use instance::InstanceId;
use net::{PacketScope, ServerMessage};
use rand::Rng;
use space::{GridPos, SpaceError};

use super::World;
use crate::error::WorldError;
use crate::minigame::{MinigameAction, TEAM_WAR};

const COURSING_TARGET_DISTANCE: std::ops::RangeInclusive<i32> = 3..=5;
const COURSING_PLACEMENT_TRIES: usize = 16;

impl World {
    pub(crate) fn apply_minigame_actions(&mut self, actions: Vec<MinigameAction>) {
        for action in actions {
            match action {
                MinigameAction::Teleport { player, to } => {
                    if self.entities.is_alive_character(player) {
                        self.teleport(player, to);
                    }
                }
                MinigameAction::Notify { player, message } => {
                    self.outbox
                        .push(PacketScope::Player(player), ServerMessage::Notification { message });
                }
            }
        }
    }

    /// Once a second: advance the team war and tell its players.
    pub(crate) fn team_war_tick(&mut self) {
        let actions = self.team_war.tick(&mut self.rng);
        self.apply_minigame_actions(actions);
        for player in self.team_war.participants() {
            let status = self.team_war.status_for(player);
            self.outbox
                .push(PacketScope::Player(player), ServerMessage::Minigame { status });
        }
    }

    /// Join or leave the team war lobby depending on where the player stands.
    /// A player in a coursing session stays out of it.
    pub(crate) fn check_minigame_area(&mut self, player: InstanceId) {
        if self.coursing.is_active(player) {
            return;
        }
        let Some(pos) = self.entities.character(player).map(|c| c.pos()) else {
            return;
        };
        let in_lobby_area = self.regions.areas().minigame_at(pos) == Some(TEAM_WAR);
        if in_lobby_area {
            if self.team_war.join_lobby(player) {
                let message = format!(
                    "You joined the team war lobby. The game starts in {} seconds.",
                    self.team_war.countdown()
                );
                self.outbox
                    .push(PacketScope::Player(player), ServerMessage::Notification { message });
            }
        } else if self.team_war.leave_lobby(player) {
            self.outbox.push(
                PacketScope::Player(player),
                ServerMessage::Notification {
                    message: "You left the team war lobby.".to_string(),
                },
            );
        }
    }

    pub(crate) fn on_player_died(&mut self, player: InstanceId, killer: Option<InstanceId>) {
        if self.team_war.on_kill(killer, player) {
            let (red, blue) = self.team_war.scores();
            tracing::debug!(%player, killer = ?killer, red, blue, "team war kill");
        }
    }

    pub(crate) fn on_killed(&mut self, victim: InstanceId, _killer: Option<InstanceId>, owner: Option<InstanceId>) {
        let Some(owner) = owner else {
            return;
        };
        if self.coursing.record_kill(owner, victim).is_none() {
            return;
        }
        self.spawn_coursing_target(owner);
        self.send_coursing_status(owner);
    }

    fn send_coursing_status(&mut self, player: InstanceId) {
        if let Some(status) = self.coursing.status_for(player) {
            self.outbox
                .push(PacketScope::Player(player), ServerMessage::Minigame { status });
        }
    }

    /// Move the player into a private copy of the regions around them and
    /// give them something to chase.
    pub(crate) fn enter_coursing(&mut self, player: InstanceId) -> Result<(), WorldError> {
        if self.coursing.is_active(player) {
            return Ok(());
        }
        if self.team_war.is_participant(player) {
            return Err(WorldError::NotPermitted("already in a minigame"));
        }
        let key = self.config.minigame.coursing_mob.clone();
        if self.content.mob(&key).is_none() {
            return Err(WorldError::UnknownMob(key));
        }
        let c = self
            .entities
            .character(player)
            .ok_or(WorldError::UnknownEntity(player))?;
        if c.is_dead() {
            return Ok(());
        }
        let pos = c.pos();
        let region = c.entity.region;
        let index = self
            .regions
            .region_index(pos)
            .ok_or(SpaceError::OutOfBounds { x: pos.x, y: pos.y })?;

        self.detach_from_combat(player);
        if let Some(key) = region {
            let observers: Vec<InstanceId> = self
                .regions
                .players_in(key)
                .iter()
                .copied()
                .filter(|p| *p != player)
                .collect();
            self.outbox.push(
                PacketScope::Players(observers),
                ServerMessage::Despawn { instance: player },
            );
        }

        self.regions.create_instance(player, index);
        if let Some(p) = self.entities.players.get_mut(&player) {
            self.regions.remove(&mut p.character.entity);
            p.character.entity.instance = Some(player);
            p.loaded_regions.clear();
            self.regions.handle(&mut p.character.entity);
            p.character.entity.recently_left.clear();
        }
        self.coursing.enter(player);
        self.spawn_coursing_target(player);

        self.send_region(player, true);
        self.send_entities(player);
        self.send_coursing_status(player);
        tracing::info!(%player, "coursing started");
        Ok(())
    }

    fn spawn_coursing_target(&mut self, player: InstanceId) {
        let Some(center) = self.entities.character(player).map(|c| c.pos()) else {
            return;
        };
        let mut pos = None;
        for _ in 0..COURSING_PLACEMENT_TRIES {
            let dx = self.rng.gen_range(COURSING_TARGET_DISTANCE) * if self.rng.gen_bool(0.5) { 1 } else { -1 };
            let dy = self.rng.gen_range(COURSING_TARGET_DISTANCE) * if self.rng.gen_bool(0.5) { 1 } else { -1 };
            let candidate = center.offset(dx, dy);
            if self.is_walkable(candidate) {
                pos = Some(candidate);
                break;
            }
        }
        let pos: GridPos = pos.unwrap_or(center);
        let key = self.config.minigame.coursing_mob.clone();
        match self.spawn_private_mob(player, &key, pos) {
            Ok(target) => self.coursing.set_target(player, target),
            Err(e) => tracing::warn!(%player, error = %e, "coursing target not spawned"),
        }
    }

    /// Tear the private session down and put the player back in the shared
    /// world where they stand.
    pub(crate) fn leave_coursing(&mut self, player: InstanceId) {
        let Some(session) = self.coursing.leave(player) else {
            return;
        };
        if let Some(target) = session.target {
            if self.entities.mobs.contains_key(&target) {
                self.remove_entity(target, false);
            }
        }
        self.detach_from_combat(player);

        let dead = match self.entities.players.get_mut(&player) {
            Some(p) => {
                self.regions.remove(&mut p.character.entity);
                p.character.entity.instance = None;
                p.loaded_regions.clear();
                p.character.is_dead()
            }
            None => true,
        };
        for leftover in self.regions.delete_instance(player) {
            if leftover != player {
                self.remove_entity(leftover, false);
            }
        }
        if !dead {
            if let Some(p) = self.entities.players.get_mut(&player) {
                self.regions.handle(&mut p.character.entity);
                p.character.entity.recently_left.clear();
            }
            self.send_region(player, true);
            self.send_entities(player);
        }
        tracing::info!(%player, score = session.score, "coursing ended");
    }
}
