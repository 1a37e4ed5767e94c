use engine_core::TimerOwner;
use instance::{EntityKind, InstanceId};
use net::channels::NetToTick;
use net::{ClientMessage, CommandThrottle, CoursingAction, PacketScope, PositionWire, ServerMessage};
use session::SessionId;
use space::{AreaKind, GridPos};

use super::{Task, World};
use crate::entity::{Player, Visible};
use crate::error::WorldError;

const MAX_NAME_LENGTH: usize = 16;

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl World {
    pub fn handle_net(&mut self, event: NetToTick) {
        match event {
            NetToTick::NewConnection { session_id } => {
                self.sessions.create_session_with_id(session_id);
                self.throttles.insert(
                    session_id,
                    CommandThrottle::new(self.config.net.max_packets_per_second, self.now),
                );
                tracing::debug!(session = %session_id, "session opened");
            }
            NetToTick::Packet { session_id, text } => self.handle_packet(session_id, &text),
            NetToTick::Disconnected { session_id } => self.disconnect(session_id),
        }
    }

    /// The error boundary: whatever goes wrong with one packet is logged
    /// and the session carries on.
    pub fn handle_packet(&mut self, session: SessionId, text: &str) {
        if let Some(throttle) = self.throttles.get_mut(&session) {
            if !throttle.try_consume(self.now) {
                tracing::debug!(%session, "packet dropped, rate limit");
                return;
            }
        }
        if let Err(e) = self.dispatch(session, text) {
            tracing::warn!(%session, packet = %text, error = %e, "packet rejected");
        }
        self.process_events();
    }

    fn dispatch(&mut self, session: SessionId, text: &str) -> Result<(), WorldError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        let player = match message {
            ClientMessage::Login { name } => return self.login(session, &name),
            ClientMessage::Ping => {
                self.reply(session, &ServerMessage::Pong);
                return Ok(());
            }
            _ => self
                .sessions
                .player_for_session(session)
                .ok_or(WorldError::NotPermitted("not logged in"))?,
        };

        match message {
            ClientMessage::Move { x, y } => self.handle_move(player, GridPos::new(x, y)),
            ClientMessage::Target { instance } => {
                self.handle_target(player, instance);
                Ok(())
            }
            ClientMessage::Attack { instance } => {
                self.handle_attack(player, instance);
                Ok(())
            }
            ClientMessage::Respawn => {
                self.respawn_player(player);
                Ok(())
            }
            ClientMessage::Ready => {
                self.send_region(player, true);
                self.send_entities(player);
                self.send_entity_positions(player);
                Ok(())
            }
            ClientMessage::Region { force } => {
                self.send_region(player, force);
                Ok(())
            }
            ClientMessage::Coursing { action } => match action {
                CoursingAction::Enter => self.enter_coursing(player),
                CoursingAction::Leave => {
                    self.leave_coursing(player);
                    Ok(())
                }
            },
            ClientMessage::Login { .. } | ClientMessage::Ping => Ok(()),
        }
    }

    fn login(&mut self, session: SessionId, name: &str) -> Result<(), WorldError> {
        let name = name.trim();
        if !valid_name(name) {
            self.reply(
                session,
                &ServerMessage::Error {
                    message: "Invalid name.".to_string(),
                },
            );
            return Err(WorldError::NotPermitted("invalid name"));
        }
        if self.sessions.get_session(session).is_none() {
            return Err(WorldError::NotPermitted("unknown session"));
        }
        if self.sessions.player_for_session(session).is_some() {
            return Err(WorldError::NotPermitted("already logged in"));
        }
        if self.sessions.is_name_online(name) {
            self.reply(
                session,
                &ServerMessage::Error {
                    message: "That name is already online.".to_string(),
                },
            );
            return Ok(());
        }

        let record = match self.store.load(name) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(player = name, error = %e, "load failed, starting fresh");
                None
            }
        };
        let spawn = record
            .as_ref()
            .map(|r| GridPos::new(r.x, r.y))
            .filter(|pos| self.is_walkable(*pos))
            .unwrap_or_else(|| self.config.map.spawn());

        let id = self.allocator.allocate(EntityKind::Player);
        let mut player = Player::new(id, session, name, spawn, &self.config.player);
        if let Some(record) = &record {
            player.apply_record(record);
        }
        let welcome = ServerMessage::Welcome {
            session_id: session.0,
            instance: id,
            name: name.to_string(),
            x: spawn.x,
            y: spawn.y,
            hit_points: player.character.hit_points,
            max_hit_points: player.character.max_hit_points,
        };
        self.sessions.bind_player(session, id, name);
        self.entities.players.insert(id, player);
        self.place(id);

        self.outbox.push(PacketScope::Player(id), welcome);
        self.send_region(id, true);
        self.send_entities(id);
        let heal = self.config.mobs.heal_interval_ms.max(1);
        self.scheduler
            .every(TimerOwner::Entity(id), self.now + heal, heal, Task::Heal(id));
        self.check_minigame_area(id);
        tracing::info!(player = %id, name, %session, "player logged in");
        Ok(())
    }

    fn handle_move(&mut self, player: InstanceId, to: GridPos) -> Result<(), WorldError> {
        let c = self
            .entities
            .character(player)
            .ok_or(WorldError::UnknownEntity(player))?;
        if c.is_dead() || !c.status.can_move() {
            return Ok(());
        }
        let from = c.pos();
        if from.distance(to) != 1 || !self.is_walkable(to) {
            tracing::debug!(%player, %from, %to, "movement rejected");
            return Ok(());
        }
        self.move_entity(player, to);
        self.check_minigame_area(player);
        self.check_aggro(player);
        Ok(())
    }

    /// Aggressive mobs near a player that just moved may start a fight.
    fn check_aggro(&mut self, player: InstanceId) {
        if self.max_aggro_range == 0 {
            return;
        }
        let Some(pc) = self.entities.character(player) else {
            return;
        };
        let aggressors: Vec<InstanceId> = self
            .grid
            .entities_in_radius(pc.pos(), self.max_aggro_range)
            .into_iter()
            .filter(|id| id.is_mob())
            .filter(|id| self.entities.mobs.get(id).is_some_and(|m| m.can_aggro(pc)))
            .collect();
        for mob in aggressors {
            if !self.entities.is_alive_character(player) {
                break;
            }
            tracing::debug!(%mob, %player, "aggro");
            self.combat(mob).begin(player);
        }
    }

    fn handle_target(&mut self, player: InstanceId, target: InstanceId) {
        let visible = self
            .entities
            .visible(target)
            .is_some_and(|v| v.is_visible_to(player));
        if !visible || !self.entities.is_alive_character(target) {
            return;
        }
        if let Some(c) = self.entities.character_mut(player) {
            c.target = Some(target);
        }
    }

    fn handle_attack(&mut self, player: InstanceId, target: InstanceId) {
        if target == player || !self.entities.is_alive_character(player) || !self.entities.is_alive_character(target) {
            return;
        }
        let visible = self
            .entities
            .visible(target)
            .is_some_and(|v| v.is_visible_to(player));
        if !visible {
            return;
        }
        if target.is_player() && !self.can_attack_player(player, target) {
            self.outbox.push(
                PacketScope::Player(player),
                ServerMessage::Notification {
                    message: "You cannot attack that player here.".to_string(),
                },
            );
            return;
        }
        self.combat(player).begin(target);
    }

    fn can_attack_player(&self, attacker: InstanceId, target: InstanceId) -> bool {
        let areas = self.regions.areas();
        let in_pvp = |id: InstanceId| {
            self.entities
                .character(id)
                .is_some_and(|c| areas.in_kind(c.pos(), AreaKind::Pvp))
        };
        (in_pvp(attacker) && in_pvp(target)) || self.team_war.can_attack(attacker, target)
    }

    fn disconnect(&mut self, session: SessionId) {
        self.throttles.remove(&session);
        let Some(player) = self.sessions.disconnect(session) else {
            self.sessions.remove_session(session);
            return;
        };
        if let Some(p) = self.entities.players.get(&player) {
            let record = p.to_record();
            if let Err(e) = self.store.save(&record) {
                tracing::warn!(player = %record.name, error = %e, "save failed");
            }
        }

        let actions = self.team_war.on_disconnect(player);
        self.apply_minigame_actions(actions);
        if self.coursing.is_active(player) {
            self.leave_coursing(player);
        }
        self.remove_entity(player, true);
        for leftover in self.regions.delete_instance(player) {
            self.remove_entity(leftover, false);
        }
        self.sessions.remove_session(session);
        tracing::info!(%player, %session, "player disconnected");
    }

    // --- view payloads ---

    /// Tiles of the player's neighbourhood that the client does not have yet.
    pub fn send_region(&mut self, id: InstanceId, force: bool) {
        let Some(view) = self.entities.players.get_mut(&id).and_then(|p| p.region_view()) else {
            return;
        };
        let regions = self.regions.region_payload(view, force);
        if regions.is_empty() {
            return;
        }
        self.outbox
            .push(PacketScope::Player(id), ServerMessage::Region { regions });
    }

    fn visible_around(&self, id: InstanceId) -> Vec<&dyn Visible> {
        let Some(key) = self.entities.players.get(&id).and_then(|p| p.character.entity.region) else {
            return Vec::new();
        };
        self.regions
            .entities_around(key, Some(id), |other| {
                self.entities
                    .visible(other)
                    .is_some_and(|v| v.is_visible_to(id))
            })
            .into_iter()
            .filter_map(|other| self.entities.visible(other))
            .filter(|v| !v.entity().dead && v.entity().kind() != EntityKind::Projectile)
            .collect()
    }

    /// Everything the player can currently see.
    pub fn send_entities(&mut self, id: InstanceId) {
        let entities = self
            .visible_around(id)
            .into_iter()
            .map(|v| v.to_wire())
            .collect();
        self.outbox
            .push(PacketScope::Player(id), ServerMessage::List { entities });
    }

    pub fn send_entity_positions(&mut self, id: InstanceId) {
        let entities = self
            .visible_around(id)
            .into_iter()
            .map(|v| {
                let e = v.entity();
                PositionWire {
                    instance: e.id,
                    x: e.pos.x,
                    y: e.pos.y,
                }
            })
            .collect();
        self.outbox
            .push(PacketScope::Player(id), ServerMessage::Positions { entities });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_short_and_plain() {
        assert!(valid_name("Ada_99"));
        assert!(valid_name("bo-b"));
        assert!(!valid_name(""));
        assert!(!valid_name("../etc"));
        assert!(!valid_name("a name"));
        assert!(!valid_name("abcdefghijklmnopq"));
    }
}
