use std::collections::{BTreeMap, BTreeSet};

use instance::InstanceId;
use net::MinigameWire;
use rand::seq::SliceRandom;
use rand::Rng;
use space::GridPos;

use super::{MinigameAction, Team};
use crate::config::MinigameSection;

pub const TEAM_WAR: &str = "team_war";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamWarState {
    Lobby,
    Started,
}

/// Red versus blue arena. The lobby counts down once a second; at zero a
/// lobby with enough players starts a game and a running game ends.
#[derive(Debug, Clone)]
pub struct TeamWar {
    settings: MinigameSection,
    state: TeamWarState,
    countdown: u32,
    lobby: BTreeSet<InstanceId>,
    teams: BTreeMap<InstanceId, Team>,
    red_score: u32,
    blue_score: u32,
}

impl TeamWar {
    pub fn new(settings: &MinigameSection) -> Self {
        Self {
            settings: settings.clone(),
            state: TeamWarState::Lobby,
            countdown: settings.lobby_countdown,
            lobby: BTreeSet::new(),
            teams: BTreeMap::new(),
            red_score: 0,
            blue_score: 0,
        }
    }

    pub fn state(&self) -> TeamWarState {
        self.state
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.red_score, self.blue_score)
    }

    pub fn team_of(&self, player: InstanceId) -> Option<Team> {
        self.teams.get(&player).copied()
    }

    pub fn in_lobby(&self, player: InstanceId) -> bool {
        self.lobby.contains(&player)
    }

    pub fn is_participant(&self, player: InstanceId) -> bool {
        self.in_lobby(player) || self.teams.contains_key(&player)
    }

    /// Lobby first, then players in the game.
    pub fn participants(&self) -> Vec<InstanceId> {
        self.lobby.iter().chain(self.teams.keys()).copied().collect()
    }

    /// Returns true when the player newly joined.
    pub fn join_lobby(&mut self, player: InstanceId) -> bool {
        if self.teams.contains_key(&player) {
            return false;
        }
        self.lobby.insert(player)
    }

    pub fn leave_lobby(&mut self, player: InstanceId) -> bool {
        self.lobby.remove(&player)
    }

    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Vec<MinigameAction> {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return Vec::new();
        }
        match self.state {
            TeamWarState::Lobby => self.start(rng),
            TeamWarState::Started => self.stop(),
        }
    }

    fn start<R: Rng>(&mut self, rng: &mut R) -> Vec<MinigameAction> {
        self.countdown = self.settings.lobby_countdown;
        if self.lobby.is_empty() {
            return Vec::new();
        }
        if self.lobby.len() < self.settings.min_players.max(2) {
            return self
                .lobby
                .iter()
                .map(|player| MinigameAction::Notify {
                    player: *player,
                    message: "Not enough players to start, waiting for more.".to_string(),
                })
                .collect();
        }

        let mut roster: Vec<InstanceId> = self.lobby.iter().copied().collect();
        roster.shuffle(rng);
        let half = roster.len() / 2;
        let (red, rest) = roster.split_at(half);
        let (blue, left_over) = rest.split_at(half);

        let mut actions = Vec::new();
        for (players, team, spawn) in [
            (red, Team::Red, self.settings.red_spawn),
            (blue, Team::Blue, self.settings.blue_spawn),
        ] {
            for player in players {
                self.lobby.remove(player);
                self.teams.insert(*player, team);
                actions.push(MinigameAction::Teleport { player: *player, to: spawn });
                actions.push(MinigameAction::Notify {
                    player: *player,
                    message: format!("The game has started, you are on the {} team.", team.as_str()),
                });
            }
        }
        // Odd rosters lose their last player to the truncated split.
        for player in left_over {
            self.lobby.remove(player);
            tracing::warn!(%player, "dropped from team war, odd roster");
        }

        self.state = TeamWarState::Started;
        self.countdown = self.settings.game_duration;
        self.red_score = 0;
        self.blue_score = 0;
        tracing::info!(red = red.len(), blue = blue.len(), dropped = left_over.len(), "team war started");
        actions
    }

    /// End the game and send every player back to the lobby, where they
    /// wait for the next round.
    pub fn stop(&mut self) -> Vec<MinigameAction> {
        let message = format!("Game over. Red {} : {} Blue.", self.red_score, self.blue_score);
        let mut actions = Vec::new();
        for player in std::mem::take(&mut self.teams).into_keys() {
            self.lobby.insert(player);
            actions.push(MinigameAction::Teleport {
                player,
                to: self.settings.lobby_spawn,
            });
            actions.push(MinigameAction::Notify {
                player,
                message: message.clone(),
            });
        }
        self.state = TeamWarState::Lobby;
        self.countdown = self.settings.lobby_countdown;
        tracing::info!(red = self.red_score, blue = self.blue_score, "team war stopped");
        actions
    }

    /// Score a kill between opposing teams. Returns whether it counted.
    pub fn on_kill(&mut self, killer: Option<InstanceId>, victim: InstanceId) -> bool {
        if self.state != TeamWarState::Started {
            return false;
        }
        let (Some(killer_team), Some(victim_team)) = (killer.and_then(|k| self.team_of(k)), self.team_of(victim)) else {
            return false;
        };
        if killer_team == victim_team {
            return false;
        }
        match killer_team {
            Team::Red => self.red_score += 1,
            Team::Blue => self.blue_score += 1,
        }
        true
    }

    pub fn can_attack(&self, attacker: InstanceId, target: InstanceId) -> bool {
        self.state == TeamWarState::Started
            && matches!((self.team_of(attacker), self.team_of(target)), (Some(a), Some(b)) if a != b)
    }

    pub fn respawn_point(&self, player: InstanceId) -> Option<GridPos> {
        match self.team_of(player)? {
            Team::Red => Some(self.settings.red_spawn),
            Team::Blue => Some(self.settings.blue_spawn),
        }
    }

    /// Drop a player; a running game with fewer than two players left stops.
    pub fn on_disconnect(&mut self, player: InstanceId) -> Vec<MinigameAction> {
        self.lobby.remove(&player);
        let was_playing = self.teams.remove(&player).is_some();
        if was_playing && self.state == TeamWarState::Started && self.teams.len() < 2 {
            return self.stop();
        }
        Vec::new()
    }

    pub fn status_for(&self, player: InstanceId) -> MinigameWire {
        let state = match self.state {
            TeamWarState::Lobby => "lobby",
            TeamWarState::Started => "started",
        };
        MinigameWire {
            name: TEAM_WAR.to_string(),
            state: state.to_string(),
            countdown: self.countdown,
            team: self.team_of(player).map(|t| t.as_str().to_string()),
            red_score: self.red_score,
            blue_score: self.blue_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn player(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Player, seq)
    }

    fn settings() -> MinigameSection {
        MinigameSection {
            lobby_countdown: 3,
            game_duration: 5,
            ..MinigameSection::default()
        }
    }

    fn run_ticks(war: &mut TeamWar, rng: &mut SmallRng, ticks: u32) -> Vec<MinigameAction> {
        let mut actions = Vec::new();
        for _ in 0..ticks {
            actions.extend(war.tick(rng));
        }
        actions
    }

    #[test]
    fn too_few_players_keeps_waiting() {
        let mut war = TeamWar::new(&settings());
        let mut rng = SmallRng::seed_from_u64(1);
        war.join_lobby(player(1));

        let actions = run_ticks(&mut war, &mut rng, 3);
        assert_eq!(war.state(), TeamWarState::Lobby);
        assert_eq!(war.countdown(), 3);
        assert!(matches!(&actions[..], [MinigameAction::Notify { .. }]));
    }

    #[test]
    fn odd_roster_drops_one_player() {
        let mut war = TeamWar::new(&settings());
        let mut rng = SmallRng::seed_from_u64(7);
        for seq in 0..5 {
            war.join_lobby(player(seq));
        }

        let actions = run_ticks(&mut war, &mut rng, 3);
        assert_eq!(war.state(), TeamWarState::Started);
        let red = (0..5).filter(|s| war.team_of(player(*s)) == Some(Team::Red)).count();
        let blue = (0..5).filter(|s| war.team_of(player(*s)) == Some(Team::Blue)).count();
        assert_eq!((red, blue), (2, 2));
        assert_eq!((0..5).filter(|s| war.is_participant(player(*s))).count(), 4);
        assert_eq!((0..5).filter(|s| war.in_lobby(player(*s))).count(), 0);
        assert_eq!(war.participants().len(), 4);

        let teleports = actions
            .iter()
            .filter(|a| matches!(a, MinigameAction::Teleport { .. }))
            .count();
        assert_eq!(teleports, 4);
        let notified = actions
            .iter()
            .filter(|a| matches!(a, MinigameAction::Notify { .. }))
            .count();
        assert_eq!(notified, 4);
    }

    #[test]
    fn kills_score_only_across_teams() {
        let mut war = TeamWar::new(&settings());
        let mut rng = SmallRng::seed_from_u64(3);
        war.join_lobby(player(1));
        war.join_lobby(player(2));
        run_ticks(&mut war, &mut rng, 3);

        let red = if war.team_of(player(1)) == Some(Team::Red) { player(1) } else { player(2) };
        let blue = if red == player(1) { player(2) } else { player(1) };
        assert!(war.can_attack(red, blue));
        assert!(!war.can_attack(red, red));
        assert!(war.on_kill(Some(red), blue));
        assert!(!war.on_kill(None, blue));
        assert_eq!(war.scores(), (1, 0));
        assert_eq!(war.respawn_point(blue), Some(settings().blue_spawn));
        assert_eq!(war.status_for(red).team.as_deref(), Some("red"));
    }

    #[test]
    fn game_ends_after_duration_and_returns_players() {
        let mut war = TeamWar::new(&settings());
        let mut rng = SmallRng::seed_from_u64(5);
        war.join_lobby(player(1));
        war.join_lobby(player(2));
        run_ticks(&mut war, &mut rng, 3);

        let actions = run_ticks(&mut war, &mut rng, 5);
        assert_eq!(war.state(), TeamWarState::Lobby);
        assert!(war.team_of(player(1)).is_none());
        assert!(war.in_lobby(player(1)));
        assert!(actions.contains(&MinigameAction::Teleport {
            player: player(1),
            to: settings().lobby_spawn,
        }));
    }

    #[test]
    fn disconnect_below_two_players_stops_the_game() {
        let mut war = TeamWar::new(&settings());
        let mut rng = SmallRng::seed_from_u64(9);
        war.join_lobby(player(1));
        war.join_lobby(player(2));
        run_ticks(&mut war, &mut rng, 3);

        let actions = war.on_disconnect(player(1));
        assert_eq!(war.state(), TeamWarState::Lobby);
        assert!(actions.contains(&MinigameAction::Teleport {
            player: player(2),
            to: settings().lobby_spawn,
        }));
        assert!(!war.is_participant(player(1)));
    }
}
