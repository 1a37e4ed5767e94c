use std::collections::BTreeMap;

use instance::InstanceId;
use net::MinigameWire;

pub const COURSING: &str = "coursing";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursingSession {
    /// The private mob currently being chased.
    pub target: Option<InstanceId>,
    pub score: u32,
}

/// Single-player chase sessions, one per player, each in its own instance.
#[derive(Debug, Default)]
pub struct Coursing {
    sessions: BTreeMap<InstanceId, CoursingSession>,
}

impl Coursing {
    /// Returns false when the player was already coursing.
    pub fn enter(&mut self, player: InstanceId) -> bool {
        if self.sessions.contains_key(&player) {
            return false;
        }
        self.sessions.insert(player, CoursingSession::default());
        true
    }

    pub fn leave(&mut self, player: InstanceId) -> Option<CoursingSession> {
        self.sessions.remove(&player)
    }

    pub fn is_active(&self, player: InstanceId) -> bool {
        self.sessions.contains_key(&player)
    }

    pub fn session(&self, player: InstanceId) -> Option<&CoursingSession> {
        self.sessions.get(&player)
    }

    pub fn set_target(&mut self, player: InstanceId, target: InstanceId) {
        if let Some(session) = self.sessions.get_mut(&player) {
            session.target = Some(target);
        }
    }

    /// Score a kill if `victim` is the target of `player`'s session.
    /// Returns the new score.
    pub fn record_kill(&mut self, player: InstanceId, victim: InstanceId) -> Option<u32> {
        let session = self.sessions.get_mut(&player)?;
        if session.target != Some(victim) {
            return None;
        }
        session.target = None;
        session.score += 1;
        Some(session.score)
    }

    pub fn status_for(&self, player: InstanceId) -> Option<MinigameWire> {
        let session = self.sessions.get(&player)?;
        Some(MinigameWire {
            name: COURSING.to_string(),
            state: "started".to_string(),
            countdown: 0,
            team: None,
            red_score: session.score,
            blue_score: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    fn player(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Player, seq)
    }

    fn mob(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Mob, seq)
    }

    #[test]
    fn only_the_current_target_scores() {
        let mut coursing = Coursing::default();
        assert!(coursing.enter(player(1)));
        assert!(!coursing.enter(player(1)));
        coursing.set_target(player(1), mob(4));

        assert_eq!(coursing.record_kill(player(1), mob(5)), None);
        assert_eq!(coursing.record_kill(player(1), mob(4)), Some(1));
        // target is consumed by the kill
        assert_eq!(coursing.record_kill(player(1), mob(4)), None);
        assert_eq!(coursing.status_for(player(1)).map(|s| s.red_score), Some(1));
    }

    #[test]
    fn leave_returns_the_session() {
        let mut coursing = Coursing::default();
        coursing.enter(player(2));
        coursing.set_target(player(2), mob(1));
        let session = coursing.leave(player(2)).unwrap();
        assert_eq!(session.target, Some(mob(1)));
        assert!(!coursing.is_active(player(2)));
        assert!(coursing.is_empty());
        assert!(coursing.status_for(player(2)).is_none());
    }
}
