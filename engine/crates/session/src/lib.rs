use std::collections::BTreeMap;

use instance::InstanceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub session_id: SessionId,
    pub text: String,
    /// When true, the output router will close the session's write channel
    /// after delivering this message, causing the connection to shut down.
    pub disconnect: bool,
}

impl SessionOutput {
    pub fn new(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            text: text.into(),
            disconnect: false,
        }
    }

    /// Create a final message that will disconnect the session after delivery.
    pub fn with_disconnect(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            text: text.into(),
            disconnect: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingLogin,
    Playing,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub session_id: SessionId,
    pub state: SessionState,
    pub player: Option<InstanceId>,
    pub player_name: Option<String>,
}

impl PlayerSession {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::AwaitingLogin,
            player: None,
            player_name: None,
        }
    }
}

/// Manages active sessions and their binding to player entities.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: BTreeMap<SessionId, PlayerSession>,
    player_to_session: BTreeMap<InstanceId, SessionId>,
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session, returning its ID.
    pub fn create_session(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, PlayerSession::new(id));
        id
    }

    /// Create a session with a specific ID (used when the network layer assigns IDs).
    pub fn create_session_with_id(&mut self, id: SessionId) {
        self.sessions.insert(id, PlayerSession::new(id));
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }

    pub fn get_session(&self, id: SessionId) -> Option<&PlayerSession> {
        self.sessions.get(&id)
    }

    pub fn get_session_mut(&mut self, id: SessionId) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(&id)
    }

    pub fn session_for_player(&self, player: InstanceId) -> Option<SessionId> {
        self.player_to_session.get(&player).copied()
    }

    pub fn player_for_session(&self, id: SessionId) -> Option<InstanceId> {
        self.sessions.get(&id).and_then(|s| s.player)
    }

    /// Bind a player entity to a session (on login).
    pub fn bind_player(&mut self, session_id: SessionId, player: InstanceId, name: &str) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        session.player = Some(player);
        session.player_name = Some(name.to_string());
        session.state = SessionState::Playing;
        self.player_to_session.insert(player, session_id);
        true
    }

    /// Mark a session as disconnected and return the player it was bound to.
    pub fn disconnect(&mut self, session_id: SessionId) -> Option<InstanceId> {
        let session = self.sessions.get_mut(&session_id)?;
        session.state = SessionState::Disconnected;
        let player = session.player.take();
        if let Some(pid) = player {
            self.player_to_session.remove(&pid);
        }
        player
    }

    /// Remove a session entirely.
    pub fn remove_session(&mut self, session_id: SessionId) {
        if let Some(session) = self.sessions.remove(&session_id) {
            if let Some(pid) = session.player {
                self.player_to_session.remove(&pid);
            }
        }
    }

    /// All sessions in Playing state (sorted by session ID).
    pub fn playing_sessions(&self) -> Vec<&PlayerSession> {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Playing)
            .collect()
    }

    pub fn is_name_online(&self, name: &str) -> bool {
        self.sessions.values().any(|s| {
            s.state == SessionState::Playing && s.player_name.as_deref() == Some(name)
        })
    }

    /// Count of active (non-disconnected) sessions.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state != SessionState::Disconnected)
            .count()
    }
}
