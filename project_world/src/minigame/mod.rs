//! Minigame state machines. They never touch the world directly: they
//! return `MinigameAction`s that the world carries out.

mod coursing;
mod team_war;

pub use coursing::{Coursing, CoursingSession, COURSING};
pub use team_war::{TeamWar, TeamWarState, TEAM_WAR};

use instance::InstanceId;
use space::GridPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinigameAction {
    Teleport { player: InstanceId, to: GridPos },
    Notify { player: InstanceId, message: String },
}
