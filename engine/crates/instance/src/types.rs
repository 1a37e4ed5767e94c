use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InstanceError;

/// Entity-type tag carried inside every instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Player = 1,
    Mob = 2,
    Npc = 3,
    Item = 4,
    Chest = 5,
    Projectile = 6,
    Effect = 7,
}

impl EntityKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, InstanceError> {
        Ok(match tag {
            1 => Self::Player,
            2 => Self::Mob,
            3 => Self::Npc,
            4 => Self::Item,
            5 => Self::Chest,
            6 => Self::Projectile,
            7 => Self::Effect,
            other => return Err(InstanceError::UnknownTag(other)),
        })
    }

    /// Players and mobs are the only kinds that own a combat component.
    pub fn is_character(self) -> bool {
        matches!(self, Self::Player | Self::Mob)
    }
}

/// Globally unique entity identifier: type tag + per-kind sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    pub kind: EntityKind,
    pub seq: u32,
}

impl InstanceId {
    pub fn new(kind: EntityKind, seq: u32) -> Self {
        Self { kind, seq }
    }

    pub fn is_player(self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn is_mob(self) -> bool {
        self.kind == EntityKind::Mob
    }

    pub fn to_u64(self) -> u64 {
        ((self.kind.tag() as u64) << 32) | (self.seq as u64)
    }

    pub fn from_u64(val: u64) -> Result<Self, InstanceError> {
        let kind = EntityKind::from_tag((val >> 32) as u8)?;
        Ok(Self {
            kind,
            seq: val as u32,
        })
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.kind.tag(), self.seq)
    }
}

impl FromStr for InstanceId {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, seq) = s
            .split_once('-')
            .ok_or_else(|| InstanceError::Malformed(s.to_string()))?;
        let tag: u8 = tag
            .parse()
            .map_err(|_| InstanceError::Malformed(s.to_string()))?;
        let seq: u32 = seq
            .parse()
            .map_err(|_| InstanceError::Malformed(s.to_string()))?;
        Ok(Self::new(EntityKind::from_tag(tag)?, seq))
    }
}
