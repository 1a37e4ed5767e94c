//! Entity model: one `Entity` core shared by every variant, with the
//! capabilities each variant has expressed as traits.

mod character;
mod item;
mod mob;
mod player;

pub use character::{Character, Status};
pub use item::{Item, Npc, Projectile};
pub use mob::{BehaviorState, Mob};
pub use player::Player;

use instance::{EntityKind, InstanceId};
use net::EntityWire;
use space::{GridPos, Locatable, RegionKey};

/// Identity, position and region bookkeeping common to all entities.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: InstanceId,
    pub key: String,
    pub pos: GridPos,
    pub old_pos: GridPos,
    pub region: Option<RegionKey>,
    pub recently_left: Vec<RegionKey>,
    pub dead: bool,
    /// Owner of the private instance this entity lives in.
    pub instance: Option<InstanceId>,
}

impl Entity {
    pub fn new(id: InstanceId, key: impl Into<String>, pos: GridPos) -> Self {
        Self {
            id,
            key: key.into(),
            pos,
            old_pos: pos,
            region: None,
            recently_left: Vec::new(),
            dead: false,
            instance: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind
    }

    pub fn set_position(&mut self, pos: GridPos) {
        self.old_pos = self.pos;
        self.pos = pos;
    }

    pub fn take_recently_left(&mut self) -> Vec<RegionKey> {
        std::mem::take(&mut self.recently_left)
    }

    pub(crate) fn wire(&self, name: Option<String>, points: Option<(u32, u32)>) -> EntityWire {
        EntityWire {
            instance: self.id,
            kind: self.kind(),
            key: self.key.clone(),
            name,
            x: self.pos.x,
            y: self.pos.y,
            hit_points: points.map(|(hp, _)| hp),
            max_hit_points: points.map(|(_, max)| max),
        }
    }
}

impl Locatable for Entity {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn grid_pos(&self) -> GridPos {
        self.pos
    }

    fn region(&self) -> Option<RegionKey> {
        self.region
    }

    fn set_region(&mut self, region: Option<RegionKey>) {
        self.region = region;
    }

    fn instance_owner(&self) -> Option<InstanceId> {
        self.instance
    }

    fn set_recently_left(&mut self, regions: Vec<RegionKey>) {
        self.recently_left = regions;
    }
}

/// Anything with a `Character` inside: players and mobs.
pub trait Combatant {
    fn character(&self) -> &Character;

    fn character_mut(&mut self) -> &mut Character;
}

/// Anything that can be shown to a player.
pub trait Visible {
    fn entity(&self) -> &Entity;

    fn to_wire(&self) -> EntityWire;

    /// Private entities are only shown to the owner of their instance.
    fn is_visible_to(&self, observer: InstanceId) -> bool {
        self.entity().instance.map_or(true, |owner| owner == observer)
    }
}

/// Hit point pool with clamped arithmetic.
pub trait Damageable {
    fn hit_points(&self) -> u32;

    fn max_hit_points(&self) -> u32;

    /// Subtract `amount`, returning the hit points left.
    fn take_damage(&mut self, amount: u32) -> u32;

    fn heal(&mut self, amount: u32) -> u32;
}
