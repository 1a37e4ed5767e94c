use instance::InstanceId;
use net::EntityWire;

use super::{Entity, Visible};
use crate::combat::Hit;

/// An item lying on the ground.
#[derive(Debug, Clone)]
pub struct Item {
    pub entity: Entity,
    pub count: u32,
    /// Dropped items blink and then despawn; placed ones stay.
    pub dropped: bool,
    pub blinking: bool,
}

impl Item {
    pub fn new(entity: Entity, count: u32, dropped: bool) -> Self {
        Self {
            entity,
            count: count.max(1),
            dropped,
            blinking: false,
        }
    }
}

impl Visible for Item {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn to_wire(&self) -> EntityWire {
        self.entity.wire(None, None)
    }
}

/// A ranged attack in flight; removed once it lands.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub entity: Entity,
    pub owner: InstanceId,
    pub target: InstanceId,
    pub hit: Hit,
}

impl Visible for Projectile {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn to_wire(&self) -> EntityWire {
        self.entity.wire(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct Npc {
    pub entity: Entity,
}

impl Visible for Npc {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn to_wire(&self) -> EntityWire {
        self.entity.wire(None, None)
    }
}
