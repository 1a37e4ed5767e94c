use engine_core::TimerHandle;
use instance::InstanceId;
use space::GridPos;

use super::{Damageable, Entity};
use crate::combat::Combat;

/// Timed status flags and the tasks that clear them.
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub stunned: bool,
    pub frozen: bool,
    pub poisoned: bool,
    pub stun_clear: Option<TimerHandle>,
    pub freeze_clear: Option<TimerHandle>,
    pub poison_clear: Option<TimerHandle>,
}

impl Status {
    /// Attack ticks are skipped while stunned.
    pub fn can_attack(&self) -> bool {
        !self.stunned
    }

    /// Follow ticks are skipped while stunned or frozen.
    pub fn can_move(&self) -> bool {
        !self.stunned && !self.frozen
    }
}

/// The fighting half shared by players and mobs.
#[derive(Debug, Clone)]
pub struct Character {
    pub entity: Entity,
    pub hit_points: u32,
    pub max_hit_points: u32,
    pub level: u32,
    pub attack: u32,
    pub defense: u32,
    pub attack_rate: u64,
    pub attack_range: u32,
    pub target: Option<InstanceId>,
    pub last_attacker: Option<InstanceId>,
    pub status: Status,
    pub combat: Combat,
}

impl Character {
    pub fn new(entity: Entity, max_hit_points: u32) -> Self {
        Self {
            entity,
            hit_points: max_hit_points,
            max_hit_points,
            level: 1,
            attack: 1,
            defense: 0,
            attack_rate: 1000,
            attack_range: 1,
            target: None,
            last_attacker: None,
            status: Status::default(),
            combat: Combat::default(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.entity.id
    }

    pub fn pos(&self) -> GridPos {
        self.entity.pos
    }

    pub fn is_dead(&self) -> bool {
        self.entity.dead
    }

    pub fn is_ranged(&self) -> bool {
        self.attack_range > 1
    }

    /// Ranged attackers reach anything within `attack_range`; melee needs
    /// cardinal contact.
    pub fn in_proximity(&self, target: GridPos) -> bool {
        if self.is_ranged() {
            self.pos().distance(target) <= self.attack_range
        } else {
            self.pos().is_non_diagonal(target)
        }
    }

    pub fn revive(&mut self) {
        self.entity.dead = false;
        self.hit_points = self.max_hit_points;
        self.target = None;
        self.last_attacker = None;
        self.status = Status::default();
    }
}

impl Damageable for Character {
    fn hit_points(&self) -> u32 {
        self.hit_points
    }

    fn max_hit_points(&self) -> u32 {
        self.max_hit_points
    }

    fn take_damage(&mut self, amount: u32) -> u32 {
        self.hit_points = self.hit_points.saturating_sub(amount);
        self.hit_points
    }

    fn heal(&mut self, amount: u32) -> u32 {
        self.hit_points = self.hit_points.saturating_add(amount).min(self.max_hit_points);
        self.hit_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    fn character_at(x: i32, y: i32) -> Character {
        Character::new(
            Entity::new(InstanceId::new(EntityKind::Mob, 0), "rat", GridPos::new(x, y)),
            20,
        )
    }

    #[test]
    fn melee_proximity_is_cardinal() {
        let c = character_at(5, 5);
        assert!(c.in_proximity(GridPos::new(5, 6)));
        assert!(c.in_proximity(GridPos::new(4, 5)));
        assert!(!c.in_proximity(GridPos::new(6, 6)));
        assert!(!c.in_proximity(GridPos::new(5, 7)));
    }

    #[test]
    fn ranged_proximity_is_chebyshev() {
        let mut c = character_at(5, 5);
        c.attack_range = 4;
        assert!(c.is_ranged());
        assert!(c.in_proximity(GridPos::new(9, 8)));
        assert!(!c.in_proximity(GridPos::new(10, 5)));
    }

    #[test]
    fn damage_and_heal_clamp() {
        let mut c = character_at(0, 0);
        assert_eq!(c.take_damage(25), 0);
        assert_eq!(c.heal(5), 5);
        assert_eq!(c.heal(100), 20);
    }

    #[test]
    fn status_gates() {
        let mut status = Status::default();
        assert!(status.can_attack() && status.can_move());
        status.frozen = true;
        assert!(status.can_attack());
        assert!(!status.can_move());
        status.stunned = true;
        assert!(!status.can_attack());
    }
}
