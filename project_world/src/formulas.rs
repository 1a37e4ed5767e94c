use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::entity::{Character, Player};

const MAX_LEVEL: u32 = 135;

/// Stat math the combat loop treats as a black box.
pub trait Formulas: Send {
    fn damage(&mut self, attacker: &Character, target: &Character) -> u32;

    fn aoe_damage(&mut self, attacker: &Character, target: &Character) -> u32;

    fn weapon_break(&mut self, player: &Player, target: &Character) -> bool;
}

/// Seeded random rolls over attack, level and defense.
#[derive(Debug)]
pub struct DefaultFormulas {
    rng: SmallRng,
    weapon_break_per_mille: u32,
}

impl DefaultFormulas {
    pub fn new(seed: u64, weapon_break_per_mille: u32) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            weapon_break_per_mille,
        }
    }

    fn max_damage(attacker: &Character, target: &Character) -> u32 {
        (attacker.attack * 2 + attacker.level)
            .saturating_sub(target.defense)
            .max(1)
    }
}

impl Formulas for DefaultFormulas {
    fn damage(&mut self, attacker: &Character, target: &Character) -> u32 {
        let max = Self::max_damage(attacker, target);
        self.rng.gen_range(0..=max)
    }

    fn aoe_damage(&mut self, attacker: &Character, target: &Character) -> u32 {
        self.damage(attacker, target) * 3 / 4
    }

    fn weapon_break(&mut self, player: &Player, _target: &Character) -> bool {
        player.weapon.is_some() && self.rng.gen_range(0..1000) < self.weapon_break_per_mille
    }
}

pub fn level_for_experience(experience: u64) -> u32 {
    let level = 1 + (experience as f64 / 100.0).sqrt() as u32;
    level.min(MAX_LEVEL)
}
