use instance::InstanceId;
use net::EntityWire;
use space::GridPos;

use super::{Character, Combatant, Entity, Visible};
use crate::content::MobData;

/// Per-mob scratch state owned by whatever behavior drives the mob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorState {
    pub hits_taken: u32,
    pub phase: u32,
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub character: Character,
    pub data: MobData,
    pub spawn: GridPos,
    /// Boss that summoned this mob; minions never respawn.
    pub master: Option<InstanceId>,
    pub minions: Vec<InstanceId>,
    pub respawns: bool,
    pub behavior: BehaviorState,
}

impl Mob {
    pub fn new(id: InstanceId, key: &str, data: &MobData, spawn: GridPos) -> Self {
        let mut character = Character::new(Entity::new(id, key, spawn), data.hit_points);
        character.level = data.level;
        character.attack = data.attack;
        character.defense = data.defense;
        character.attack_rate = data.attack_rate_ms;
        character.attack_range = data.attack_range;
        Self {
            character,
            data: data.clone(),
            spawn,
            master: None,
            minions: Vec::new(),
            respawns: true,
            behavior: BehaviorState::default(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.character.id()
    }

    pub fn is_minion(&self) -> bool {
        self.master.is_some()
    }

    pub fn within_leash(&self, pos: GridPos) -> bool {
        self.spawn.distance(pos) <= self.data.roam_distance
    }

    /// Whether this mob would start a fight with `player` on sight.
    pub fn can_aggro(&self, player: &Character) -> bool {
        let me = &self.character;
        if me.is_dead() || me.target.is_some() || !self.data.aggressive || player.is_dead() {
            return false;
        }
        if me.entity.instance != player.entity.instance {
            return false;
        }
        let outranked = player.level as f32 > me.level as f32 * 1.5;
        if outranked && !self.data.always_aggressive {
            return false;
        }
        me.pos().distance(player.pos()) <= self.data.aggro_range && self.within_leash(player.pos())
    }
}

impl Combatant for Mob {
    fn character(&self) -> &Character {
        &self.character
    }

    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }
}

impl Visible for Mob {
    fn entity(&self) -> &Entity {
        &self.character.entity
    }

    fn to_wire(&self) -> EntityWire {
        let name = (!self.data.name.is_empty()).then(|| self.data.name.clone());
        self.character.entity.wire(
            name,
            Some((self.character.hit_points, self.character.max_hit_points)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    fn rat() -> Mob {
        let data = MobData {
            name: "Rat".to_string(),
            level: 4,
            aggressive: true,
            aggro_range: 3,
            roam_distance: 5,
            ..MobData::default()
        };
        Mob::new(InstanceId::new(EntityKind::Mob, 1), "rat", &data, GridPos::new(10, 10))
    }

    fn player_at(x: i32, y: i32, level: u32) -> Character {
        let mut c = Character::new(
            Entity::new(InstanceId::new(EntityKind::Player, 0), "player", GridPos::new(x, y)),
            100,
        );
        c.level = level;
        c
    }

    #[test]
    fn aggro_needs_range_and_level() {
        let mob = rat();
        assert!(mob.can_aggro(&player_at(12, 10, 6)));
        assert!(!mob.can_aggro(&player_at(14, 10, 6)));
        assert!(!mob.can_aggro(&player_at(12, 10, 7)));
    }

    #[test]
    fn always_aggressive_ignores_level() {
        let mut mob = rat();
        mob.data.always_aggressive = true;
        assert!(mob.can_aggro(&player_at(11, 10, 99)));
    }

    #[test]
    fn no_aggro_with_target_or_across_instances() {
        let mut mob = rat();
        let mut player = player_at(11, 10, 1);
        player.entity.instance = Some(player.id());
        assert!(!mob.can_aggro(&player));

        player.entity.instance = None;
        mob.character.target = Some(InstanceId::new(EntityKind::Player, 9));
        assert!(!mob.can_aggro(&player));
    }

    #[test]
    fn leash_is_measured_from_spawn() {
        let mob = rat();
        assert!(mob.within_leash(GridPos::new(15, 10)));
        assert!(!mob.within_leash(GridPos::new(16, 10)));
    }

    #[test]
    fn wire_form_carries_points() {
        let wire = rat().to_wire();
        assert_eq!(wire.name.as_deref(), Some("Rat"));
        assert_eq!(wire.hit_points, Some(10));
        assert_eq!(wire.key, "rat");
    }
}
