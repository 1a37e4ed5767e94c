use std::collections::{BTreeMap, BTreeSet};

use instance::InstanceId;
use net::EntityWire;
use persistence::PlayerRecord;
use session::SessionId;
use space::{GridPos, RegionKey, RegionView};

use super::{Character, Combatant, Entity, Visible};
use crate::config::PlayerSection;
use crate::formulas::level_for_experience;

#[derive(Debug, Clone)]
pub struct Player {
    pub character: Character,
    pub name: String,
    pub session: SessionId,
    pub experience: u64,
    pub skills: BTreeMap<String, u64>,
    pub quests: BTreeSet<String>,
    pub achievements: BTreeSet<String>,
    pub weapon: Option<String>,
    /// Regions whose tiles this client already has.
    pub loaded_regions: BTreeSet<RegionKey>,
}

impl Player {
    pub fn new(id: InstanceId, session: SessionId, name: &str, pos: GridPos, stats: &PlayerSection) -> Self {
        let mut character = Character::new(Entity::new(id, "player", pos), stats.max_hit_points);
        character.attack = stats.attack;
        character.defense = stats.defense;
        character.attack_rate = stats.attack_rate_ms;
        character.attack_range = stats.attack_range;
        Self {
            character,
            name: name.to_string(),
            session,
            experience: 0,
            skills: BTreeMap::new(),
            quests: BTreeSet::new(),
            achievements: BTreeSet::new(),
            weapon: None,
            loaded_regions: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.character.id()
    }

    /// Restore saved progress. Position is placed by the caller, which
    /// knows the map.
    pub fn apply_record(&mut self, record: &PlayerRecord) {
        if record.hit_points > 0 {
            self.character.hit_points = record.hit_points.min(self.character.max_hit_points);
        }
        self.experience = record.experience;
        self.character.level = level_for_experience(record.experience);
        self.skills = record.skills.clone();
        self.quests = record.quests.clone();
        self.achievements = record.achievements.clone();
        self.weapon = record.weapon.clone();
    }

    pub fn to_record(&self) -> PlayerRecord {
        let pos = self.character.pos();
        PlayerRecord {
            name: self.name.clone(),
            x: pos.x,
            y: pos.y,
            hit_points: self.character.hit_points,
            experience: self.experience,
            skills: self.skills.clone(),
            quests: self.quests.clone(),
            achievements: self.achievements.clone(),
            weapon: self.weapon.clone(),
        }
    }

    /// Returns true when the experience pushed the player up a level.
    pub fn add_experience(&mut self, amount: u64) -> bool {
        self.experience = self.experience.saturating_add(amount);
        let level = level_for_experience(self.experience);
        let levelled = level > self.character.level;
        self.character.level = level;
        levelled
    }

    pub fn add_skill_experience(&mut self, skill: &str, amount: u64) {
        *self.skills.entry(skill.to_string()).or_insert(0) += amount;
    }

    pub fn region_view(&mut self) -> Option<RegionView<'_>> {
        let region = self.character.entity.region?;
        Some(RegionView {
            region,
            loaded: &mut self.loaded_regions,
            quests: &self.quests,
            achievements: &self.achievements,
        })
    }
}

impl Combatant for Player {
    fn character(&self) -> &Character {
        &self.character
    }

    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }
}

impl Visible for Player {
    fn entity(&self) -> &Entity {
        &self.character.entity
    }

    fn to_wire(&self) -> EntityWire {
        self.character.entity.wire(
            Some(self.name.clone()),
            Some((self.character.hit_points, self.character.max_hit_points)),
        )
    }
}
