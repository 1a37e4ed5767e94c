use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use space::{Area, FlatMap, GridPos, Light};

use crate::combat::HitKind;
use crate::error::ConfigError;

/// Area definitions come straight from the map's own area schema.
pub type AreaDef = Area;

/// Static description of a mob kind, keyed by mob key in the content file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MobData {
    pub name: String,
    pub hit_points: u32,
    pub level: u32,
    pub attack: u32,
    pub defense: u32,
    pub attack_rate_ms: u64,
    pub attack_range: u32,
    pub aggressive: bool,
    pub always_aggressive: bool,
    pub aggro_range: u32,
    pub roam_distance: u32,
    pub respawn_delay_ms: u64,
    pub experience: u64,
    /// Hit kind used instead of plain damage on a successful special roll.
    pub special: Option<HitKind>,
    pub special_per_mille: u32,
    /// Item key -> chance out of 1000.
    pub drops: BTreeMap<String, u32>,
    /// Registered behavior name, e.g. `"summoner"`.
    pub behavior: Option<String>,
    pub summoner: Option<SummonerData>,
}

impl Default for MobData {
    fn default() -> Self {
        Self {
            name: String::new(),
            hit_points: 10,
            level: 1,
            attack: 2,
            defense: 1,
            attack_rate_ms: 1000,
            attack_range: 1,
            aggressive: false,
            always_aggressive: false,
            aggro_range: 2,
            roam_distance: 4,
            respawn_delay_ms: 30_000,
            experience: 5,
            special: None,
            special_per_mille: 100,
            drops: BTreeMap::new(),
            behavior: None,
            summoner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummonerData {
    pub minion: String,
    pub count: u32,
    /// Fraction of max hit points below which the minions are called.
    pub threshold: f32,
    /// Every Nth hit taken triggers an area attack (0 disables).
    pub aoe_every: u32,
    pub aoe_radius: u32,
    pub terror: bool,
}

impl Default for SummonerData {
    fn default() -> Self {
        Self {
            minion: String::new(),
            count: 2,
            threshold: 0.5,
            aoe_every: 5,
            aoe_radius: 2,
            terror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnPoint {
    pub key: String,
    pub x: i32,
    pub y: i32,
}

impl SpawnPoint {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MobFile {
    mobs: BTreeMap<String, MobData>,
    spawns: Vec<SpawnPoint>,
    npcs: Vec<SpawnPoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AreaFile {
    areas: Vec<AreaDef>,
    lights: Vec<Light>,
    resources: Vec<GridPos>,
    blocked: Vec<GridPos>,
}

/// Everything the world loads from content files.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub mobs: BTreeMap<String, MobData>,
    pub spawns: Vec<SpawnPoint>,
    pub npcs: Vec<SpawnPoint>,
    pub areas: Vec<AreaDef>,
    pub lights: Vec<Light>,
    pub resources: Vec<GridPos>,
    pub blocked: Vec<GridPos>,
}

impl Content {
    /// Load both content files. A missing file is an empty section; a file
    /// that does not parse is an error.
    pub fn load(mobs_path: &Path, areas_path: &Path) -> Result<Self, ConfigError> {
        let mobs = read_optional(mobs_path)?;
        let areas = read_optional(areas_path)?;
        Self::from_toml(&mobs, &areas)
    }

    pub fn from_toml(mobs: &str, areas: &str) -> Result<Self, ConfigError> {
        let mob_file: MobFile = toml::from_str(mobs)?;
        let area_file: AreaFile = toml::from_str(areas)?;
        let mut content = Self {
            mobs: mob_file.mobs,
            spawns: mob_file.spawns,
            npcs: mob_file.npcs,
            areas: area_file.areas,
            lights: area_file.lights,
            resources: area_file.resources,
            blocked: area_file.blocked,
        };
        content.prune_unknown();
        Ok(content)
    }

    /// Drop references to mob keys that do not exist, logging each one.
    fn prune_unknown(&mut self) {
        let known = &self.mobs;
        self.spawns.retain(|spawn| {
            let ok = known.contains_key(&spawn.key);
            if !ok {
                tracing::error!(key = %spawn.key, x = spawn.x, y = spawn.y, "spawn references unknown mob, skipped");
            }
            ok
        });

        let keys: Vec<String> = self.mobs.keys().cloned().collect();
        for data in self.mobs.values_mut() {
            let Some(summoner) = &data.summoner else {
                continue;
            };
            if !keys.contains(&summoner.minion) {
                tracing::error!(mob = %data.name, minion = %summoner.minion, "summoner minion is not a known mob, behavior dropped");
                data.summoner = None;
                data.behavior = None;
            }
        }
    }

    pub fn mob(&self, key: &str) -> Option<&MobData> {
        self.mobs.get(key)
    }

    /// Open map of the given size with every `blocked` tile marked.
    pub fn build_map(&self, width: u32, height: u32) -> FlatMap {
        let mut map = FlatMap::new(width, height);
        for pos in &self.blocked {
            map.block(*pos);
        }
        map
    }

    /// Largest aggro range of any mob; bounds the grid query on player moves.
    pub fn max_aggro_range(&self) -> u32 {
        self.mobs
            .values()
            .filter(|m| m.aggressive)
            .map(|m| m.aggro_range)
            .max()
            .unwrap_or(0)
    }
}

fn read_optional(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "content file missing, section left empty");
        return Ok(String::new());
    }
    Ok(std::fs::read_to_string(path)?)
}
