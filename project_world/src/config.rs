use std::path::Path;

use serde::Deserialize;

use engine_core::TickConfig;
use space::GridPos;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetSection {
    pub addr: String,
    pub max_packets_per_second: u32,
    pub max_line_length: usize,
}

impl Default for NetSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9001".to_string(),
            max_packets_per_second: 20,
            max_line_length: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickSection {
    pub update_time_ms: u64,
    /// Seed for every random roll in the world; random when unset.
    pub seed: Option<u64>,
}

impl Default for TickSection {
    fn default() -> Self {
        Self {
            update_time_ms: 100,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapSection {
    pub width: u32,
    pub height: u32,
    pub division_size: u32,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub cache_dir: String,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            division_size: 16,
            spawn_x: 8,
            spawn_y: 8,
            cache_dir: "cache".to_string(),
        }
    }
}

impl MapSection {
    pub fn spawn(&self) -> GridPos {
        GridPos::new(self.spawn_x, self.spawn_y)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombatSection {
    pub follow_interval_ms: u64,
    pub check_interval_ms: u64,
    pub last_action_threshold_ms: u64,
    pub hit_tolerance_ms: u64,
    pub stun_duration_ms: u64,
    pub freeze_duration_ms: u64,
    pub poison_duration_ms: u64,
    pub poison_damage: u32,
    pub aoe_windup_ms: u64,
    /// Flight time per tile of distance.
    pub projectile_ms_per_tile: u64,
    /// Chance out of 1000 that a melee hit breaks the player's weapon.
    pub weapon_break_per_mille: u32,
}

impl Default for CombatSection {
    fn default() -> Self {
        Self {
            follow_interval_ms: 400,
            check_interval_ms: 1000,
            last_action_threshold_ms: 7000,
            hit_tolerance_ms: 5,
            stun_duration_ms: 3000,
            freeze_duration_ms: 4000,
            poison_duration_ms: 10_000,
            poison_damage: 5,
            aoe_windup_ms: 1500,
            projectile_ms_per_tile: 50,
            weapon_break_per_mille: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MobSection {
    pub roam_interval_ms: u64,
    pub heal_interval_ms: u64,
    pub item_despawn_ms: u64,
    pub item_blink_ms: u64,
}

impl Default for MobSection {
    fn default() -> Self {
        Self {
            roam_interval_ms: 5000,
            heal_interval_ms: 10_000,
            item_despawn_ms: 32_000,
            item_blink_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSection {
    pub max_hit_points: u32,
    pub attack_rate_ms: u64,
    pub attack_range: u32,
    pub attack: u32,
    pub defense: u32,
    pub heal_amount: u32,
}

impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            max_hit_points: 100,
            attack_rate_ms: 1000,
            attack_range: 1,
            attack: 8,
            defense: 2,
            heal_amount: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MinigameSection {
    /// Seconds the lobby waits before trying to start.
    pub lobby_countdown: u32,
    /// Seconds a started game runs.
    pub game_duration: u32,
    pub min_players: usize,
    pub lobby_spawn: GridPos,
    pub red_spawn: GridPos,
    pub blue_spawn: GridPos,
    /// Mob spawned as a coursing target.
    pub coursing_mob: String,
}

impl Default for MinigameSection {
    fn default() -> Self {
        Self {
            lobby_countdown: 30,
            game_duration: 180,
            min_players: 2,
            lobby_spawn: GridPos::new(10, 10),
            red_spawn: GridPos::new(40, 10),
            blue_spawn: GridPos::new(60, 10),
            coursing_mob: "rabbit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentSection {
    pub mobs_path: String,
    pub areas_path: String,
    pub players_dir: String,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            mobs_path: "content/mobs.toml".to_string(),
            areas_path: "content/areas.toml".to_string(),
            players_dir: "players".to_string(),
        }
    }
}

/// Top-level world server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub net: NetSection,
    pub tick: TickSection,
    pub map: MapSection,
    pub combat: CombatSection,
    pub mobs: MobSection,
    pub player: PlayerSection,
    pub minigame: MinigameSection,
    pub content: ContentSection,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file path. A missing file
    /// falls back to defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        Ok(config)
    }

    pub fn to_tick_config(&self) -> TickConfig {
        TickConfig {
            update_time_ms: self.tick.update_time_ms,
            max_ticks: 0,
        }
    }
}

/// Parse CLI arguments and load config.
/// Supports: --config <path>
pub fn parse_cli_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if let Some(val) = args.get(i + 1) {
                    config_path = Some(val.as_str());
                    i += 2;
                } else {
                    eprintln!("--config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    match ServerConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_matches_hardcoded_values() {
        let config = ServerConfig::default();
        assert_eq!(config.net.addr, "0.0.0.0:9001");
        assert_eq!(config.tick.update_time_ms, 100);
        assert_eq!(config.map.division_size, 16);
        assert_eq!(config.combat.follow_interval_ms, 400);
        assert_eq!(config.combat.check_interval_ms, 1000);
        assert_eq!(config.combat.last_action_threshold_ms, 7000);
        assert_eq!(config.combat.hit_tolerance_ms, 5);
        assert_eq!(config.combat.stun_duration_ms, 3000);
        assert_eq!(config.minigame.min_players, 2);
        assert_eq!(config.content.players_dir, "players");
    }

    #[test]
    fn to_tick_config() {
        let config = ServerConfig::default();
        let tc = config.to_tick_config();
        assert_eq!(tc.update_time_ms, 100);
        assert_eq!(tc.max_ticks, 0);
    }

    #[test]
    fn load_nonexistent_file_returns_defaults() {
        let config = ServerConfig::load(Some("/tmp/nonexistent_world_config_12345.toml")).unwrap();
        assert_eq!(config.tick.update_time_ms, 100);
    }

    #[test]
    fn load_partial_toml() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[tick]
update_time_ms = 50
seed = 7

[map]
width = 256

[minigame]
red_spawn = {{ x = 3, y = 4 }}
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(config.tick.update_time_ms, 50);
        assert_eq!(config.tick.seed, Some(7));
        assert_eq!(config.map.width, 256);
        assert_eq!(config.map.height, 128);
        assert_eq!(config.minigame.red_spawn, GridPos::new(3, 4));
        assert_eq!(config.net.max_packets_per_second, 20);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "[map\nwidth = ").unwrap();
        assert!(matches!(
            ServerConfig::load(Some(f.path().to_str().unwrap())),
            Err(ConfigError::Parse(_))
        ));
    }
}
