//! Shared fixtures for the world integration tests.
#![allow(dead_code)]

use instance::InstanceId;
use net::channels::NetToTick;
use project_world::config::ServerConfig;
use project_world::entity::{Character, Player};
use project_world::formulas::Formulas;
use project_world::{Content, World};
use serde_json::Value;
use session::{SessionId, SessionOutput};
use space::GridPos;

pub const MOBS: &str = r#"
[mobs.rat]
name = "Rat"
hit_points = 20
experience = 5

[mobs.wolf]
name = "Wolf"
hit_points = 40
aggressive = true
aggro_range = 3
roam_distance = 4

[mobs.ogre]
name = "Ogre"
hit_points = 100
behavior = "summoner"

[mobs.ogre.summoner]
minion = "rat"
count = 2
threshold = 0.5
aoe_every = 0

[mobs.troll]
name = "Troll"
hit_points = 1000
behavior = "summoner"

[mobs.troll.summoner]
minion = "rat"
count = 1
threshold = 0.0
aoe_every = 1
aoe_radius = 2

[mobs.rabbit]
name = "Rabbit"
hit_points = 5
roam_distance = 0
"#;

pub const LOBBY_AREAS: &str = r#"
[[areas]]
id = 1
kind = "minigame"
minigame = "team_war"
shape = "rect"
x = 0
y = 0
width = 16
height = 16
"#;

/// Damage is always the same number, nothing ever breaks.
pub struct FixedFormulas {
    pub damage: u32,
}

impl Formulas for FixedFormulas {
    fn damage(&mut self, _attacker: &Character, _target: &Character) -> u32 {
        self.damage
    }

    fn aoe_damage(&mut self, _attacker: &Character, _target: &Character) -> u32 {
        self.damage
    }

    fn weapon_break(&mut self, _player: &Player, _target: &Character) -> bool {
        false
    }
}

/// 64x64 map in 16-tile regions, players spawn at (8, 8). Roaming and
/// regeneration are pushed far out so they never interfere.
pub fn make_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.map.width = 64;
    config.map.height = 64;
    config.map.division_size = 16;
    config.map.spawn_x = 8;
    config.map.spawn_y = 8;
    config.tick.seed = Some(42);
    config.mobs.roam_interval_ms = 1_000_000;
    config.mobs.heal_interval_ms = 1_000_000;
    config.player.max_hit_points = 1000;
    config.minigame.lobby_countdown = 3;
    config.minigame.game_duration = 5;
    config
}

pub fn make_world_with(config: ServerConfig, areas: &str, damage: u32) -> World {
    let content = Content::from_toml(MOBS, areas).unwrap();
    let map = content.build_map(config.map.width, config.map.height);
    let mut world = World::new(config, content, Box::new(map))
        .unwrap()
        .with_formulas(Box::new(FixedFormulas { damage }));
    world.build_tiles(None).unwrap();
    world
}

pub fn make_world(damage: u32) -> World {
    make_world_with(make_config(), "", damage)
}

pub fn send(world: &mut World, session: u64, json: &str) {
    world.handle_net(NetToTick::Packet {
        session_id: SessionId(session),
        text: json.to_string(),
    });
}

/// Open a session and log it in as `name`.
pub fn login(world: &mut World, session: u64, name: &str) -> InstanceId {
    world.handle_net(NetToTick::NewConnection {
        session_id: SessionId(session),
    });
    send(world, session, &format!(r#"{{"type":"login","name":"{name}"}}"#));
    world.player_for_session(SessionId(session)).unwrap()
}

pub fn attack(world: &mut World, session: u64, target: InstanceId) {
    send(world, session, &format!(r#"{{"type":"attack","instance":"{target}"}}"#));
}

pub fn step(world: &mut World, session: u64, x: i32, y: i32) {
    send(world, session, &format!(r#"{{"type":"move","x":{x},"y":{y}}}"#));
}

/// Flush pending packets and return what `session` received, parsed.
pub fn drain_for(world: &mut World, session: u64) -> Vec<Value> {
    world.tick(0);
    messages_for(&world.take_output(), session)
}

pub fn messages_for(output: &[SessionOutput], session: u64) -> Vec<Value> {
    output
        .iter()
        .filter(|o| o.session_id == SessionId(session))
        .map(|o| serde_json::from_str(&o.text).unwrap())
        .collect()
}

pub fn of_type<'a>(messages: &'a [Value], kind: &str) -> Vec<&'a Value> {
    messages.iter().filter(|m| m["type"] == kind).collect()
}

pub fn pos_of(world: &World, id: InstanceId) -> GridPos {
    world.entities().entity(id).unwrap().pos
}
