use instance::{EntityKind, InstanceId};
use serde::{Deserialize, Serialize};
use space::RegionData;

/// Instance ids travel as their `"<tag>-<seq>"` text form.
pub mod wire_id {
    use instance::InstanceId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &InstanceId, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<InstanceId, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Client-to-server message (internally tagged JSON).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Login {
        name: String,
    },
    /// Step to an adjacent tile.
    Move {
        x: i32,
        y: i32,
    },
    Target {
        #[serde(with = "wire_id")]
        instance: InstanceId,
    },
    Attack {
        #[serde(with = "wire_id")]
        instance: InstanceId,
    },
    Respawn,
    /// Client finished loading and wants its surroundings.
    Ready,
    Region {
        #[serde(default)]
        force: bool,
    },
    Coursing {
        action: CoursingAction,
    },
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoursingAction {
    Enter,
    Leave,
}

/// Server-to-client message (internally tagged JSON).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session_id: u64,
        #[serde(with = "wire_id")]
        instance: InstanceId,
        name: String,
        x: i32,
        y: i32,
        hit_points: u32,
        max_hit_points: u32,
    },
    Region {
        regions: Vec<RegionData>,
    },
    /// Everything currently visible around the player.
    List {
        entities: Vec<EntityWire>,
    },
    Spawn {
        entity: EntityWire,
    },
    /// Current tiles of everything around the player.
    Positions {
        entities: Vec<PositionWire>,
    },
    Despawn {
        #[serde(with = "wire_id")]
        instance: InstanceId,
    },
    Movement {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        x: i32,
        y: i32,
    },
    Follow {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        #[serde(with = "wire_id")]
        target: InstanceId,
    },
    Combat {
        #[serde(with = "wire_id")]
        attacker: InstanceId,
        #[serde(with = "wire_id")]
        target: InstanceId,
        hit: HitWire,
    },
    Projectile {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        #[serde(with = "wire_id")]
        owner: InstanceId,
        #[serde(with = "wire_id")]
        target: InstanceId,
        hit: HitWire,
    },
    Stun {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        state: bool,
    },
    Points {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        hit_points: u32,
        max_hit_points: u32,
    },
    Death {
        #[serde(with = "wire_id")]
        instance: InstanceId,
    },
    Experience {
        #[serde(with = "wire_id")]
        instance: InstanceId,
        amount: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        skill: Option<String>,
    },
    Blink {
        #[serde(with = "wire_id")]
        instance: InstanceId,
    },
    Minigame {
        status: MinigameWire,
    },
    Notification {
        message: String,
    },
    Error {
        message: String,
    },
    Pong,
}

/// Wire representation of a spawned entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityWire {
    #[serde(with = "wire_id")]
    pub instance: InstanceId,
    pub kind: EntityKind,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hit_points: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionWire {
    #[serde(with = "wire_id")]
    pub instance: InstanceId,
    pub x: i32,
    pub y: i32,
}

/// Wire representation of one applied hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitWire {
    pub kind: String,
    pub damage: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ranged: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub aoe: bool,
}

/// Periodic minigame status as seen by one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinigameWire {
    pub name: String,
    pub state: String,
    pub countdown: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub red_score: u32,
    pub blue_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Player, seq)
    }

    #[test]
    fn deserialize_login() {
        let json = r#"{"type":"login","name":"Player1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Login {
                name: "Player1".to_string()
            }
        );
    }

    #[test]
    fn deserialize_move() {
        let json = r#"{"type":"move","x":4,"y":-1}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ClientMessage::Move { x: 4, y: -1 });
    }

    #[test]
    fn deserialize_attack_parses_instance() {
        let json = r#"{"type":"attack","instance":"2-15"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Attack {
                instance: InstanceId::new(EntityKind::Mob, 15)
            }
        );
    }

    #[test]
    fn malformed_instance_is_rejected() {
        let json = r#"{"type":"target","instance":"mob"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn deserialize_region_defaults_force() {
        let json = r#"{"type":"region"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ClientMessage::Region { force: false });
    }

    #[test]
    fn deserialize_coursing_and_ping() {
        let json = r#"{"type":"coursing","action":"enter"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Coursing {
                action: CoursingAction::Enter
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn serialize_combat_hit() {
        let msg = ServerMessage::Combat {
            attacker: player(1),
            target: InstanceId::new(EntityKind::Mob, 3),
            hit: HitWire {
                kind: "damage".to_string(),
                damage: 12,
                ranged: false,
                aoe: false,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"combat""#));
        assert!(json.contains(r#""attacker":"1-1""#));
        assert!(json.contains(r#""target":"2-3""#));
        assert!(!json.contains("ranged"));
    }

    #[test]
    fn serialize_spawn_skips_missing_fields() {
        let msg = ServerMessage::Spawn {
            entity: EntityWire {
                instance: InstanceId::new(EntityKind::Item, 2),
                kind: EntityKind::Item,
                key: "sword".to_string(),
                name: None,
                x: 3,
                y: 4,
                hit_points: None,
                max_hit_points: None,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"spawn""#));
        assert!(!json.contains("hit_points"));
        assert!(!json.contains(r#""name":null"#));
    }

    #[test]
    fn serialize_positions() {
        let msg = ServerMessage::Positions {
            entities: vec![PositionWire {
                instance: InstanceId::new(EntityKind::Mob, 4),
                x: 7,
                y: 9,
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"positions","entities":[{"instance":"2-4","x":7,"y":9}]}"#);
    }

    #[test]
    fn serialize_error() {
        let msg = ServerMessage::Error {
            message: "not close enough".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("not close enough"));
    }
}
