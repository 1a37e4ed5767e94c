/// Integration tests for what a connected session sees: login, the region
/// neighbourhood, spawn announcements, packet errors, throttling, saves.
mod support;

use net::channels::NetToTick;
use persistence::{FileStore, PlayerStore};
use session::SessionId;
use space::GridPos;

use support::{drain_for, login, make_config, make_world, make_world_with, of_type, send, step};

#[test]
fn login_welcomes_and_sends_the_neighbourhood() {
    let mut world = make_world(1);
    let player = login(&mut world, 1, "ada");

    let messages = drain_for(&mut world, 1);
    let welcome = of_type(&messages, "welcome");
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0]["instance"], player.to_string());
    assert_eq!(welcome[0]["x"], 8);

    // Region 0 of a 4x4 layout sees itself and three neighbours.
    let region = of_type(&messages, "region");
    assert_eq!(region[0]["regions"].as_array().unwrap().len(), 4);
}

#[test]
fn ready_lists_only_the_neighbourhood() {
    let mut world = make_world(1);
    let near = world.spawn_mob("rat", GridPos::new(20, 8)).unwrap();
    let far = world.spawn_mob("rat", GridPos::new(40, 40)).unwrap();
    login(&mut world, 1, "ada");
    drain_for(&mut world, 1);

    send(&mut world, 1, r#"{"type":"ready"}"#);
    let messages = drain_for(&mut world, 1);
    let list = of_type(&messages, "list");
    let ids: Vec<&str> = list[0]["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["instance"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&near.to_string().as_str()));
    assert!(!ids.contains(&far.to_string().as_str()));
    assert_eq!(of_type(&messages, "positions").len(), 1);
}

#[test]
fn new_entities_are_announced_once() {
    let mut world = make_world(1);
    login(&mut world, 1, "ada");
    drain_for(&mut world, 1);

    let rat = world.spawn_mob("rat", GridPos::new(10, 10)).unwrap();
    let messages = drain_for(&mut world, 1);
    let spawns = of_type(&messages, "spawn");
    assert_eq!(spawns.len(), 1);
    assert_eq!(spawns[0]["entity"]["instance"], rat.to_string());

    assert!(of_type(&drain_for(&mut world, 1), "spawn").is_empty());
}

#[test]
fn crossing_a_region_border_sends_only_new_tiles() {
    let mut world = make_world(1);
    let player = login(&mut world, 1, "ada");
    drain_for(&mut world, 1);

    for x in 9..=15 {
        step(&mut world, 1, x, 8);
    }
    assert!(of_type(&drain_for(&mut world, 1), "region").is_empty());

    step(&mut world, 1, 16, 8);
    assert_eq!(world.entities().entity(player).unwrap().pos, GridPos::new(16, 8));
    let messages = drain_for(&mut world, 1);
    let region = of_type(&messages, "region");
    assert_eq!(region.len(), 1);
    assert_eq!(region[0]["regions"].as_array().unwrap().len(), 2);
}

#[test]
fn illegal_moves_are_ignored() {
    let mut world = make_world(1);
    let player = login(&mut world, 1, "ada");

    step(&mut world, 1, 10, 8);
    step(&mut world, 1, -1, 8);
    assert_eq!(world.entities().entity(player).unwrap().pos, GridPos::new(8, 8));

    step(&mut world, 1, 9, 9);
    assert_eq!(world.entities().entity(player).unwrap().pos, GridPos::new(9, 9));
}

#[test]
fn bad_packets_do_not_end_the_session() {
    let mut world = make_world(1);
    world.handle_net(NetToTick::NewConnection {
        session_id: SessionId(1),
    });

    send(&mut world, 1, "not json");
    send(&mut world, 1, r#"{"type":"move","x":1,"y":1}"#);
    send(&mut world, 1, r#"{"type":"ping"}"#);
    let messages = drain_for(&mut world, 1);
    assert_eq!(of_type(&messages, "pong").len(), 1);

    send(&mut world, 1, r#"{"type":"login","name":"../evil"}"#);
    assert_eq!(of_type(&drain_for(&mut world, 1), "error").len(), 1);
    assert!(world.player_for_session(SessionId(1)).is_none());

    send(&mut world, 1, r#"{"type":"login","name":"ada"}"#);
    assert!(world.player_for_session(SessionId(1)).is_some());
}

#[test]
fn a_name_can_only_be_online_once() {
    let mut world = make_world(1);
    login(&mut world, 1, "ada");
    world.handle_net(NetToTick::NewConnection {
        session_id: SessionId(2),
    });
    send(&mut world, 2, r#"{"type":"login","name":"ada"}"#);

    assert!(world.player_for_session(SessionId(2)).is_none());
    assert_eq!(of_type(&drain_for(&mut world, 2), "error").len(), 1);
}

#[test]
fn packet_bursts_are_throttled() {
    let mut config = make_config();
    config.net.max_packets_per_second = 5;
    let mut world = make_world_with(config, "", 1);
    world.handle_net(NetToTick::NewConnection {
        session_id: SessionId(1),
    });

    for _ in 0..8 {
        send(&mut world, 1, r#"{"type":"ping"}"#);
    }
    assert_eq!(of_type(&drain_for(&mut world, 1), "pong").len(), 5);

    world.advance(1000);
    send(&mut world, 1, r#"{"type":"ping"}"#);
    assert_eq!(of_type(&drain_for(&mut world, 1), "pong").len(), 1);
}

#[test]
fn disconnect_saves_and_removes_the_player() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = make_world(1).with_store(Box::new(FileStore::new(dir.path())));
    let player = login(&mut world, 1, "ada");
    step(&mut world, 1, 9, 8);

    world.handle_net(NetToTick::Disconnected {
        session_id: SessionId(1),
    });
    assert!(world.entities().players.get(&player).is_none());
    assert!(world.grid().entities_at(GridPos::new(9, 8)).is_empty());

    let record = FileStore::new(dir.path()).load("ada").unwrap().unwrap();
    assert_eq!((record.x, record.y), (9, 8));

    // Coming back restores the saved position.
    let again = login(&mut world, 2, "ada");
    assert_eq!(world.entities().entity(again).unwrap().pos, GridPos::new(9, 8));
}

#[test]
fn shutdown_says_goodbye_to_every_player() {
    let mut world = make_world(1);
    login(&mut world, 1, "ada");
    login(&mut world, 2, "bob");
    drain_for(&mut world, 1);

    let output = world.shutdown();
    let goodbyes: Vec<_> = output.iter().filter(|o| o.disconnect).collect();
    assert_eq!(goodbyes.len(), 2);
}
