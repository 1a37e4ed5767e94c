//! The composition root. `World` owns every table the simulation touches
//! and is driven from exactly one thread: packets in through
//! `handle_net`, time in through `advance`/`tick`, packets out through
//! `take_output`.

mod collections;
mod damage;
mod dispatch;
mod minigames;
mod spawn;
mod tasks;

pub use collections::Collections;
pub use tasks::{Task, WorldEvent};

use std::collections::BTreeMap;

use engine_core::{EventBus, Scheduler, Simulation, TimerOwner};
use instance::{EntityKind, InstanceAllocator, InstanceId};
use net::{CommandThrottle, Outbox, PacketScope, ServerMessage};
use observability::TickMetrics;
use persistence::{map_checksum, NullStore, PlayerStore, RegionCache};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use session::{SessionId, SessionManager, SessionOutput};
use space::{Areas, MapData, RegionManager, SpatialGrid};

use crate::behavior::{BehaviorRegistry, MobBehavior};
use crate::combat::CombatCtl;
use crate::config::ServerConfig;
use crate::content::Content;
use crate::error::WorldError;
use crate::formulas::{DefaultFormulas, Formulas};
use crate::minigame::{Coursing, TeamWar};

const MINIGAME_TICK_MS: u64 = 1000;

pub struct World {
    pub(crate) config: ServerConfig,
    pub(crate) now: u64,
    pub(crate) rng: SmallRng,
    pub(crate) allocator: InstanceAllocator,
    pub(crate) grid: SpatialGrid,
    pub(crate) regions: RegionManager,
    pub(crate) map: Box<dyn MapData + Send>,
    pub(crate) entities: Collections,
    pub(crate) scheduler: Scheduler<Task>,
    pub(crate) outbox: Outbox,
    pub(crate) events: EventBus<WorldEvent>,
    pub(crate) sessions: SessionManager,
    pub(crate) throttles: BTreeMap<SessionId, CommandThrottle>,
    pub(crate) content: Content,
    pub(crate) formulas: Box<dyn Formulas>,
    pub(crate) behaviors: BehaviorRegistry,
    pub(crate) store: Box<dyn PlayerStore>,
    pub(crate) team_war: TeamWar,
    pub(crate) coursing: Coursing,
    output: Vec<SessionOutput>,
    max_aggro_range: u32,
}

impl World {
    /// Build the world and populate it from `content`. Fails only on
    /// structural problems: a map that does not divide into regions.
    pub fn new(config: ServerConfig, content: Content, map: Box<dyn MapData + Send>) -> Result<Self, WorldError> {
        let mut regions = RegionManager::new(map.width(), map.height(), config.map.division_size)?;
        regions.register_areas(Areas::new(content.areas.clone()));
        for light in &content.lights {
            if let Err(e) = regions.add_light(light.clone()) {
                tracing::error!(error = %e, "light skipped");
            }
        }
        for pos in &content.resources {
            if let Err(e) = regions.add_resource(*pos) {
                tracing::error!(error = %e, "resource skipped");
            }
        }

        let seed = config.tick.seed.unwrap_or_else(rand::random);
        let formulas = DefaultFormulas::new(seed.wrapping_add(1), config.combat.weapon_break_per_mille);
        let team_war = TeamWar::new(&config.minigame);

        let mut world = Self {
            rng: SmallRng::seed_from_u64(seed),
            allocator: InstanceAllocator::new(),
            grid: SpatialGrid::new(map.width(), map.height()),
            regions,
            map,
            entities: Collections::default(),
            scheduler: Scheduler::new(),
            outbox: Outbox::new(),
            events: EventBus::new(),
            sessions: SessionManager::new(),
            throttles: BTreeMap::new(),
            formulas: Box::new(formulas),
            behaviors: BehaviorRegistry::from_content(&content),
            store: Box::new(NullStore),
            team_war,
            coursing: Coursing::default(),
            output: Vec::new(),
            max_aggro_range: content.max_aggro_range(),
            content,
            config,
            now: 0,
        };

        world.populate();
        world
            .scheduler
            .every(TimerOwner::World, MINIGAME_TICK_MS, MINIGAME_TICK_MS, Task::MinigameTick);
        tracing::info!(
            regions = world.regions.region_count(),
            entities = world.entities.len(),
            seed,
            "world ready"
        );
        Ok(world)
    }

    pub fn with_store(mut self, store: Box<dyn PlayerStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_formulas(mut self, formulas: Box<dyn Formulas>) -> Self {
        self.formulas = formulas;
        self
    }

    fn populate(&mut self) {
        let spawns = self.content.spawns.clone();
        for spawn in &spawns {
            if let Err(e) = self.spawn_mob(&spawn.key, spawn.pos()) {
                tracing::error!(key = %spawn.key, error = %e, "mob spawn skipped");
            }
        }
        let npcs = self.content.npcs.clone();
        for npc in &npcs {
            if let Err(e) = self.spawn_npc(&npc.key, npc.pos()) {
                tracing::error!(key = %npc.key, error = %e, "npc spawn skipped");
            }
        }
    }

    /// Fill every region's static tiles, from `cache` when it was built from
    /// this exact map and by walking the map otherwise.
    pub fn build_tiles(&mut self, cache: Option<&RegionCache>) -> Result<(), WorldError> {
        let Some(cache) = cache else {
            self.regions.build_region_tiles(&*self.map)?;
            return Ok(());
        };
        let checksum = map_checksum(&*self.map);
        let division = self.config.map.division_size;
        match cache.load(&checksum, division) {
            Ok(Some(tiles)) => {
                self.regions.load_tiles(tiles)?;
                self.regions.build_dynamic_tiles(&*self.map)?;
                return Ok(());
            }
            Ok(None) => tracing::info!("no region cache, building"),
            Err(e) => tracing::warn!(error = %e, "region cache unusable, rebuilding"),
        }
        self.regions.build_region_tiles(&*self.map)?;
        if let Err(e) = cache.store(&checksum, division, self.regions.tile_snapshot()) {
            tracing::warn!(error = %e, "region cache not written");
        }
        Ok(())
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn entities(&self) -> &Collections {
        &self.entities
    }

    pub fn regions(&self) -> &RegionManager {
        &self.regions
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn scheduler(&self) -> &Scheduler<Task> {
        &self.scheduler
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn team_war(&self) -> &TeamWar {
        &self.team_war
    }

    pub fn coursing(&self) -> &Coursing {
        &self.coursing
    }

    pub fn player_for_session(&self, session: SessionId) -> Option<InstanceId> {
        self.sessions.player_for_session(session)
    }

    /// Advance the virtual clock by `ms`, running every task that falls due
    /// in order. Returns how many tasks ran.
    pub fn advance(&mut self, ms: u64) -> usize {
        let target = self.now.saturating_add(ms);
        let mut fired = 0;
        while let Some(task) = self.scheduler.pop_due(target) {
            self.now = self.now.max(task.due);
            self.run_task(task);
            self.process_events();
            fired += 1;
        }
        self.now = target;
        self.process_events();
        fired
    }

    /// One fixed step: timers, joining queues, then the outbox.
    pub fn tick(&mut self, elapsed_ms: u64) -> TickMetrics {
        let timers_fired = self.advance(elapsed_ms);
        self.parse_regions();
        let packets_flushed = self.flush();
        TickMetrics {
            timers_fired,
            packets_flushed,
            entity_count: self.entities.len(),
            ..TickMetrics::default()
        }
    }

    /// Send a spawn for every entity that joined a region since the last
    /// tick to the players observing that region.
    fn parse_regions(&mut self) {
        for (key, joined) in self.regions.parse() {
            for id in joined {
                if id.kind == EntityKind::Projectile {
                    continue;
                }
                let Some(visible) = self.entities.visible(id) else {
                    continue;
                };
                let observers: Vec<InstanceId> = self
                    .regions
                    .players_in(key)
                    .iter()
                    .copied()
                    .filter(|p| *p != id && visible.is_visible_to(*p))
                    .collect();
                if observers.is_empty() {
                    continue;
                }
                self.outbox.push(
                    PacketScope::Players(observers),
                    ServerMessage::Spawn {
                        entity: visible.to_wire(),
                    },
                );
            }
        }
    }

    /// Serialize everything queued and resolve it to sessions.
    fn flush(&mut self) -> usize {
        let mut flushed = 0;
        for (scope, message) in self.outbox.drain() {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "packet not serialized");
                    continue;
                }
            };
            for session in self.resolve_scope(&scope) {
                self.output.push(SessionOutput::new(session, text.clone()));
                flushed += 1;
            }
        }
        flushed
    }

    fn resolve_scope(&self, scope: &PacketScope) -> Vec<SessionId> {
        let players = &self.entities.players;
        let ids: Vec<InstanceId> = match scope {
            PacketScope::Broadcast => players.keys().copied().collect(),
            PacketScope::Region(key) => self.regions.players_in(*key).to_vec(),
            PacketScope::Regions(keys) => players
                .values()
                .filter(|p| p.character.entity.region.is_some_and(|r| keys.contains(&r)))
                .map(|p| p.id())
                .collect(),
            PacketScope::Player(id) => vec![*id],
            PacketScope::Players(ids) => ids.clone(),
        };
        ids.iter()
            .filter_map(|id| players.get(id))
            .map(|p| p.session)
            .collect()
    }

    /// Answer a session directly, bypassing scope resolution. Used before a
    /// player is bound to it.
    pub(crate) fn reply(&mut self, session: SessionId, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(text) => self.output.push(SessionOutput::new(session, text)),
            Err(e) => tracing::warn!(%session, error = %e, "reply not serialized"),
        }
    }

    pub fn take_output(&mut self) -> Vec<SessionOutput> {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn process_events(&mut self) {
        for event in self.events.drain() {
            match event {
                WorldEvent::Killed {
                    victim,
                    killer,
                    owner,
                    ..
                } => self.on_killed(victim, killer, owner),
                WorldEvent::PlayerDied { player, killer } => self.on_player_died(player, killer),
            }
        }
    }

    /// Run `f` with the behavior registered for mob `id`, if any.
    pub(crate) fn with_behavior<F>(&mut self, id: InstanceId, f: F)
    where
        F: FnOnce(&dyn MobBehavior, &mut CombatCtl<'_>),
    {
        let Some(key) = self.entities.mobs.get(&id).map(|m| m.character.entity.key.clone()) else {
            return;
        };
        let Some(behavior) = self.behaviors.get(&key) else {
            return;
        };
        let mut ctl = self.combat(id);
        f(behavior.as_ref(), &mut ctl);
    }

    /// Save every player and tell every session the server is going away.
    pub fn shutdown(&mut self) -> Vec<SessionOutput> {
        let records: Vec<_> = self.entities.players.values().map(|p| p.to_record()).collect();
        for record in &records {
            if let Err(e) = self.store.save(record) {
                tracing::warn!(player = %record.name, error = %e, "save on shutdown failed");
            }
        }
        let message = ServerMessage::Error {
            message: "Server is shutting down.".to_string(),
        };
        let mut output = self.take_output();
        if let Ok(text) = serde_json::to_string(&message) {
            for session in self.sessions.playing_sessions() {
                output.push(SessionOutput::with_disconnect(session.session_id, text.clone()));
            }
        }
        tracing::info!(players = records.len(), "world shut down");
        output
    }
}

impl Simulation for World {
    fn step(&mut self, elapsed_ms: u64) -> TickMetrics {
        self.tick(elapsed_ms)
    }
}
