use std::collections::BTreeSet;

use instance::InstanceId;
use serde::{Deserialize, Serialize};

use crate::map::TileWire;
use crate::spatial_grid::GridPos;

/// Light source decoration sent with a region's tile data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub x: i32,
    pub y: i32,
    pub distance: u32,
    #[serde(default)]
    pub color: Option<String>,
}

/// One fixed-size chunk of the map.
///
/// `entities` holds every entity whose visibility footprint touches this
/// chunk (see `RegionManager::handle`), `players` the subset that are players.
/// `joining` collects entities that became resident since the last flush.
#[derive(Debug, Clone, Default)]
pub struct Region {
    origin: GridPos,
    size: u32,
    entities: BTreeSet<InstanceId>,
    players: Vec<InstanceId>,
    joining: Vec<InstanceId>,
    dynamic_areas: Vec<u32>,
    resources: Vec<GridPos>,
    lights: Vec<Light>,
    tiles: Vec<TileWire>,
}

impl Region {
    pub fn new(origin: GridPos, size: u32) -> Self {
        Self {
            origin,
            size,
            ..Self::default()
        }
    }

    /// Empty shadow copy carrying the same static decorations and tiles.
    pub fn instanced(&self) -> Self {
        Self {
            origin: self.origin,
            size: self.size,
            dynamic_areas: self.dynamic_areas.clone(),
            resources: self.resources.clone(),
            lights: self.lights.clone(),
            tiles: self.tiles.clone(),
            ..Self::default()
        }
    }

    pub fn origin(&self) -> GridPos {
        self.origin
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn contains_pos(&self, pos: GridPos) -> bool {
        let s = self.size as i32;
        pos.x >= self.origin.x
            && pos.y >= self.origin.y
            && pos.x < self.origin.x + s
            && pos.y < self.origin.y + s
    }

    // --- membership ---

    pub fn add_entity(&mut self, entity: InstanceId) -> bool {
        self.entities.insert(entity)
    }

    /// Removing an entity also drops it from the player list and any pending join.
    pub fn remove_entity(&mut self, entity: InstanceId) -> bool {
        let removed = self.entities.remove(&entity);
        self.players.retain(|p| *p != entity);
        self.joining.retain(|j| *j != entity);
        removed
    }

    pub fn has_entity(&self, entity: InstanceId) -> bool {
        self.entities.contains(&entity)
    }

    pub fn add_player(&mut self, player: InstanceId) {
        if !self.players.contains(&player) {
            self.players.push(player);
        }
    }

    pub fn remove_player(&mut self, player: InstanceId) {
        self.players.retain(|p| *p != player);
    }

    pub fn players(&self) -> &[InstanceId] {
        &self.players
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Queue an entity for a spawn broadcast on the next flush. Ignored when
    /// the entity is already resident or already queued.
    pub fn add_joining(&mut self, entity: InstanceId) -> bool {
        if self.entities.contains(&entity) || self.joining.contains(&entity) {
            return false;
        }
        self.joining.push(entity);
        true
    }

    pub fn has_joining(&self) -> bool {
        !self.joining.is_empty()
    }

    pub fn take_joining(&mut self) -> Vec<InstanceId> {
        std::mem::take(&mut self.joining)
    }

    /// Entities in this region that pass `visible`, minus `excluding`.
    pub fn get_entities<F>(&self, excluding: Option<InstanceId>, visible: F) -> Vec<InstanceId>
    where
        F: Fn(InstanceId) -> bool,
    {
        self.entities
            .iter()
            .copied()
            .filter(|id| Some(*id) != excluding && visible(*id))
            .collect()
    }

    // --- decorations ---

    pub fn add_dynamic_area(&mut self, area: u32) {
        if !self.dynamic_areas.contains(&area) {
            self.dynamic_areas.push(area);
        }
    }

    pub fn add_resource(&mut self, pos: GridPos) {
        if !self.resources.contains(&pos) {
            self.resources.push(pos);
        }
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn dynamic_areas(&self) -> &[u32] {
        &self.dynamic_areas
    }

    pub fn resources(&self) -> &[GridPos] {
        &self.resources
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn tiles(&self) -> &[TileWire] {
        &self.tiles
    }

    pub fn set_tiles(&mut self, tiles: Vec<TileWire>) {
        self.tiles = tiles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    fn player(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Player, seq)
    }

    fn mob(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Mob, seq)
    }

    #[test]
    fn default_region_is_empty_at_origin() {
        let region = Region::default();
        assert_eq!(region.origin(), GridPos::default());
        assert_eq!(region.origin(), GridPos::new(0, 0));
        assert!(region.is_empty());
        assert!(!region.has_joining());
    }

    #[test]
    fn add_entity_is_idempotent() {
        let mut region = Region::new(GridPos::new(0, 0), 8);
        assert!(region.add_entity(mob(1)));
        assert!(!region.add_entity(mob(1)));
        assert_eq!(region.entity_count(), 1);
    }

    #[test]
    fn remove_entity_strips_player_and_joining() {
        let mut region = Region::new(GridPos::new(0, 0), 8);
        region.add_joining(player(1));
        region.add_entity(player(1));
        region.add_player(player(1));

        assert!(region.remove_entity(player(1)));
        assert!(region.players().is_empty());
        assert!(!region.has_joining());
        assert!(!region.remove_entity(player(1)));
    }

    #[test]
    fn joining_skips_residents_and_duplicates() {
        let mut region = Region::new(GridPos::new(0, 0), 8);
        region.add_entity(mob(1));
        assert!(!region.add_joining(mob(1)));
        assert!(region.add_joining(mob(2)));
        assert!(!region.add_joining(mob(2)));
        assert_eq!(region.take_joining(), vec![mob(2)]);
        assert!(!region.has_joining());
    }

    #[test]
    fn get_entities_filters_by_visibility() {
        let mut region = Region::new(GridPos::new(0, 0), 8);
        region.add_entity(player(1));
        region.add_entity(mob(1));
        region.add_entity(mob(2));

        let seen = region.get_entities(Some(player(1)), |id| id != mob(2));
        assert_eq!(seen, vec![mob(1)]);
    }

    #[test]
    fn players_list_has_no_duplicates() {
        let mut region = Region::new(GridPos::new(0, 0), 8);
        region.add_player(player(3));
        region.add_player(player(3));
        assert_eq!(region.players(), &[player(3)]);
        region.remove_player(player(3));
        assert!(region.players().is_empty());
    }

    #[test]
    fn instanced_copy_keeps_decorations_only() {
        let mut region = Region::new(GridPos::new(8, 0), 8);
        region.add_entity(mob(1));
        region.add_dynamic_area(4);
        region.add_resource(GridPos::new(9, 1));
        region.add_light(Light {
            x: 10,
            y: 2,
            distance: 3,
            color: None,
        });

        let copy = region.instanced();
        assert!(copy.is_empty());
        assert_eq!(copy.dynamic_areas(), &[4]);
        assert_eq!(copy.resources(), &[GridPos::new(9, 1)]);
        assert_eq!(copy.lights().len(), 1);
        assert_eq!(copy.origin(), GridPos::new(8, 0));
    }

    #[test]
    fn contains_pos_matches_chunk_bounds() {
        let region = Region::new(GridPos::new(8, 8), 8);
        assert!(region.contains_pos(GridPos::new(8, 8)));
        assert!(region.contains_pos(GridPos::new(15, 15)));
        assert!(!region.contains_pos(GridPos::new(16, 8)));
        assert!(!region.contains_pos(GridPos::new(7, 8)));
    }
}
