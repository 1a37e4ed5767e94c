use std::collections::{BTreeMap, BTreeSet};

use instance::InstanceId;
use serde::{Deserialize, Serialize};

use crate::area::{AreaKind, Areas};
use crate::error::SpaceError;
use crate::map::{MapData, TileWire};
use crate::region::{Light, Region};
use crate::spatial_grid::GridPos;

/// Identifies a region: a chunk of the base partition, or a private shadow
/// copy of one owned by a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionKey {
    Base(usize),
    Instanced { index: usize, owner: InstanceId },
}

impl RegionKey {
    pub fn index(self) -> usize {
        match self {
            RegionKey::Base(index) | RegionKey::Instanced { index, .. } => index,
        }
    }

    pub fn owner(self) -> Option<InstanceId> {
        match self {
            RegionKey::Base(_) => None,
            RegionKey::Instanced { owner, .. } => Some(owner),
        }
    }

    /// Same layer (base or the same owner's instance), different chunk.
    pub fn with_index(self, index: usize) -> Self {
        match self {
            RegionKey::Base(_) => RegionKey::Base(index),
            RegionKey::Instanced { owner, .. } => RegionKey::Instanced { index, owner },
        }
    }

    pub fn is_instanced(self) -> bool {
        matches!(self, RegionKey::Instanced { .. })
    }
}

impl std::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionKey::Base(index) => write!(f, "{index}"),
            RegionKey::Instanced { index, owner } => write!(f, "{index}-{owner}"),
        }
    }
}

/// What the region manager needs from anything it places into regions.
pub trait Locatable {
    fn instance_id(&self) -> InstanceId;

    fn grid_pos(&self) -> GridPos;

    fn region(&self) -> Option<RegionKey>;

    fn set_region(&mut self, region: Option<RegionKey>);

    /// Owner of the instanced layer this entity lives in, if any.
    fn instance_owner(&self) -> Option<InstanceId> {
        None
    }

    /// Regions the entity stopped being visible from on its last transition.
    fn set_recently_left(&mut self, regions: Vec<RegionKey>);
}

/// Tile data for one region as sent to a single observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionData {
    pub key: RegionKey,
    pub tiles: Vec<TileWire>,
    pub lights: Vec<Light>,
    pub resources: Vec<GridPos>,
}

/// Observer state consulted when building region payloads.
pub struct RegionView<'a> {
    pub region: RegionKey,
    pub loaded: &'a mut BTreeSet<RegionKey>,
    pub quests: &'a BTreeSet<String>,
    pub achievements: &'a BTreeSet<String>,
}

/// Regular partition of the map into `division_size` square regions, laid
/// out row-major, plus lazily created instanced copies.
#[derive(Debug, Clone)]
pub struct RegionManager {
    width: u32,
    height: u32,
    division_size: u32,
    columns: usize,
    rows: usize,
    regions: Vec<Region>,
    instanced: BTreeMap<RegionKey, Region>,
    areas: Areas,
    /// Dynamic area id -> (tile index -> alternate tile id).
    mapped_tiles: BTreeMap<u32, BTreeMap<u32, u32>>,
}

impl RegionManager {
    pub fn new(width: u32, height: u32, division_size: u32) -> Result<Self, SpaceError> {
        if division_size == 0
            || width == 0
            || height == 0
            || width % division_size != 0
            || height % division_size != 0
        {
            return Err(SpaceError::IndivisibleMap {
                width,
                height,
                division_size,
            });
        }

        let columns = (width / division_size) as usize;
        let rows = (height / division_size) as usize;
        let mut regions = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                let origin = GridPos::new(
                    (column as u32 * division_size) as i32,
                    (row as u32 * division_size) as i32,
                );
                regions.push(Region::new(origin, division_size));
            }
        }

        tracing::info!(width, height, division_size, regions = regions.len(), "regions built");

        Ok(Self {
            width,
            height,
            division_size,
            columns,
            rows,
            regions,
            instanced: BTreeMap::new(),
            areas: Areas::default(),
            mapped_tiles: BTreeMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn division_size(&self) -> u32 {
        self.division_size
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn areas(&self) -> &Areas {
        &self.areas
    }

    /// Row-major region index for a tile, `None` outside the map.
    pub fn region_index(&self, pos: GridPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return None;
        }
        let column = pos.x as u32 / self.division_size;
        let row = pos.y as u32 / self.division_size;
        Some(row as usize * self.columns + column as usize)
    }

    pub fn key_for(&self, pos: GridPos, owner: Option<InstanceId>) -> Option<RegionKey> {
        let index = self.region_index(pos)?;
        Some(match owner {
            Some(owner) => RegionKey::Instanced { index, owner },
            None => RegionKey::Base(index),
        })
    }

    /// The region and its neighbours, clamped at the map edges.
    pub fn surrounding_indices(&self, index: usize) -> Vec<usize> {
        if index >= self.regions.len() {
            return Vec::new();
        }
        let row = (index / self.columns) as i64;
        let column = (index % self.columns) as i64;
        let mut result = Vec::with_capacity(9);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (r, c) = (row + dy, column + dx);
                if r < 0 || c < 0 || r >= self.rows as i64 || c >= self.columns as i64 {
                    continue;
                }
                result.push(r as usize * self.columns + c as usize);
            }
        }
        result
    }

    pub fn surrounding(&self, key: RegionKey) -> Vec<RegionKey> {
        self.surrounding_indices(key.index())
            .into_iter()
            .map(|index| key.with_index(index))
            .collect()
    }

    pub fn get(&self, key: RegionKey) -> Option<&Region> {
        match key {
            RegionKey::Base(index) => self.regions.get(index),
            RegionKey::Instanced { .. } => self.instanced.get(&key),
        }
    }

    fn get_mut(&mut self, key: RegionKey) -> Option<&mut Region> {
        match key {
            RegionKey::Base(index) => self.regions.get_mut(index),
            RegionKey::Instanced { .. } => self.instanced.get_mut(&key),
        }
    }

    // --- movement propagation ---

    /// Move an entity's membership to the neighbourhood of its current tile.
    /// Returns whether a region transition happened.
    pub fn handle<L: Locatable + ?Sized>(&mut self, entity: &mut L) -> bool {
        let id = entity.instance_id();
        let Some(key) = self.key_for(entity.grid_pos(), entity.instance_owner()) else {
            tracing::debug!(entity = %id, pos = %entity.grid_pos(), "handle ignored, off map");
            return false;
        };
        let previous = entity.region();
        if previous == Some(key) {
            return false;
        }

        let old_neighbours = previous.map(|k| self.surrounding(k)).unwrap_or_default();
        let new_neighbours = self.surrounding(key);
        if key.is_instanced() {
            for k in &new_neighbours {
                self.ensure_instanced(*k);
            }
        }

        let mut removed = Vec::new();
        for k in &old_neighbours {
            if let Some(region) = self.get_mut(*k) {
                if region.remove_entity(id) {
                    removed.push(*k);
                }
            }
        }

        if let Some(region) = self.get_mut(key) {
            region.add_joining(id);
        }

        for k in &new_neighbours {
            if let Some(region) = self.get_mut(*k) {
                region.add_entity(id);
                if id.is_player() {
                    region.add_player(id);
                }
            }
        }

        entity.set_region(Some(key));
        entity.set_recently_left(
            removed
                .into_iter()
                .filter(|k| !new_neighbours.contains(k))
                .collect(),
        );
        true
    }

    /// Detach an entity from every region it belongs to. Returns the regions
    /// it was removed from.
    pub fn remove<L: Locatable + ?Sized>(&mut self, entity: &mut L) -> Vec<RegionKey> {
        let id = entity.instance_id();
        let Some(key) = entity.region() else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        for k in self.surrounding(key) {
            if let Some(region) = self.get_mut(k) {
                if region.remove_entity(id) {
                    removed.push(k);
                }
            }
        }
        entity.set_region(None);
        removed
    }

    /// Drain every region's joining queue.
    pub fn parse(&mut self) -> Vec<(RegionKey, Vec<InstanceId>)> {
        let mut joined = Vec::new();
        for (index, region) in self.regions.iter_mut().enumerate() {
            if region.has_joining() {
                joined.push((RegionKey::Base(index), region.take_joining()));
            }
        }
        for (key, region) in self.instanced.iter_mut() {
            if region.has_joining() {
                joined.push((*key, region.take_joining()));
            }
        }
        joined
    }

    /// Players whose neighbourhood includes `key`, i.e. every player that can
    /// see an entity standing in that region.
    pub fn players_in(&self, key: RegionKey) -> &[InstanceId] {
        self.get(key).map(Region::players).unwrap_or(&[])
    }

    /// Entities visible from `key`, filtered through `visible`.
    pub fn entities_around<F>(
        &self,
        key: RegionKey,
        excluding: Option<InstanceId>,
        visible: F,
    ) -> Vec<InstanceId>
    where
        F: Fn(InstanceId) -> bool,
    {
        self.get(key)
            .map(|region| region.get_entities(excluding, visible))
            .unwrap_or_default()
    }

    /// Every region, base or instanced, that lists the entity.
    pub fn regions_containing(&self, id: InstanceId) -> BTreeSet<RegionKey> {
        let base = self
            .regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.has_entity(id))
            .map(|(i, _)| RegionKey::Base(i));
        let instanced = self
            .instanced
            .iter()
            .filter(|(_, r)| r.has_entity(id))
            .map(|(k, _)| *k);
        base.chain(instanced).collect()
    }

    // --- instancing ---

    fn ensure_instanced(&mut self, key: RegionKey) -> bool {
        if key.owner().is_none() || self.instanced.contains_key(&key) {
            return false;
        }
        let Some(base) = self.regions.get(key.index()) else {
            return false;
        };
        let copy = base.instanced();
        self.instanced.insert(key, copy);
        true
    }

    /// Create `owner`'s shadow copies of the neighbourhood around `around`.
    /// Returns how many regions were newly created.
    pub fn create_instance(&mut self, owner: InstanceId, around: usize) -> usize {
        let created = self
            .surrounding_indices(around)
            .into_iter()
            .filter(|index| self.ensure_instanced(RegionKey::Instanced { index: *index, owner }))
            .count();
        tracing::debug!(%owner, around, created, "instance created");
        created
    }

    /// Drop every region owned by `owner`. Returns the entities that were
    /// still listed in them so the caller can clean them up.
    pub fn delete_instance(&mut self, owner: InstanceId) -> Vec<InstanceId> {
        let keys: Vec<RegionKey> = self
            .instanced
            .keys()
            .filter(|k| k.owner() == Some(owner))
            .copied()
            .collect();
        let mut residents = BTreeSet::new();
        for key in &keys {
            if let Some(region) = self.instanced.remove(key) {
                residents.extend(region.get_entities(None, |_| true));
            }
        }
        tracing::debug!(%owner, regions = keys.len(), "instance deleted");
        residents.into_iter().collect()
    }

    pub fn instanced_count(&self, owner: InstanceId) -> usize {
        self.instanced.keys().filter(|k| k.owner() == Some(owner)).count()
    }

    pub fn instanced_total(&self) -> usize {
        self.instanced.len()
    }

    // --- static data ---

    /// Register map areas; dynamic areas are attached to every region they overlap.
    pub fn register_areas(&mut self, areas: Areas) {
        for area in areas.of_kind(AreaKind::Dynamic) {
            let (min, max) = area.shape.bounds();
            for index in self.indices_overlapping(min, max) {
                self.regions[index].add_dynamic_area(area.id);
            }
        }
        self.areas = areas;
    }

    fn indices_overlapping(&self, min: GridPos, max: GridPos) -> Vec<usize> {
        let clamp_x = |x: i32| x.clamp(0, self.width as i32 - 1);
        let clamp_y = |y: i32| y.clamp(0, self.height as i32 - 1);
        let d = self.division_size as i32;
        let mut result = Vec::new();
        for row in (clamp_y(min.y) / d)..=(clamp_y(max.y) / d) {
            for column in (clamp_x(min.x) / d)..=(clamp_x(max.x) / d) {
                result.push(row as usize * self.columns + column as usize);
            }
        }
        result
    }

    pub fn add_resource(&mut self, pos: GridPos) -> Result<(), SpaceError> {
        let index = self
            .region_index(pos)
            .ok_or(SpaceError::OutOfBounds { x: pos.x, y: pos.y })?;
        self.regions[index].add_resource(pos);
        Ok(())
    }

    pub fn add_light(&mut self, light: Light) -> Result<(), SpaceError> {
        let pos = GridPos::new(light.x, light.y);
        let index = self
            .region_index(pos)
            .ok_or(SpaceError::OutOfBounds { x: pos.x, y: pos.y })?;
        self.regions[index].add_light(light);
        Ok(())
    }

    /// Compute every region's tile block and the dynamic-area alternates.
    pub fn build_region_tiles(&mut self, map: &dyn MapData) -> Result<(), SpaceError> {
        self.check_map(map)?;
        for region in self.regions.iter_mut() {
            let origin = region.origin();
            let size = region.size() as i32;
            let mut tiles = Vec::with_capacity((size * size) as usize);
            for y in origin.y..origin.y + size {
                for x in origin.x..origin.x + size {
                    let pos = GridPos::new(x, y);
                    tiles.push(TileWire {
                        index: map.tile_index(pos),
                        data: map.tile(pos),
                    });
                }
            }
            region.set_tiles(tiles);
        }
        self.build_dynamic_tiles(map)
    }

    /// Alternate tiles for dynamic areas, read from each area's mapped block.
    pub fn build_dynamic_tiles(&mut self, map: &dyn MapData) -> Result<(), SpaceError> {
        self.check_map(map)?;
        self.mapped_tiles.clear();
        for area in self.areas.of_kind(AreaKind::Dynamic) {
            if area.mapped.is_none() {
                continue;
            }
            let (min, max) = area.shape.bounds();
            let mut alternates = BTreeMap::new();
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    let pos = GridPos::new(x, y);
                    if !area.contains(pos) || !map.in_bounds(pos) {
                        continue;
                    }
                    if let Some(mapped) = area.mapped_position(pos) {
                        alternates.insert(map.tile_index(pos), map.tile(mapped));
                    }
                }
            }
            self.mapped_tiles.insert(area.id, alternates);
        }
        Ok(())
    }

    fn check_map(&self, map: &dyn MapData) -> Result<(), SpaceError> {
        if map.width() != self.width || map.height() != self.height {
            return Err(SpaceError::MapMismatch {
                expected: (self.width, self.height),
                got: (map.width(), map.height()),
            });
        }
        Ok(())
    }

    /// Per-region tiles in region order, as stored by the region cache.
    pub fn tile_snapshot(&self) -> Vec<Vec<TileWire>> {
        self.regions.iter().map(|r| r.tiles().to_vec()).collect()
    }

    pub fn load_tiles(&mut self, tiles: Vec<Vec<TileWire>>) -> Result<(), SpaceError> {
        if tiles.len() != self.regions.len() {
            return Err(SpaceError::TileCountMismatch {
                expected: self.regions.len(),
                got: tiles.len(),
            });
        }
        for (region, block) in self.regions.iter_mut().zip(tiles) {
            region.set_tiles(block);
        }
        Ok(())
    }

    /// Tile payload for the observer's neighbourhood. Regions already in
    /// `view.loaded` are skipped unless `force` is set; the loaded set is
    /// updated with whatever is returned.
    pub fn region_payload(&self, view: RegionView<'_>, force: bool) -> Vec<RegionData> {
        let mut payload = Vec::new();
        for key in self.surrounding(view.region) {
            if !force && view.loaded.contains(&key) {
                continue;
            }
            let Some(region) = self.get(key) else {
                continue;
            };
            let mut tiles = region.tiles().to_vec();
            for area_id in region.dynamic_areas() {
                let Some(area) = self.areas.get(*area_id) else {
                    continue;
                };
                let unlocked = area
                    .requirement
                    .as_ref()
                    .is_some_and(|req| req.is_met(view.quests, view.achievements));
                if !unlocked {
                    continue;
                }
                if let Some(alternates) = self.mapped_tiles.get(area_id) {
                    for tile in tiles.iter_mut() {
                        if let Some(data) = alternates.get(&tile.index) {
                            tile.data = *data;
                        }
                    }
                }
            }
            view.loaded.insert(key);
            payload.push(RegionData {
                key,
                tiles,
                lights: region.lights().to_vec(),
                resources: region.resources().to_vec(),
            });
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{Area, MappedArea, Requirement, Shape};
    use crate::map::FlatMap;
    use instance::EntityKind;

    struct Dummy {
        id: InstanceId,
        pos: GridPos,
        region: Option<RegionKey>,
        owner: Option<InstanceId>,
        recently_left: Vec<RegionKey>,
    }

    impl Dummy {
        fn new(id: InstanceId, x: i32, y: i32) -> Self {
            Self {
                id,
                pos: GridPos::new(x, y),
                region: None,
                owner: None,
                recently_left: Vec::new(),
            }
        }
    }

    impl Locatable for Dummy {
        fn instance_id(&self) -> InstanceId {
            self.id
        }
        fn grid_pos(&self) -> GridPos {
            self.pos
        }
        fn region(&self) -> Option<RegionKey> {
            self.region
        }
        fn set_region(&mut self, region: Option<RegionKey>) {
            self.region = region;
        }
        fn instance_owner(&self) -> Option<InstanceId> {
            self.owner
        }
        fn set_recently_left(&mut self, regions: Vec<RegionKey>) {
            self.recently_left = regions;
        }
    }

    fn manager() -> RegionManager {
        // 4 x 4 regions of 8 tiles.
        RegionManager::new(32, 32, 8).unwrap()
    }

    fn player(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Player, seq)
    }

    fn mob(seq: u32) -> InstanceId {
        InstanceId::new(EntityKind::Mob, seq)
    }

    // --- construction ---

    #[test]
    fn indivisible_map_is_rejected() {
        assert!(matches!(
            RegionManager::new(30, 32, 8),
            Err(SpaceError::IndivisibleMap { .. })
        ));
        assert!(RegionManager::new(32, 32, 0).is_err());
        assert_eq!(manager().region_count(), 16);
    }

    #[test]
    fn region_index_is_row_major() {
        let rm = manager();
        assert_eq!(rm.region_index(GridPos::new(0, 0)), Some(0));
        assert_eq!(rm.region_index(GridPos::new(9, 0)), Some(1));
        assert_eq!(rm.region_index(GridPos::new(0, 9)), Some(4));
        assert_eq!(rm.region_index(GridPos::new(31, 31)), Some(15));
        assert_eq!(rm.region_index(GridPos::new(32, 0)), None);
        assert_eq!(rm.region_index(GridPos::new(-1, 0)), None);
    }

    // --- surrounding ---

    #[test]
    fn surrounding_clamps_at_edges() {
        let rm = manager();
        assert_eq!(rm.surrounding_indices(0).len(), 4);
        assert_eq!(rm.surrounding_indices(15).len(), 4);
        assert_eq!(rm.surrounding_indices(1).len(), 6);
        assert_eq!(rm.surrounding_indices(4).len(), 6);
        assert_eq!(rm.surrounding_indices(5).len(), 9);
        assert_eq!(rm.surrounding_indices(0), vec![0, 1, 4, 5]);
    }

    #[test]
    fn surrounding_keeps_instance_owner() {
        let rm = manager();
        let owner = player(1);
        let keys = rm.surrounding(RegionKey::Instanced { index: 0, owner });
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| k.owner() == Some(owner)));
    }

    #[test]
    fn region_key_display() {
        assert_eq!(RegionKey::Base(7).to_string(), "7");
        let key = RegionKey::Instanced {
            index: 3,
            owner: player(2),
        };
        assert_eq!(key.to_string(), "3-1-2");
    }

    // --- handle ---

    #[test]
    fn first_handle_places_entity_in_neighbourhood() {
        let mut rm = manager();
        let mut e = Dummy::new(mob(1), 12, 12);
        assert!(rm.handle(&mut e));
        assert_eq!(e.region, Some(RegionKey::Base(5)));

        let expected: BTreeSet<_> = rm.surrounding(RegionKey::Base(5)).into_iter().collect();
        assert_eq!(rm.regions_containing(mob(1)), expected);
        assert!(e.recently_left.is_empty());
    }

    #[test]
    fn handle_within_same_region_is_noop() {
        let mut rm = manager();
        let mut e = Dummy::new(mob(1), 12, 12);
        rm.handle(&mut e);
        e.pos = GridPos::new(13, 12);
        assert!(!rm.handle(&mut e));
    }

    #[test]
    fn neighbourhood_invariant_holds_along_a_path() {
        let mut rm = manager();
        let mut e = Dummy::new(player(1), 0, 0);
        rm.handle(&mut e);
        for step in 0..32 {
            e.pos = GridPos::new(step, step);
            rm.handle(&mut e);
            let key = rm.key_for(e.pos, None).unwrap();
            let expected: BTreeSet<_> = rm.surrounding(key).into_iter().collect();
            assert_eq!(rm.regions_containing(player(1)), expected, "at step {step}");
            for k in &expected {
                assert!(rm.players_in(*k).contains(&player(1)));
            }
        }
    }

    #[test]
    fn recently_left_is_old_minus_new() {
        let mut rm = manager();
        let mut e = Dummy::new(mob(1), 4, 4);
        rm.handle(&mut e);
        // region 0 -> region 2: old {0,1,4,5}, new {1,2,3,5,6,7}.
        e.pos = GridPos::new(20, 4);
        rm.handle(&mut e);
        let left: BTreeSet<_> = e.recently_left.iter().copied().collect();
        assert_eq!(
            left,
            BTreeSet::from([RegionKey::Base(0), RegionKey::Base(4)])
        );
    }

    #[test]
    fn joining_is_flushed_once() {
        let mut rm = manager();
        let mut e = Dummy::new(mob(1), 12, 12);
        rm.handle(&mut e);
        let joined = rm.parse();
        assert_eq!(joined, vec![(RegionKey::Base(5), vec![mob(1)])]);
        assert!(rm.parse().is_empty());
    }

    #[test]
    fn remove_detaches_from_all_regions() {
        let mut rm = manager();
        let mut e = Dummy::new(player(1), 12, 12);
        rm.handle(&mut e);
        let removed = rm.remove(&mut e);
        assert_eq!(removed.len(), 9);
        assert!(rm.regions_containing(player(1)).is_empty());
        assert!(rm.players_in(RegionKey::Base(5)).is_empty());
        assert_eq!(e.region, None);
    }

    #[test]
    fn off_map_handle_is_ignored() {
        let mut rm = manager();
        let mut e = Dummy::new(mob(1), 40, 40);
        assert!(!rm.handle(&mut e));
        assert_eq!(e.region, None);
    }

    // --- instancing ---

    #[test]
    fn instanced_entity_is_isolated_from_base() {
        let mut rm = manager();
        let owner = player(1);
        let mut observer = Dummy::new(player(2), 12, 12);
        rm.handle(&mut observer);

        let mut private = Dummy::new(mob(9), 12, 12);
        private.owner = Some(owner);
        rm.handle(&mut private);

        assert_eq!(rm.instanced_count(owner), 9);
        assert!(!rm.get(RegionKey::Base(5)).unwrap().has_entity(mob(9)));
        assert!(rm
            .regions_containing(mob(9))
            .iter()
            .all(|k| k.owner() == Some(owner)));
    }

    #[test]
    fn delete_instance_leaves_no_regions() {
        let mut rm = manager();
        let owner = player(1);
        assert_eq!(rm.create_instance(owner, 0), 4);
        assert_eq!(rm.create_instance(owner, 0), 0);

        let mut private = Dummy::new(mob(3), 2, 2);
        private.owner = Some(owner);
        rm.handle(&mut private);

        let other = player(2);
        rm.create_instance(other, 5);

        let residents = rm.delete_instance(owner);
        assert_eq!(residents, vec![mob(3)]);
        assert_eq!(rm.instanced_count(owner), 0);
        assert_eq!(rm.instanced_count(other), 9);
    }

    // --- static data ---

    fn door_areas() -> Areas {
        Areas::new(vec![Area {
            id: 1,
            kind: AreaKind::Dynamic,
            shape: Shape::Rect {
                x: 2,
                y: 2,
                width: 1,
                height: 1,
            },
            minigame: None,
            mapped: Some(MappedArea { x: 20, y: 20 }),
            requirement: Some(Requirement::Quest("door".to_string())),
        }])
    }

    #[test]
    fn build_tiles_requires_matching_map() {
        let mut rm = manager();
        assert!(rm.build_region_tiles(&FlatMap::new(16, 16)).is_err());
        rm.build_region_tiles(&FlatMap::new(32, 32)).unwrap();
        let snapshot = rm.tile_snapshot();
        assert_eq!(snapshot.len(), 16);
        assert_eq!(snapshot[0].len(), 64);
        assert_eq!(snapshot[1][0].index, 8);
    }

    #[test]
    fn load_tiles_checks_region_count() {
        let mut rm = manager();
        assert!(matches!(
            rm.load_tiles(vec![Vec::new(); 3]),
            Err(SpaceError::TileCountMismatch { expected: 16, got: 3 })
        ));
    }

    #[test]
    fn payload_skips_loaded_regions_unless_forced() {
        let mut rm = manager();
        rm.build_region_tiles(&FlatMap::new(32, 32)).unwrap();
        let (quests, achievements) = (BTreeSet::new(), BTreeSet::new());
        let mut loaded = BTreeSet::new();

        for (force, expected) in [(false, 4), (false, 0), (true, 4)] {
            let view = RegionView {
                region: RegionKey::Base(0),
                loaded: &mut loaded,
                quests: &quests,
                achievements: &achievements,
            };
            assert_eq!(rm.region_payload(view, force).len(), expected);
        }
    }

    #[test]
    fn dynamic_area_swaps_tiles_per_observer() {
        let mut rm = manager();
        let mut map = FlatMap::new(32, 32);
        map.block(GridPos::new(20, 20));
        rm.register_areas(door_areas());
        rm.build_region_tiles(&map).unwrap();
        assert_eq!(rm.get(RegionKey::Base(0)).unwrap().dynamic_areas(), &[1]);

        let door_index = 2 * 32 + 2;
        let door_tile = |payload: &[RegionData]| {
            payload
                .iter()
                .find(|r| r.key == RegionKey::Base(0))
                .and_then(|r| r.tiles.iter().find(|t| t.index == door_index))
                .map(|t| t.data)
        };

        let achievements = BTreeSet::new();
        let locked = BTreeSet::new();
        let unlocked = BTreeSet::from(["door".to_string()]);

        let mut loaded = BTreeSet::new();
        let before = rm.region_payload(
            RegionView {
                region: RegionKey::Base(0),
                loaded: &mut loaded,
                quests: &locked,
                achievements: &achievements,
            },
            true,
        );
        let after = rm.region_payload(
            RegionView {
                region: RegionKey::Base(0),
                loaded: &mut loaded,
                quests: &unlocked,
                achievements: &achievements,
            },
            true,
        );
        assert_eq!(door_tile(&before), Some(1));
        assert_eq!(door_tile(&after), Some(2));
    }
}
