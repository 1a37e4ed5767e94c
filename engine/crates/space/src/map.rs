use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::spatial_grid::GridPos;

/// One serialized tile: flat map index plus tile id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWire {
    pub index: u32,
    pub data: u32,
}

/// Map collaborator: dimensions, tile ids and collision. Map file parsing
/// lives behind this trait.
pub trait MapData {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Tile id at a position, 0 for empty or out of bounds.
    fn tile(&self, pos: GridPos) -> u32;

    fn is_colliding(&self, pos: GridPos) -> bool;

    fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width() && (pos.y as u32) < self.height()
    }

    fn tile_index(&self, pos: GridPos) -> u32 {
        pos.y as u32 * self.width() + pos.x as u32
    }
}

/// Uniform map used by tests and by servers started without map data.
#[derive(Debug, Clone)]
pub struct FlatMap {
    width: u32,
    height: u32,
    tile: u32,
    blocked: BTreeSet<GridPos>,
}

impl FlatMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile: 1,
            blocked: BTreeSet::new(),
        }
    }

    pub fn with_tile(mut self, tile: u32) -> Self {
        self.tile = tile;
        self
    }

    pub fn block(&mut self, pos: GridPos) {
        self.blocked.insert(pos);
    }
}

impl MapData for FlatMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn tile(&self, pos: GridPos) -> u32 {
        if !self.in_bounds(pos) {
            return 0;
        }
        // Blocked tiles get a distinct id so collision shows up in region data.
        if self.blocked.contains(&pos) {
            self.tile + 1
        } else {
            self.tile
        }
    }

    fn is_colliding(&self, pos: GridPos) -> bool {
        !self.in_bounds(pos) || self.blocked.contains(&pos)
    }
}
