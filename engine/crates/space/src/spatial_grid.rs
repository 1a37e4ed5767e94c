use std::collections::BTreeSet;

use instance::InstanceId;
use serde::{Deserialize, Serialize};

/// 2D integer tile coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance, the tile distance used by combat and aggro.
    pub fn distance(self, other: GridPos) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    pub fn is_adjacent(self, other: GridPos) -> bool {
        self.distance(other) <= 1
    }

    /// Adjacent without both axes differing (no diagonal contact).
    pub fn is_non_diagonal(self, other: GridPos) -> bool {
        self.is_adjacent(other) && !(self.x != other.x && self.y != other.y)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Fixed-size tile grid mapping each cell to the entities standing on it.
///
/// Backing store is a row-major array of per-cell sets, so add/remove/update
/// are O(log n) in the cell population and a radius query is O(R²) in cells.
/// Callers validate coordinates; out-of-bounds requests are ignored.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    width: u32,
    height: u32,
    cells: Vec<BTreeSet<InstanceId>>,
}

impl SpatialGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![BTreeSet::new(); size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn cell_index(&self, pos: GridPos) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn add_entity(&mut self, entity: InstanceId, pos: GridPos) -> bool {
        match self.cell_index(pos) {
            Some(idx) => {
                self.cells[idx].insert(entity);
                true
            }
            None => {
                tracing::debug!(%entity, %pos, "grid add ignored, out of bounds");
                false
            }
        }
    }

    pub fn remove_entity(&mut self, entity: InstanceId, at: GridPos) -> bool {
        match self.cell_index(at) {
            Some(idx) => self.cells[idx].remove(&entity),
            None => false,
        }
    }

    /// Move an entity between cells. No-op when both positions are equal.
    pub fn update_entity(&mut self, entity: InstanceId, old: GridPos, new: GridPos) {
        if old == new {
            return;
        }
        self.remove_entity(entity, old);
        self.add_entity(entity, new);
    }

    pub fn entities_at(&self, pos: GridPos) -> Vec<InstanceId> {
        self.cell_index(pos)
            .map(|idx| self.cells[idx].iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, entity: InstanceId, pos: GridPos) -> bool {
        self.cell_index(pos)
            .map(|idx| self.cells[idx].contains(&entity))
            .unwrap_or(false)
    }

    /// All entities within `radius` (Chebyshev) of `center`, sorted by id.
    pub fn entities_in_radius(&self, center: GridPos, radius: u32) -> Vec<InstanceId> {
        let r = radius as i32;
        let min_x = (center.x - r).max(0);
        let min_y = (center.y - r).max(0);
        let max_x = (center.x + r).min(self.width as i32 - 1);
        let max_y = (center.y + r).min(self.height as i32 - 1);

        let mut result = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if let Some(idx) = self.cell_index(GridPos::new(x, y)) {
                    result.extend(self.cells[idx].iter().copied());
                }
            }
        }
        result.sort();
        result
    }

    pub fn entity_count(&self) -> usize {
        self.cells.iter().map(BTreeSet::len).sum()
    }
}
