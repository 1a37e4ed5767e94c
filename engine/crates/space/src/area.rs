use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::spatial_grid::GridPos;

/// Content-authored zone type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Pvp,
    Overlay,
    Camera,
    Music,
    Minigame,
    ChestSpawn,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Polygon { points: Vec<GridPos> },
}

impl Shape {
    pub fn contains(&self, pos: GridPos) -> bool {
        match self {
            Shape::Rect {
                x,
                y,
                width,
                height,
            } => {
                pos.x >= *x
                    && pos.y >= *y
                    && pos.x < x + *width as i32
                    && pos.y < y + *height as i32
            }
            Shape::Polygon { points } => polygon_contains(points, pos),
        }
    }

    /// Inclusive bounding box `(min, max)`.
    pub fn bounds(&self) -> (GridPos, GridPos) {
        match self {
            Shape::Rect {
                x,
                y,
                width,
                height,
            } => (
                GridPos::new(*x, *y),
                GridPos::new(x + (*width as i32).max(1) - 1, y + (*height as i32).max(1) - 1),
            ),
            Shape::Polygon { points } => {
                let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
                let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
                let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
                let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
                (GridPos::new(min_x, min_y), GridPos::new(max_x, max_y))
            }
        }
    }
}

/// Even-odd ray cast against the tile centre.
fn polygon_contains(points: &[GridPos], pos: GridPos) -> bool {
    if points.len() < 3 {
        return false;
    }
    let px = pos.x as f64 + 0.5;
    let py = pos.y as f64 + 0.5;
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = (points[i].x as f64, points[i].y as f64);
        let (xj, yj) = (points[j].x as f64, points[j].y as f64);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Per-observer gate on a dynamic area's alternate tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "snake_case")]
pub enum Requirement {
    Quest(String),
    Achievement(String),
}

impl Requirement {
    pub fn is_met(&self, quests: &BTreeSet<String>, achievements: &BTreeSet<String>) -> bool {
        match self {
            Requirement::Quest(key) => quests.contains(key),
            Requirement::Achievement(key) => achievements.contains(key),
        }
    }
}

/// Top-left corner of the alternate tile block a dynamic area swaps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedArea {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: u32,
    pub kind: AreaKind,
    #[serde(flatten)]
    pub shape: Shape,
    /// Minigame name for `AreaKind::Minigame` areas.
    #[serde(default)]
    pub minigame: Option<String>,
    #[serde(default)]
    pub mapped: Option<MappedArea>,
    #[serde(default)]
    pub requirement: Option<Requirement>,
}

impl Area {
    pub fn contains(&self, pos: GridPos) -> bool {
        self.shape.contains(pos)
    }

    /// Where the alternate tile for `pos` lives, if this area is mapped.
    pub fn mapped_position(&self, pos: GridPos) -> Option<GridPos> {
        let mapped = self.mapped?;
        let (min, _) = self.shape.bounds();
        Some(GridPos::new(mapped.x + (pos.x - min.x), mapped.y + (pos.y - min.y)))
    }
}

/// All areas of the loaded map.
#[derive(Debug, Clone, Default)]
pub struct Areas {
    areas: Vec<Area>,
}

impl Areas {
    pub fn new(areas: Vec<Area>) -> Self {
        Self { areas }
    }

    pub fn add(&mut self, area: Area) {
        self.areas.push(area);
    }

    pub fn get(&self, id: u32) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == id)
    }

    pub fn at(&self, pos: GridPos) -> impl Iterator<Item = &Area> {
        self.areas.iter().filter(move |a| a.contains(pos))
    }

    pub fn in_kind(&self, pos: GridPos, kind: AreaKind) -> bool {
        self.at(pos).any(|a| a.kind == kind)
    }

    pub fn minigame_at(&self, pos: GridPos) -> Option<&str> {
        self.at(pos)
            .filter(|a| a.kind == AreaKind::Minigame)
            .find_map(|a| a.minigame.as_deref())
    }

    pub fn of_kind(&self, kind: AreaKind) -> impl Iterator<Item = &Area> {
        self.areas.iter().filter(move |a| a.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}
