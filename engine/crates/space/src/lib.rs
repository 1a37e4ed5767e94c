pub mod area;
pub mod error;
pub mod map;
pub mod region;
pub mod region_manager;
pub mod spatial_grid;

pub use area::{Area, AreaKind, Areas, MappedArea, Requirement, Shape};
pub use error::SpaceError;
pub use map::{FlatMap, MapData, TileWire};
pub use region::{Light, Region};
pub use region_manager::{Locatable, RegionData, RegionKey, RegionManager, RegionView};
pub use spatial_grid::{GridPos, SpatialGrid};
