use crate::region_manager::RegionKey;

#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("map {width}x{height} is not divisible into regions of {division_size}")]
    IndivisibleMap {
        width: u32,
        height: u32,
        division_size: u32,
    },

    #[error("position ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },

    #[error("region {0} does not exist")]
    UnknownRegion(RegionKey),

    #[error("map is {got:?}, regions were built for {expected:?}")]
    MapMismatch {
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("region tile data has {got} regions, expected {expected}")]
    TileCountMismatch { expected: usize, got: usize },
}
