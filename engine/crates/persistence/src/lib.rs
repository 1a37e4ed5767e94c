pub mod error;
pub mod region_cache;
pub mod store;

pub use error::PersistenceError;
pub use region_cache::{map_checksum, CachedRegions, RegionCache, CACHE_VERSION};
pub use store::{FileStore, NullStore, PlayerRecord, PlayerStore};
