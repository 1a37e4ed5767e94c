use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use space::{GridPos, MapData, TileWire};

use crate::error::PersistenceError;

pub const CACHE_VERSION: u32 = 1;

/// Region tile blocks keyed by the map they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRegions {
    pub version: u32,
    pub checksum: String,
    pub division_size: u32,
    pub regions: Vec<Vec<TileWire>>,
}

/// SHA-1 hex digest over the map's dimensions, tile ids and collision.
pub fn map_checksum(map: &dyn MapData) -> String {
    let mut hasher = Sha1::new();
    hasher.update(map.width().to_le_bytes());
    hasher.update(map.height().to_le_bytes());
    for y in 0..map.height() as i32 {
        for x in 0..map.width() as i32 {
            let pos = GridPos::new(x, y);
            hasher.update(map.tile(pos).to_le_bytes());
            hasher.update([map.is_colliding(pos) as u8]);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// On-disk cache of per-region static tile data.
pub struct RegionCache {
    dir: PathBuf,
}

impl RegionCache {
    const FILE: &'static str = "regions.bin";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(Self::FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Load the cached regions if they were built from a map with `checksum`.
    /// A missing file is `Ok(None)`; a stale one is an error the caller
    /// answers by regenerating.
    pub fn load(&self, checksum: &str, division_size: u32) -> Result<Option<Vec<Vec<TileWire>>>, PersistenceError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let cached = self.load_from_path(&path)?;
        if cached.version != CACHE_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: CACHE_VERSION,
                got: cached.version,
            });
        }
        if cached.checksum != checksum || cached.division_size != division_size {
            return Err(PersistenceError::ChecksumMismatch {
                cached: cached.checksum,
                current: checksum.to_string(),
            });
        }
        tracing::info!(
            regions = cached.regions.len(),
            path = %path.display(),
            "region cache loaded"
        );
        Ok(Some(cached.regions))
    }

    fn load_from_path(&self, path: &Path) -> Result<CachedRegions, PersistenceError> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Write the cache, temp file first and then rename.
    pub fn store(
        &self,
        checksum: &str,
        division_size: u32,
        regions: Vec<Vec<TileWire>>,
    ) -> Result<PathBuf, PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let cached = CachedRegions {
            version: CACHE_VERSION,
            checksum: checksum.to_string(),
            division_size,
            regions,
        };
        let bytes = bincode::serialize(&cached)?;

        let path = self.path();
        let tmp_path = self.dir.join(format!("{}.tmp", Self::FILE));
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &path)?;

        tracing::info!(
            regions = cached.regions.len(),
            bytes = bytes.len(),
            path = %path.display(),
            "region cache saved"
        );
        Ok(path)
    }
}
