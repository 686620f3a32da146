//! Coordinate-keyed storage of downloaded mod files.
//!
//! Entries are keyed by (game, source, mod, version), not by content hash.
//! The deployer links out of the cache and never deletes from it.

pub mod archive;
pub mod disk;
pub mod download;

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::ModKey;

pub use archive::{extract_zip, extract_zip_reader};
pub use disk::DiskCache;
pub use download::download_to_cache;

/// Cache coordinates of one mod version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModCoords {
    pub game_id: String,
    pub source_id: String,
    pub mod_id: String,
    /// Empty means "latest".
    pub version: String,
}

impl ModCoords {
    pub fn new(
        game_id: impl Into<String>,
        source_id: impl Into<String>,
        mod_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            source_id: source_id.into(),
            mod_id: mod_id.into(),
            version: version.into(),
        }
    }

    pub fn for_key(game_id: impl Into<String>, key: &ModKey, version: impl Into<String>) -> Self {
        Self::new(game_id, key.source_id.clone(), key.mod_id.clone(), version)
    }
}

impl fmt::Display for ModCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = if self.version.is_empty() {
            "latest"
        } else {
            &self.version
        };
        write!(
            f,
            "{}/{}:{}@{}",
            self.game_id, self.source_id, self.mod_id, version
        )
    }
}

pub trait CacheStore: Send + Sync {
    /// Directory holding the files of one mod version.
    fn mod_path(&self, coords: &ModCoords) -> PathBuf;

    fn exists(&self, coords: &ModCoords) -> bool;

    /// Write `contents` to `relative` inside the entry, returning the full path.
    fn store(
        &self,
        coords: &ModCoords,
        relative: &Path,
        contents: &mut dyn Read,
    ) -> Result<PathBuf>;

    /// Every file in the entry, relative to [`CacheStore::mod_path`], sorted.
    fn list_files(&self, coords: &ModCoords) -> Result<Vec<PathBuf>>;

    fn delete(&self, coords: &ModCoords) -> Result<()>;

    /// Total size in bytes of the entry.
    fn size(&self, coords: &ModCoords) -> Result<u64>;

    fn get_file_path(&self, coords: &ModCoords, relative: &Path) -> Result<PathBuf>;
}
