//! Game records as consumed by the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::hooks::GameHooks;
use crate::error::{ModError, Result};
use crate::fs::LinkMethod;
use crate::types::DeployMode;

/// A moddable game. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub install_path: PathBuf,
    /// Directory mods are deployed into. Relative paths are resolved
    /// against `install_path`.
    pub mod_path: PathBuf,
    /// Source id to the backend's own id for this game.
    #[serde(default)]
    pub source_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub link_method: LinkMethod,
    #[serde(default)]
    pub deploy_mode: DeployMode,
    #[serde(default)]
    pub hooks: GameHooks,
}

impl Game {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        install_path: impl Into<PathBuf>,
        mod_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            install_path: install_path.into(),
            mod_path: mod_path.into(),
            source_ids: BTreeMap::new(),
            link_method: LinkMethod::default(),
            deploy_mode: DeployMode::default(),
            hooks: GameHooks::default(),
        }
    }

    pub fn with_source_id(
        mut self,
        source_id: impl Into<String>,
        game_id: impl Into<String>,
    ) -> Self {
        self.source_ids.insert(source_id.into(), game_id.into());
        self
    }

    /// Absolute directory mods are deployed into.
    pub fn mod_dir(&self) -> PathBuf {
        if self.mod_path.is_absolute() {
            self.mod_path.clone()
        } else {
            self.install_path.join(&self.mod_path)
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_path
    }

    /// The id `source_id` uses for this game. Falls back to the game's own id.
    pub fn source_game_id(&self, source_id: &str) -> &str {
        self.source_ids
            .get(source_id)
            .map(String::as_str)
            .unwrap_or(&self.id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ModError::InvalidConfig("game id must not be empty".to_string()));
        }
        if self.mod_path.as_os_str().is_empty() {
            return Err(ModError::InvalidConfig(format!(
                "game '{}' has no mod path",
                self.id
            )));
        }
        Ok(())
    }
}
