//! Profiles: ordered mod lists belonging to one game.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::game::Game;
use crate::config::hooks::ProfileHooks;
use crate::error::{ModError, NotFoundKind, Result};
use crate::fs::LinkMethod;
use crate::types::{ModKey, ModReference};

/// A named mod list. Index order is priority; the first entry is lowest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub game_id: String,
    #[serde(default)]
    pub mods: Vec<ModReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_method: Option<LinkMethod>,
    #[serde(default)]
    pub hooks: ProfileHooks,
}

impl Profile {
    pub fn new(name: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            game_id: game_id.into(),
            ..Self::default()
        }
    }

    pub fn effective_link_method(&self, game: &Game) -> LinkMethod {
        self.link_method.unwrap_or(game.link_method)
    }

    pub fn position(&self, key: &ModKey) -> Option<usize> {
        self.mods
            .iter()
            .position(|m| m.source_id == key.source_id && m.mod_id == key.mod_id)
    }

    pub fn find(&self, key: &ModKey) -> Option<&ModReference> {
        self.position(key).map(|i| &self.mods[i])
    }

    pub fn contains(&self, key: &ModKey) -> bool {
        self.position(key).is_some()
    }

    /// Append a mod at the highest priority. Rejects ModKey collisions.
    pub fn add_mod(&mut self, reference: ModReference) -> Result<()> {
        let key = reference.key();
        if self.contains(&key) {
            return Err(ModError::InvalidConfig(format!(
                "mod {} is already in profile '{}'",
                key, self.name
            )));
        }
        self.mods.push(reference);
        Ok(())
    }

    pub fn remove_mod(&mut self, key: &ModKey) -> Option<ModReference> {
        self.position(key).map(|i| self.mods.remove(i))
    }

    pub fn set_file_ids(&mut self, key: &ModKey, file_ids: Vec<String>) -> Result<()> {
        let index = self.require(key)?;
        self.mods[index].file_ids = file_ids;
        Ok(())
    }

    pub fn set_version(&mut self, key: &ModKey, version: impl Into<String>) -> Result<()> {
        let index = self.require(key)?;
        self.mods[index].version = version.into();
        Ok(())
    }

    /// Move a mod to `index`, clamped to the end of the list.
    pub fn move_mod(&mut self, key: &ModKey, index: usize) -> Result<()> {
        let from = self.require(key)?;
        let entry = self.mods.remove(from);
        let to = index.min(self.mods.len());
        self.mods.insert(to, entry);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for reference in &self.mods {
            let key = reference.key();
            if !seen.insert(key.clone()) {
                return Err(ModError::InvalidConfig(format!(
                    "duplicate mod {} in profile '{}'",
                    key, self.name
                )));
            }
        }
        Ok(())
    }

    fn require(&self, key: &ModKey) -> Result<usize> {
        self.position(key)
            .ok_or_else(|| ModError::not_found(NotFoundKind::Mod, key.to_string()))
    }
}
