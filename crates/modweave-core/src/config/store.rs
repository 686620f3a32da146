//! Serialized read-modify-write access to game and profile records.
//!
//! File formats live behind [`Repository`]; the engine only ever sees plain
//! structs. Every mutation goes through [`StateStore`], which holds one lock
//! across load, modify, and save so concurrent callers in the same process
//! cannot interleave.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::config::{Game, Profile};
use crate::error::{ModError, NotFoundKind, Result};
use crate::types::InstalledMod;

/// Persistence seam for games, profiles, and installed mod state.
pub trait Repository: Send + Sync {
    fn load_game(&self, game_id: &str) -> Result<Game>;
    fn save_game(&self, game: &Game) -> Result<()>;
    fn load_profile(&self, game_id: &str, name: &str) -> Result<Profile>;
    fn save_profile(&self, profile: &Profile) -> Result<()>;
    /// Installed mods of a profile. Unknown profiles yield an empty list.
    fn load_installed(&self, game_id: &str, profile: &str) -> Result<Vec<InstalledMod>>;
    fn save_installed(&self, game_id: &str, profile: &str, mods: &[InstalledMod]) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    games: HashMap<String, Game>,
    profiles: HashMap<(String, String), Profile>,
    installed: HashMap<(String, String), Vec<InstalledMod>>,
}

/// In-process repository, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| ModError::Other(anyhow::anyhow!("memory repository lock poisoned")))
    }
}

impl Repository for MemoryRepository {
    fn load_game(&self, game_id: &str) -> Result<Game> {
        self.state()?
            .games
            .get(game_id)
            .cloned()
            .ok_or_else(|| ModError::not_found(NotFoundKind::Game, game_id))
    }

    fn save_game(&self, game: &Game) -> Result<()> {
        self.state()?.games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    fn load_profile(&self, game_id: &str, name: &str) -> Result<Profile> {
        self.state()?
            .profiles
            .get(&(game_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ModError::not_found(NotFoundKind::Profile, format!("{game_id}/{name}")))
    }

    fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.state()?.profiles.insert(
            (profile.game_id.clone(), profile.name.clone()),
            profile.clone(),
        );
        Ok(())
    }

    fn load_installed(&self, game_id: &str, profile: &str) -> Result<Vec<InstalledMod>> {
        Ok(self
            .state()?
            .installed
            .get(&(game_id.to_string(), profile.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn save_installed(&self, game_id: &str, profile: &str, mods: &[InstalledMod]) -> Result<()> {
        self.state()?
            .installed
            .insert((game_id.to_string(), profile.to_string()), mods.to_vec());
        Ok(())
    }
}

#[derive(Debug)]
pub struct StateStore<R> {
    repo: R,
    write_lock: Mutex<()>,
}

impl<R: Repository> StateStore<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn game(&self, game_id: &str) -> Result<Game> {
        self.repo.load_game(game_id)
    }

    pub fn profile(&self, game_id: &str, name: &str) -> Result<Profile> {
        self.repo.load_profile(game_id, name)
    }

    pub fn installed(&self, game_id: &str, profile: &str) -> Result<Vec<InstalledMod>> {
        self.repo.load_installed(game_id, profile)
    }

    /// Load, mutate, and save a game under the store lock. Nothing is saved
    /// when `f` fails.
    pub fn update_game<T>(
        &self,
        game_id: &str,
        f: impl FnOnce(&mut Game) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock()?;
        let mut game = self.repo.load_game(game_id)?;
        let out = f(&mut game)?;
        game.validate()?;
        self.repo.save_game(&game)?;
        Ok(out)
    }

    pub fn update_profile<T>(
        &self,
        game_id: &str,
        name: &str,
        f: impl FnOnce(&mut Profile) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock()?;
        let mut profile = self.repo.load_profile(game_id, name)?;
        let out = f(&mut profile)?;
        profile.validate()?;
        self.repo.save_profile(&profile)?;
        Ok(out)
    }

    pub fn update_installed<T>(
        &self,
        game_id: &str,
        profile: &str,
        f: impl FnOnce(&mut Vec<InstalledMod>) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock()?;
        let mut mods = self.repo.load_installed(game_id, profile)?;
        let out = f(&mut mods)?;
        self.repo.save_installed(game_id, profile, &mods)?;
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ModError::Other(anyhow::anyhow!("state store lock poisoned")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModReference;
    use std::sync::Arc;

    fn seeded_store() -> StateStore<MemoryRepository> {
        let repo = MemoryRepository::new();
        repo.save_game(&Game::new("skyrim", "Skyrim", "/g", "Data"))
            .expect("save_game should succeed");
        repo.save_profile(&Profile::new("default", "skyrim"))
            .expect("save_profile should succeed");
        StateStore::new(repo)
    }

    #[test]
    fn update_profile_persists_changes() {
        let store = seeded_store();
        store
            .update_profile("skyrim", "default", |profile| {
                profile.add_mod(ModReference::new("nexus", "1", ""))
            })
            .expect("update should succeed");

        let profile = store.profile("skyrim", "default").expect("profile exists");
        assert_eq!(profile.mods.len(), 1);
    }

    #[test]
    fn failed_update_saves_nothing() {
        let store = seeded_store();
        let result: Result<()> = store.update_profile("skyrim", "default", |profile| {
            profile.mods.push(ModReference::new("nexus", "1", ""));
            Err(ModError::InvalidConfig("nope".to_string()))
        });
        assert!(result.is_err());

        let profile = store.profile("skyrim", "default").expect("profile exists");
        assert!(profile.mods.is_empty());
    }

    #[test]
    fn duplicate_keys_are_rejected_on_save() {
        let store = seeded_store();
        let result = store.update_profile("skyrim", "default", |profile| {
            profile.mods.push(ModReference::new("nexus", "1", ""));
            profile.mods.push(ModReference::new("nexus", "1", "2.0"));
            Ok(())
        });
        assert!(matches!(result, Err(ModError::InvalidConfig(_))));
    }

    #[test]
    fn missing_profile_is_not_found() {
        let store = seeded_store();
        let err = store.profile("skyrim", "nope").unwrap_err();
        assert!(matches!(
            err,
            ModError::NotFound {
                kind: NotFoundKind::Profile,
                ..
            }
        ));
    }

    #[test]
    fn concurrent_updates_do_not_lose_writes() {
        let store = Arc::new(seeded_store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .update_profile("skyrim", "default", |profile| {
                            profile.add_mod(ModReference::new("nexus", i.to_string(), ""))
                        })
                        .expect("update should succeed");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should finish");
        }

        let profile = store.profile("skyrim", "default").expect("profile exists");
        assert_eq!(profile.mods.len(), 8);
    }
}
