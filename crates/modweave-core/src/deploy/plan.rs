//! Batch planning: which mod places which file, decided before any
//! filesystem change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::{CacheStore, ModCoords};
use crate::config::{ConflictPolicy, Game};
use crate::error::{ItemFailure, ModError, NotFoundKind, PartialFailure, Result};
use crate::fs::LinkMethod;
use crate::types::{DeployMode, InstalledMod, ModKey};

/// One file a mod places, relative to the game's mod directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub relative: PathBuf,
    /// Absolute path of the cached file.
    pub source: PathBuf,
}

/// A path a later mod wins from a mod that currently has it on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Takeover {
    pub relative: PathBuf,
    pub previous: ModKey,
    /// Position of the previous owner in the installed-mod slice.
    pub previous_index: usize,
    /// How the previous owner placed it.
    pub method: LinkMethod,
}

#[derive(Debug, Clone)]
pub struct ModPlan {
    /// Position in the installed-mod slice.
    pub index: usize,
    pub key: ModKey,
    pub files: Vec<PlannedFile>,
    /// Paths this mod provides but a later mod owns.
    pub shadowed: Vec<PathBuf>,
    pub takes_over: Vec<Takeover>,
}

impl ModPlan {
    pub fn relative_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|file| file.relative.clone()).collect()
    }
}

/// A path two mods provide, and which one won it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedPath {
    pub path: PathBuf,
    pub owner: ModKey,
    pub shadowed: ModKey,
}

#[derive(Debug, Default)]
pub struct DeployPlan {
    pub mods: Vec<ModPlan>,
    /// Mods whose cached files could not be listed.
    pub failures: PartialFailure,
    pub shadowed: Vec<ShadowedPath>,
    /// Strict-policy conflict that ends the batch after `mods`.
    pub conflict: Option<ModError>,
    /// Positions never planned because of `conflict`.
    pub blocked: Vec<usize>,
}

/// Build the destination map for `selected` (positions into `mods`, in
/// install order).
pub fn plan_deploy(
    cache: &dyn CacheStore,
    game: &Game,
    mods: &[InstalledMod],
    selected: &[usize],
    policy: ConflictPolicy,
) -> DeployPlan {
    let mut plan = DeployPlan::default();
    let mut owners: BTreeMap<PathBuf, usize> = BTreeMap::new();

    for (pos, &index) in selected.iter().enumerate() {
        let installed = &mods[index];
        let key = installed.key();

        let files = match cached_files(cache, game, installed) {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cannot list cached files");
                let failure = ItemFailure::new(key, installed.name(), err);
                plan.failures.push(failure);
                continue;
            }
        };

        let current = plan.mods.len();
        let mut entry = ModPlan {
            index,
            key: key.clone(),
            files: Vec::with_capacity(files.len()),
            shadowed: Vec::new(),
            takes_over: Vec::new(),
        };

        for file in files {
            let Some(&owner) = owners.get(&file.relative) else {
                owners.insert(file.relative.clone(), current);
                entry.files.push(file);
                continue;
            };

            let owner_key = plan.mods[owner].key.clone();
            if policy == ConflictPolicy::Strict {
                plan.conflict = Some(ModError::FileConflict {
                    path: game.mod_dir().join(&file.relative),
                    owner: owner_key,
                    claimant: key,
                });
                plan.blocked = selected[pos..].to_vec();
                return plan;
            }

            tracing::info!(
                path = %file.relative.display(),
                winner = %key,
                shadowed = %owner_key,
                "later mod overrides path"
            );
            let loser = &mut plan.mods[owner];
            loser.files.retain(|f| f.relative != file.relative);
            loser.shadowed.push(file.relative.clone());

            // Whoever currently has the path on disk is evicted by the winner.
            let mut inherited: Vec<Takeover> = Vec::new();
            loser.takes_over.retain(|t| {
                if t.relative == file.relative {
                    inherited.push(t.clone());
                    false
                } else {
                    true
                }
            });
            entry.takes_over.extend(inherited);
            let previous = &mods[loser.index];
            if previous.owned_paths.contains(&file.relative) {
                entry.takes_over.push(Takeover {
                    relative: file.relative.clone(),
                    previous: owner_key.clone(),
                    previous_index: loser.index,
                    method: previous.link_method,
                });
            }

            plan.shadowed.push(ShadowedPath {
                path: file.relative.clone(),
                owner: key.clone(),
                shadowed: owner_key,
            });
            owners.insert(file.relative.clone(), current);
            entry.files.push(file);
        }

        plan.mods.push(entry);
    }

    plan
}

/// Files `installed` would place, from its cache entry.
///
/// In extract mode every cached file keeps its relative path. In copy mode
/// the entry must hold exactly one top-level file, placed at the root of the
/// mod directory.
pub fn cached_files(
    cache: &dyn CacheStore,
    game: &Game,
    installed: &InstalledMod,
) -> Result<Vec<PlannedFile>> {
    let coords = ModCoords::for_key(game.id.clone(), &installed.key(), installed.version.clone());
    let root = cache.mod_path(&coords);
    let listed = cache.list_files(&coords)?;

    let files: Vec<PlannedFile> = match game.deploy_mode {
        DeployMode::Extract => listed
            .into_iter()
            .map(|relative| PlannedFile {
                source: root.join(&relative),
                relative,
            })
            .collect(),
        DeployMode::Copy => {
            let mut top_level: Vec<PathBuf> = listed
                .into_iter()
                .filter(|path| path.parent() == Some(Path::new("")))
                .collect();
            if top_level.len() > 1 {
                return Err(ModError::InvalidConfig(format!(
                    "cache entry {} holds {} archives; copy mode deploys exactly one",
                    coords,
                    top_level.len()
                )));
            }
            top_level
                .pop()
                .map(|relative| PlannedFile {
                    source: root.join(&relative),
                    relative,
                })
                .into_iter()
                .collect()
        }
    };

    if files.is_empty() {
        return Err(ModError::not_found(
            NotFoundKind::File,
            format!("no cached files for {}", coords),
        ));
    }
    Ok(files)
}
