//! Dependency resolution: profile entries to a full, ordered install closure.
//!
//! Resolution runs in two passes. The first expands the closure by asking
//! each mod's source for its required dependencies, fetching every ModKey
//! once and merging requested versions. The second linearizes the in-memory
//! graph (see [`DependencyGraph::install_order`]), so the install order does
//! not depend on fetch order or backend latency.

pub mod graph;

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::config::{Game, Profile};
use crate::error::{ItemFailure, ModError, PartialFailure, Result};
use crate::source::SourceRegistry;
use crate::types::{Mod, ModKey, ModReference};
use crate::version::higher_version;

pub use graph::DependencyGraph;

/// One mod in the install order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMod {
    /// Reference with the version that won resolution.
    pub reference: ModReference,
    /// `None` when the metadata lookup failed.
    pub metadata: Option<Mod>,
    /// True for profile entries, false for discovered dependencies.
    pub explicit: bool,
    /// Mods that require this one, sorted.
    pub required_by: Vec<ModKey>,
}

impl ResolvedMod {
    pub fn key(&self) -> ModKey {
        self.reference.key()
    }

    pub fn version(&self) -> &str {
        &self.reference.version
    }

    pub fn name(&self) -> String {
        self.metadata
            .as_ref()
            .map(Mod::label)
            .unwrap_or_else(|| self.key().to_string())
    }
}

/// Result of a resolve: the (possibly partial) install order plus every
/// lookup that failed along the way.
#[derive(Debug, Default)]
pub struct Resolution {
    pub order: Vec<ResolvedMod>,
    pub failures: PartialFailure,
}

impl Resolution {
    pub fn keys(&self) -> Vec<ModKey> {
        self.order.iter().map(ResolvedMod::key).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn get(&self, key: &ModKey) -> Option<&ResolvedMod> {
        self.order.iter().find(|m| &m.key() == key)
    }

    /// Split into the order and the joined error, if any lookup failed.
    pub fn into_parts(self) -> (Vec<ResolvedMod>, Option<ModError>) {
        (self.order, self.failures.into_error())
    }
}

#[derive(Debug)]
struct Request {
    reference: ModReference,
    explicit: bool,
    required_by: Vec<ModKey>,
}

#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'a> {
    sources: &'a SourceRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(sources: &'a SourceRegistry) -> Self {
        Self { sources }
    }

    /// Resolve a profile's mod list for `game`.
    pub async fn resolve(&self, game: &Game, profile: &Profile) -> Result<Resolution> {
        profile.validate()?;
        self.resolve_references(game, &profile.mods).await
    }

    /// Resolve explicit entries into their required-dependency closure.
    ///
    /// A dependency cycle fails the whole call. Failed metadata lookups do
    /// not: the affected mod stays in the order as a leaf and the failure is
    /// recorded in [`Resolution::failures`].
    pub async fn resolve_references(
        &self,
        game: &Game,
        entries: &[ModReference],
    ) -> Result<Resolution> {
        let mut graph = DependencyGraph::new();
        let mut requests: BTreeMap<ModKey, Request> = BTreeMap::new();
        let mut metadata: BTreeMap<ModKey, Mod> = BTreeMap::new();
        let mut failures = PartialFailure::default();
        let mut expanded: HashSet<ModKey> = HashSet::new();
        let mut queue: VecDeque<ModKey> = VecDeque::new();

        for entry in entries {
            let key = entry.key();
            if requests.contains_key(&key) {
                return Err(ModError::InvalidConfig(format!("duplicate mod {key} in profile")));
            }
            graph.add_root(key.clone());
            requests.insert(
                key.clone(),
                Request {
                    reference: entry.clone(),
                    explicit: true,
                    required_by: Vec::new(),
                },
            );
            queue.push_back(key);
        }

        while let Some(key) = queue.pop_front() {
            if !expanded.insert(key.clone()) {
                continue;
            }

            let (m, deps) = match self.fetch(game, &key).await {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(%key, error = %err, "dependency lookup failed");
                    failures.push(ItemFailure::new(key.clone(), key.to_string(), err));
                    continue;
                }
            };
            tracing::debug!(%key, dependencies = deps.len(), "expanded mod");

            for dep in deps {
                let dep_key = dep.key();
                graph.add_edge(key.clone(), dep_key.clone());
                match requests.get_mut(&dep_key) {
                    Some(existing) => {
                        if !existing.explicit {
                            let current = &existing.reference.version;
                            let version = higher_version(current, &dep.version).to_string();
                            existing.reference.version = version;
                        }
                        if !existing.required_by.contains(&key) {
                            existing.required_by.push(key.clone());
                        }
                    }
                    None => {
                        requests.insert(
                            dep_key.clone(),
                            Request {
                                reference: ModReference::new(
                                    dep.source_id.clone(),
                                    dep.mod_id.clone(),
                                    dep.version.clone(),
                                ),
                                explicit: false,
                                required_by: vec![key.clone()],
                            },
                        );
                        queue.push_back(dep_key);
                    }
                }
            }
            metadata.insert(key, m);
        }

        let keys = graph.install_order()?;
        let mut order = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(request) = requests.remove(&key) else {
                continue;
            };
            let mut required_by = request.required_by;
            required_by.sort();
            order.push(ResolvedMod {
                metadata: metadata.remove(&key),
                reference: request.reference,
                explicit: request.explicit,
                required_by,
            });
        }

        tracing::info!(
            mods = order.len(),
            failed = failures.len(),
            "resolved install order"
        );
        Ok(Resolution { order, failures })
    }

    async fn fetch(&self, game: &Game, key: &ModKey) -> Result<(Mod, Vec<ModReference>)> {
        let source = self.sources.get(&key.source_id)?;
        let game_id = game.source_game_id(&key.source_id);
        let m = source.get_mod(game_id, &key.mod_id).await?;
        let deps = source.get_dependencies(&m).await?;
        Ok((m, deps))
    }
}
