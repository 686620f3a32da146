#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use modweave_core::cache::{CacheStore, DiskCache, ModCoords};
use modweave_core::config::{Game, HookStage};
use modweave_core::deploy::{HookContext, HookRunner};
use modweave_core::error::{ModError, NotFoundKind, Result};
use modweave_core::source::{ModSource, SearchQuery};
use modweave_core::types::{DownloadableFile, InstalledMod, Mod, ModFiles, ModReference};

pub const GAME_ID: &str = "skyrim";

/// In-memory backend with scripted failures.
#[derive(Default)]
pub struct FakeSource {
    id: String,
    mods: HashMap<String, Mod>,
    deps: HashMap<String, Vec<ModReference>>,
    files: HashMap<String, ModFiles>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_mod(mut self, mod_id: &str, version: &str) -> Self {
        self.mods.insert(mod_id.to_string(), remote_mod(&self.id, mod_id, version));
        self
    }

    /// `mod_id` requires each of `deps` (latest).
    pub fn with_deps(mut self, mod_id: &str, deps: &[&str]) -> Self {
        let refs = deps
            .iter()
            .map(|dep| ModReference::new(self.id.clone(), *dep, ""))
            .collect();
        self.deps.insert(mod_id.to_string(), refs);
        self
    }

    pub fn with_versioned_dep(mut self, mod_id: &str, dep: &str, version: &str) -> Self {
        let source = self.id.clone();
        self.deps
            .entry(mod_id.to_string())
            .or_default()
            .push(ModReference::new(source, dep, version));
        self
    }

    pub fn with_files(mut self, mod_id: &str, files: ModFiles) -> Self {
        self.files.insert(mod_id.to_string(), files);
        self
    }

    pub fn failing(mut self, mod_id: &str) -> Self {
        self.failing.insert(mod_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock should not be poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .expect("calls lock should not be poisoned")
            .push(call);
    }
}

#[async_trait]
impl ModSource for FakeSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Fake"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Mod>> {
        let mut found: Vec<Mod> = self
            .mods
            .values()
            .filter(|m| query.text.is_empty() || m.name.contains(&query.text))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn get_mod(&self, game_id: &str, mod_id: &str) -> Result<Mod> {
        self.record(format!("get_mod {game_id} {mod_id}"));
        if self.failing.contains(mod_id) {
            return Err(ModError::Backend {
                source_id: self.id.clone(),
                message: "HTTP 503".to_string(),
            });
        }
        self.mods
            .get(mod_id)
            .cloned()
            .ok_or_else(|| ModError::not_found(NotFoundKind::Mod, mod_id))
    }

    async fn get_dependencies(&self, m: &Mod) -> Result<Vec<ModReference>> {
        Ok(self.deps.get(&m.id).cloned().unwrap_or_default())
    }

    async fn get_mod_files(&self, m: &Mod) -> Result<ModFiles> {
        self.record(format!("get_mod_files {}", m.id));
        Ok(self.files.get(&m.id).cloned().unwrap_or_default())
    }

    async fn get_download_url(&self, m: &Mod, file_id: &str) -> Result<String> {
        Ok(format!("https://example.invalid/{}/{}", m.id, file_id))
    }
}

pub fn remote_mod(source_id: &str, mod_id: &str, version: &str) -> Mod {
    Mod {
        id: mod_id.to_string(),
        source_id: source_id.to_string(),
        name: format!("Mod {}", mod_id.to_uppercase()),
        version: version.to_string(),
        game_id: GAME_ID.to_string(),
        ..Mod::default()
    }
}

pub fn installed(source_id: &str, mod_id: &str, version: &str) -> InstalledMod {
    InstalledMod::new(remote_mod(source_id, mod_id, version), "default", version)
}

pub fn file(id: &str, version: &str) -> DownloadableFile {
    DownloadableFile {
        id: id.to_string(),
        name: format!("File {id}"),
        file_name: format!("{id}.zip"),
        version: version.to_string(),
        ..DownloadableFile::default()
    }
}

/// Game under `root/game` with mods deployed into `Data`.
pub fn game(root: &Path) -> Game {
    Game::new(GAME_ID, "Skyrim", root.join("game"), "Data")
}

pub fn cache(root: &Path) -> DiskCache {
    DiskCache::new(root.join("cache"))
}

/// Store `files` (relative path, contents) as the cached version of a mod.
pub fn seed_cache(cache: &DiskCache, mod_id: &str, version: &str, files: &[(&str, &str)]) {
    let coords = ModCoords::new(GAME_ID, "nexus", mod_id, version);
    for (relative, contents) in files {
        cache
            .store(&coords, Path::new(relative), &mut contents.as_bytes())
            .expect("cache store should succeed in test temp dirs");
    }
}

/// Every file and link under `dir`, relative and sorted.
pub fn list_tree(dir: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, prefix: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let entry = entry.expect("read_dir entry should succeed");
            let relative = prefix.join(entry.file_name());
            let ty = entry.file_type().expect("file_type should succeed");
            if ty.is_dir() {
                walk(&entry.path(), &relative, out);
            } else {
                out.push(relative);
            }
        }
    }

    let mut out = Vec::new();
    walk(dir, Path::new(""), &mut out);
    out.sort();
    out
}

/// Hook runner that records every invocation instead of spawning scripts.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    fail: Option<(HookStage, String)>,
}

impl RecordingRunner {
    /// Fail `stage`; for per-mod stages only when it runs for `mod_id`.
    pub fn failing_at(stage: HookStage, mod_id: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: Some((stage, mod_id.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock should not be poisoned").clone()
    }
}

impl HookRunner for RecordingRunner {
    fn run(&self, script: &str, ctx: &HookContext<'_>) -> anyhow::Result<()> {
        let target = ctx
            .target
            .map(|m| m.metadata.id.clone())
            .unwrap_or_else(|| "-".to_string());
        self.calls
            .lock()
            .expect("calls lock should not be poisoned")
            .push(format!("{} {} {}", ctx.stage.as_str(), target, script));

        if let Some((stage, mod_id)) = &self.fail
            && *stage == ctx.stage
            && (ctx.target.is_none() || *mod_id == target)
        {
            anyhow::bail!("scripted failure");
        }
        Ok(())
    }
}
