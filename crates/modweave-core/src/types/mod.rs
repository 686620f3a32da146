//! Shared domain types for mods, installed state, and updates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs::LinkMethod;

/// Identity of a mod regardless of the requested version.
///
/// Unique within a profile. Ordering is lexicographic by source, then mod id,
/// which is what the resolver relies on for tie breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModKey {
    pub source_id: String,
    pub mod_id: String,
}

impl ModKey {
    pub fn new(source_id: impl Into<String>, mod_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            mod_id: mod_id.into(),
        }
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.mod_id)
    }
}

/// How a cached mod is laid out in the game's mod directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// The archive was unpacked into the cache; every file is deployed.
    #[default]
    Extract,
    /// The downloaded archive itself is the deployed artifact.
    Copy,
}

impl DeployMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployMode::Extract => "extract",
            DeployMode::Copy => "copy",
        }
    }
}

/// A profile entry or dependency edge pointing at a mod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModReference {
    pub source_id: String,
    pub mod_id: String,
    /// Empty means "latest".
    #[serde(default)]
    pub version: String,
    /// Backend file ids that were actually installed.
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl ModReference {
    pub fn new(
        source_id: impl Into<String>,
        mod_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            mod_id: mod_id.into(),
            version: version.into(),
            file_ids: Vec::new(),
        }
    }

    pub fn key(&self) -> ModKey {
        ModKey::new(self.source_id.clone(), self.mod_id.clone())
    }

    pub fn is_latest(&self) -> bool {
        self.version.is_empty()
    }
}

/// Remote mod metadata as reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub id: String,
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub summary: String,
    /// Backend-specific game id this mod belongs to.
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Mod {
    pub fn key(&self) -> ModKey {
        ModKey::new(self.source_id.clone(), self.id.clone())
    }

    /// Display label used in reports: the name when known, else the key.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.key().to_string()
        } else {
            self.name.clone()
        }
    }
}

/// A mod installed into a profile, with local deployment state.
///
/// `enabled` is user intent and `deployed` is what is on disk; they are
/// independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    #[serde(rename = "mod")]
    pub metadata: Mod,
    pub profile: String,
    /// Installed version; may differ from the remote version on `metadata`.
    pub version: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub deployed: bool,
    /// Version whose files are currently linked. Empty when not deployed.
    #[serde(default)]
    pub deployed_version: String,
    /// Method used at deploy time; uninstall reverses this, not the game default.
    #[serde(default)]
    pub link_method: LinkMethod,
    /// Paths under the game's mod directory this mod currently owns.
    #[serde(default)]
    pub owned_paths: Vec<PathBuf>,
    /// Paths this mod provides but another mod won under the override policy.
    #[serde(default)]
    pub shadowed_paths: Vec<PathBuf>,
    pub installed_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl InstalledMod {
    pub fn new(metadata: Mod, profile: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            metadata,
            profile: profile.into(),
            version: version.into(),
            file_ids: Vec::new(),
            enabled: true,
            deployed: false,
            deployed_version: String::new(),
            link_method: LinkMethod::default(),
            owned_paths: Vec::new(),
            shadowed_paths: Vec::new(),
            installed_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ModKey {
        self.metadata.key()
    }

    pub fn name(&self) -> String {
        self.metadata.label()
    }

    pub fn is_pending_deploy(&self) -> bool {
        self.enabled && !self.deployed
    }

    pub fn is_pending_removal(&self) -> bool {
        !self.enabled && self.deployed
    }

    pub fn reference(&self) -> ModReference {
        ModReference {
            source_id: self.metadata.source_id.clone(),
            mod_id: self.metadata.id.clone(),
            version: self.version.clone(),
            file_ids: self.file_ids.clone(),
        }
    }
}

/// A downloadable file published for a mod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadableFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A mod's file list together with the backend's supersession relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModFiles {
    pub files: Vec<DownloadableFile>,
    /// Old file id to the id of the file that replaced it.
    #[serde(default)]
    pub file_updates: BTreeMap<String, String>,
}

impl ModFiles {
    pub fn find(&self, file_id: &str) -> Option<&DownloadableFile> {
        self.files.iter().find(|file| file.id == file_id)
    }

    pub fn primary(&self) -> Option<&DownloadableFile> {
        self.files.iter().find(|file| file.is_primary)
    }
}

/// An available update for an installed mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub key: ModKey,
    pub name: String,
    pub current_version: String,
    pub new_version: String,
    #[serde(default)]
    pub changelog: String,
    /// Superseded file ids, old to new. Populated even when the version is unchanged.
    #[serde(default)]
    pub file_id_replacements: BTreeMap<String, String>,
}

impl Update {
    pub fn is_file_only(&self) -> bool {
        self.current_version == self.new_version && !self.file_id_replacements.is_empty()
    }
}
