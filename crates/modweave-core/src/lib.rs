//! Modweave Core Library
//!
//! Resolves mod dependency closures across hosting backends, deploys cached
//! mod files into a game's directory tree, and reconciles installed mods
//! against newer or superseded remote versions.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod resolve;
pub mod source;
pub mod types;
pub mod update;
pub mod version;

pub use error::{ModError, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Domain
    pub use crate::types::{
        DeployMode, DownloadableFile, InstalledMod, Mod, ModFiles, ModKey, ModReference, Update,
    };

    // Errors
    pub use crate::error::{ItemFailure, ModError, PartialFailure, Result};

    // Configuration
    pub use crate::config::{
        ConflictPolicy, EngineSettings, Game, GameHooks, HookOperation, HookStage, Profile,
        ProfileHooks, StateStore,
    };

    // Sources
    pub use crate::source::{ModSource, SearchQuery, SourceRegistry};

    // Cache
    pub use crate::cache::{CacheStore, DiskCache, ModCoords};

    // Engine
    pub use crate::cancel::CancellationToken;
    pub use crate::deploy::{DeployReport, Deployer, HookRunner, ScriptHookRunner};
    pub use crate::fs::LinkMethod;
    pub use crate::resolve::{DependencyResolver, Resolution, ResolvedMod};
    pub use crate::update::{UpdateReconciler, UpdateScan};
}
