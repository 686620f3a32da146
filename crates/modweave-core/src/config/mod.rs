//! Game and profile records, hook inheritance, and engine settings.

pub mod game;
pub mod hooks;
pub mod profile;
pub mod settings;
pub mod store;

pub use game::Game;
pub use hooks::{
    GameHooks, HookFlags, HookOperation, HookOverrides, HookSet, HookStage, HooksExplicit,
    ProfileHooks, ResolvedHooks, resolve_hooks,
};
pub use profile::Profile;
pub use settings::{ConflictPolicy, EngineSettings};
pub use store::{MemoryRepository, Repository, StateStore};
