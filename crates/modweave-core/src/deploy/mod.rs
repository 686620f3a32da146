//! Deploying cached mods into a game directory.

pub mod deployer;
pub mod hooks;
pub mod plan;

pub use deployer::{DeployReport, Deployer};
pub use hooks::{HookContext, HookRunner, ScriptHookRunner};
pub use plan::{DeployPlan, ModPlan, PlannedFile, ShadowedPath, Takeover, plan_deploy};
