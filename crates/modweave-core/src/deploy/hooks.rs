//! Running lifecycle hook scripts.

use std::path::Path;
use std::process::Command;

use anyhow::Context;

use crate::config::{Game, HookOperation, HookStage, ResolvedHooks};
use crate::error::{ModError, Result};
use crate::types::InstalledMod;

/// Everything a hook script is told about the step it runs in.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub operation: HookOperation,
    pub stage: HookStage,
    pub game: &'a Game,
    pub mod_dir: &'a Path,
    /// Set for `before_each`/`after_each`.
    pub target: Option<&'a InstalledMod>,
}

impl HookContext<'_> {
    /// Environment passed to the script.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("MODWEAVE_OPERATION", self.operation.as_str().to_string()),
            ("MODWEAVE_STAGE", self.stage.as_str().to_string()),
            ("MODWEAVE_GAME_ID", self.game.id.clone()),
            (
                "MODWEAVE_GAME_PATH",
                self.game.install_path.to_string_lossy().to_string(),
            ),
            ("MODWEAVE_MOD_PATH", self.mod_dir.to_string_lossy().to_string()),
        ];
        if let Some(target) = self.target {
            env.push(("MODWEAVE_MOD_ID", target.metadata.id.clone()));
            env.push(("MODWEAVE_SOURCE_ID", target.metadata.source_id.clone()));
            env.push(("MODWEAVE_MOD_NAME", target.name()));
            env.push(("MODWEAVE_MOD_VERSION", target.version.clone()));
        }
        env
    }
}

pub trait HookRunner: Send + Sync {
    fn run(&self, script: &str, ctx: &HookContext<'_>) -> anyhow::Result<()>;
}

/// Runs hook scripts as child processes from the game's install directory.
/// A non-zero exit status is a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptHookRunner;

impl HookRunner for ScriptHookRunner {
    fn run(&self, script: &str, ctx: &HookContext<'_>) -> anyhow::Result<()> {
        let mut cmd = Command::new(script);
        if ctx.game.install_path.is_dir() {
            cmd.current_dir(&ctx.game.install_path);
        }
        for (key, value) in ctx.env() {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to run hook script {}", script))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("exited with {} ({})", output.status, stderr.trim());
        }
        Ok(())
    }
}

/// Run the script for `stage`, if one is configured.
pub(crate) fn run_stage(
    runner: &dyn HookRunner,
    hooks: &ResolvedHooks,
    ctx: &HookContext<'_>,
) -> Result<()> {
    let Some(script) = hooks.script(ctx.stage) else {
        return Ok(());
    };

    tracing::debug!(
        operation = ctx.operation.as_str(),
        stage = ctx.stage.as_str(),
        script,
        "running hook"
    );
    runner.run(script, ctx).map_err(|err| ModError::Hook {
        operation: ctx.operation.as_str(),
        stage: ctx.stage.as_str(),
        script: script.to_string(),
        message: format!("{err:#}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mod;

    #[test]
    fn env_includes_target_mod() {
        let game = Game::new("skyrim", "Skyrim", "/games/skyrim", "Data");
        let mod_dir = game.mod_dir();
        let target = InstalledMod::new(
            Mod {
                id: "3863".to_string(),
                source_id: "nexus".to_string(),
                name: "SkyUI".to_string(),
                ..Mod::default()
            },
            "default",
            "5.2",
        );
        let ctx = HookContext {
            operation: HookOperation::Install,
            stage: HookStage::BeforeEach,
            game: &game,
            mod_dir: &mod_dir,
            target: Some(&target),
        };

        let env = ctx.env();
        let get = |key: &str| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("MODWEAVE_STAGE"), Some("before_each"));
        assert_eq!(get("MODWEAVE_MOD_NAME"), Some("SkyUI"));
        assert_eq!(get("MODWEAVE_MOD_PATH"), Some("/games/skyrim/Data"));
    }

    #[cfg(unix)]
    #[test]
    fn script_runner_reports_non_zero_exit() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let script = tmp.path().join("fail.sh");
        std::fs::write(&script, "#!/bin/sh\necho broken >&2\nexit 3\n")
            .expect("write should succeed");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod should succeed");

        let game = Game::new("g", "G", tmp.path(), "mods");
        let mod_dir = game.mod_dir();
        let ctx = HookContext {
            operation: HookOperation::Uninstall,
            stage: HookStage::BeforeAll,
            game: &game,
            mod_dir: &mod_dir,
            target: None,
        };

        let err = ScriptHookRunner
            .run(&script.to_string_lossy(), &ctx)
            .unwrap_err()
            .to_string();
        assert!(err.contains("broken"), "{err}");
    }
}
