//! Realizing an install order on disk, and removing it again.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::cache::CacheStore;
use crate::config::{
    ConflictPolicy, Game, HookOperation, HookStage, Profile, ResolvedHooks, resolve_hooks,
};
use crate::error::{ItemFailure, LinkFailure, ModError, PartialFailure, Result};
use crate::fs::{LinkMethod, link_file, prune_empty_dirs, unlink_file};
use crate::fs::link::is_symlink_to;
use crate::types::{InstalledMod, ModKey};

use super::hooks::{HookContext, HookRunner, ScriptHookRunner, run_stage};
use super::plan::{ModPlan, ShadowedPath, plan_deploy};

/// Outcome of one deploy, uninstall, or sync batch.
///
/// Deployment is not transactional across mods: everything listed in
/// `changed` is on disk even when `aborted` is set.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Mods whose files were (re)linked.
    pub changed: Vec<ModKey>,
    /// Mods already deployed at the same version, left as they were.
    pub unchanged: Vec<ModKey>,
    /// Mods whose files were removed.
    pub removed: Vec<ModKey>,
    pub shadowed: Vec<ShadowedPath>,
    /// Per-mod failures that did not stop the batch.
    pub failures: PartialFailure,
    /// Non-fatal problems such as `after_*` hook failures.
    pub warnings: Vec<String>,
    /// Fatal condition that stopped the batch.
    pub aborted: Option<ModError>,
    /// Mods the batch never reached because of `aborted`.
    pub not_processed: Vec<ModKey>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failures.is_empty()
    }

    /// The fatal error if the batch aborted, else the joined per-mod
    /// failures, else the report.
    pub fn into_result(self) -> Result<Self> {
        let mut report = self;
        if let Some(err) = report.aborted.take() {
            return Err(err);
        }
        let failures = std::mem::take(&mut report.failures);
        match failures.into_error() {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    fn merge(&mut self, other: DeployReport) {
        self.changed.extend(other.changed);
        self.unchanged.extend(other.unchanged);
        self.removed.extend(other.removed);
        self.shadowed.extend(other.shadowed);
        self.failures.failures.extend(other.failures.failures);
        self.warnings.extend(other.warnings);
        if self.aborted.is_none() {
            self.aborted = other.aborted;
        }
        self.not_processed.extend(other.not_processed);
    }
}

enum ApplyOutcome {
    Changed,
    Unchanged,
}

/// Links cached mod files into a game's mod directory.
///
/// Callers must serialize deploys against the same game; nothing here
/// arbitrates between concurrent batches.
pub struct Deployer<'a> {
    cache: &'a dyn CacheStore,
    policy: ConflictPolicy,
    hooks: &'a dyn HookRunner,
}

static SCRIPT_RUNNER: ScriptHookRunner = ScriptHookRunner;

impl<'a> Deployer<'a> {
    pub fn new(cache: &'a dyn CacheStore) -> Self {
        Self {
            cache,
            policy: ConflictPolicy::default(),
            hooks: &SCRIPT_RUNNER,
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hook_runner(mut self, hooks: &'a dyn HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Deploy every enabled mod in `mods`, which must be in install order.
    ///
    /// Deployment state on each `InstalledMod` is updated in place for the
    /// caller to persist.
    pub fn deploy(
        &self,
        game: &Game,
        profile: Option<&Profile>,
        mods: &mut [InstalledMod],
    ) -> DeployReport {
        let selected: Vec<usize> = (0..mods.len()).filter(|&i| mods[i].enabled).collect();
        self.deploy_selected(game, profile, mods, &selected)
    }

    /// Remove every deployed mod in `mods`, in the given order. The cache is
    /// never touched.
    pub fn uninstall(
        &self,
        game: &Game,
        profile: Option<&Profile>,
        mods: &mut [InstalledMod],
    ) -> DeployReport {
        let selected: Vec<usize> = (0..mods.len()).filter(|&i| mods[i].deployed).collect();
        self.uninstall_selected(game, profile, mods, &selected)
    }

    /// Bring disk state in line with intent: remove deployed-but-disabled
    /// mods, then deploy the enabled ones.
    pub fn sync(
        &self,
        game: &Game,
        profile: Option<&Profile>,
        mods: &mut [InstalledMod],
    ) -> DeployReport {
        let removals: Vec<usize> = (0..mods.len())
            .filter(|&i| mods[i].is_pending_removal())
            .collect();
        let mut report = self.uninstall_selected(game, profile, mods, &removals);

        let enabled: Vec<usize> = (0..mods.len()).filter(|&i| mods[i].enabled).collect();
        if report.aborted.is_some() {
            report
                .not_processed
                .extend(enabled.iter().map(|&i| mods[i].key()));
            return report;
        }

        report.merge(self.deploy_selected(game, profile, mods, &enabled));
        report
    }

    fn deploy_selected(
        &self,
        game: &Game,
        profile: Option<&Profile>,
        mods: &mut [InstalledMod],
        selected: &[usize],
    ) -> DeployReport {
        let mut report = DeployReport::default();
        if selected.is_empty() {
            return report;
        }

        let method = profile
            .map(|p| p.effective_link_method(game))
            .unwrap_or(game.link_method);
        let hooks = resolve_hooks(&game.hooks, profile.map(|p| &p.hooks), HookOperation::Install);
        let mod_dir = game.mod_dir();

        let plan = plan_deploy(self.cache, game, mods, selected, self.policy);
        report.failures = plan.failures;
        report.shadowed = plan.shadowed;

        tracing::info!(
            game = %game.id,
            mods = plan.mods.len(),
            method = %method,
            "deploying mods"
        );

        let batch = Batch {
            runner: self.hooks,
            hooks: &hooks,
            game,
            mod_dir: &mod_dir,
        };
        if let Err(err) = batch.run(HookStage::BeforeAll, None) {
            report.not_processed = plan.mods.iter().map(|p| p.key.clone()).collect();
            report
                .not_processed
                .extend(plan.blocked.iter().map(|&i| mods[i].key()));
            report.aborted = Some(err);
            return report;
        }

        for (pos, mod_plan) in plan.mods.iter().enumerate() {
            if let Err(err) = batch.run(HookStage::BeforeEach, Some(&mods[mod_plan.index])) {
                report.not_processed = plan.mods[pos..].iter().map(|p| p.key.clone()).collect();
                report.aborted = Some(err);
                break;
            }

            let outcome = evict_shadowed(mods, mod_plan, &mod_dir)
                .and_then(|()| apply_mod(&mut mods[mod_plan.index], mod_plan, &mod_dir, method));
            match outcome {
                Ok(ApplyOutcome::Changed) => {
                    let files = mod_plan.files.len();
                    tracing::info!(key = %mod_plan.key, files, "deployed mod");
                    report.changed.push(mod_plan.key.clone());
                }
                Ok(ApplyOutcome::Unchanged) => {
                    tracing::debug!(key = %mod_plan.key, "mod already deployed");
                    report.unchanged.push(mod_plan.key.clone());
                }
                Err(err) => {
                    tracing::warn!(key = %mod_plan.key, error = %err, "deploy failed");
                    let name = mods[mod_plan.index].name();
                    let failure = ItemFailure::new(mod_plan.key.clone(), name, err);
                    report.failures.push(failure);
                }
            }

            if let Err(err) = batch.run(HookStage::AfterEach, Some(&mods[mod_plan.index])) {
                report.warnings.push(err.to_string());
            }
        }

        report
            .not_processed
            .extend(plan.blocked.iter().map(|&i| mods[i].key()));
        if report.aborted.is_none()
            && let Some(conflict) = plan.conflict
        {
            tracing::warn!(error = %conflict, "deploy stopped on file conflict");
            report.aborted = Some(conflict);
        }

        if let Err(err) = batch.run(HookStage::AfterAll, None) {
            report.warnings.push(err.to_string());
        }
        report
    }

    fn uninstall_selected(
        &self,
        game: &Game,
        profile: Option<&Profile>,
        mods: &mut [InstalledMod],
        selected: &[usize],
    ) -> DeployReport {
        let mut report = DeployReport::default();
        if selected.is_empty() {
            return report;
        }

        let hooks =
            resolve_hooks(&game.hooks, profile.map(|p| &p.hooks), HookOperation::Uninstall);
        let mod_dir = game.mod_dir();
        let batch = Batch {
            runner: self.hooks,
            hooks: &hooks,
            game,
            mod_dir: &mod_dir,
        };

        tracing::info!(game = %game.id, mods = selected.len(), "uninstalling mods");
        if let Err(err) = batch.run(HookStage::BeforeAll, None) {
            report.not_processed = selected.iter().map(|&i| mods[i].key()).collect();
            report.aborted = Some(err);
            return report;
        }

        for (pos, &index) in selected.iter().enumerate() {
            if let Err(err) = batch.run(HookStage::BeforeEach, Some(&mods[index])) {
                report.not_processed = selected[pos..].iter().map(|&i| mods[i].key()).collect();
                report.aborted = Some(err);
                break;
            }

            let installed = &mut mods[index];
            match remove_owned(installed, &mod_dir) {
                Ok(()) => {
                    tracing::info!(key = %installed.key(), "removed mod files");
                    report.removed.push(installed.key());
                }
                Err(err) => {
                    let left = installed.owned_paths.len();
                    tracing::warn!(key = %installed.key(), left, error = %err, "uninstall failed");
                    let failure = ItemFailure::new(installed.key(), installed.name(), err);
                    report.failures.push(failure);
                }
            }

            if let Err(err) = batch.run(HookStage::AfterEach, Some(&mods[index])) {
                report.warnings.push(err.to_string());
            }
        }

        if let Err(err) = batch.run(HookStage::AfterAll, None) {
            report.warnings.push(err.to_string());
        }
        report
    }
}

struct Batch<'b> {
    runner: &'b dyn HookRunner,
    hooks: &'b ResolvedHooks,
    game: &'b Game,
    mod_dir: &'b Path,
}

impl Batch<'_> {
    fn run(&self, stage: HookStage, target: Option<&InstalledMod>) -> Result<()> {
        let ctx = HookContext {
            operation: self.hooks.operation,
            stage,
            game: self.game,
            mod_dir: self.mod_dir,
            target,
        };
        run_stage(self.runner, self.hooks, &ctx).inspect_err(|err| {
            if stage.is_fatal() {
                tracing::warn!(error = %err, "hook failed; stopping batch");
            } else {
                tracing::warn!(error = %err, "hook failed");
            }
        })
    }
}

fn apply_mod(
    installed: &mut InstalledMod,
    plan: &ModPlan,
    mod_dir: &Path,
    method: LinkMethod,
) -> Result<ApplyOutcome> {
    let planned: BTreeSet<&PathBuf> = plan.files.iter().map(|f| &f.relative).collect();
    let owned: BTreeSet<&PathBuf> = installed.owned_paths.iter().collect();
    let shadowed: BTreeSet<&PathBuf> = plan.shadowed.iter().collect();

    let unchanged = installed.deployed
        && installed.deployed_version == installed.version
        && installed.link_method == method
        && planned.is_subset(&owned)
        && owned.iter().all(|path| planned.contains(path) || shadowed.contains(path));
    if unchanged {
        // Shadowed paths stay owned until the winning mod evicts them.
        installed.shadowed_paths = plan.shadowed.clone();
        return Ok(ApplyOutcome::Unchanged);
    }

    if !installed.owned_paths.is_empty() {
        tracing::debug!(
            key = %installed.key(),
            from = %installed.deployed_version,
            to = %installed.version,
            "removing previous deployment"
        );
        for relative in installed.owned_paths.clone() {
            let path = mod_dir.join(&relative);
            unlink_file(&path, installed.link_method).map_err(|err| ModError::io(&path, err))?;
            installed.owned_paths.retain(|p| p != &relative);
            prune_parents(&path, mod_dir);
        }
    }
    installed.deployed = false;
    installed.deployed_version.clear();

    let mut created: Vec<PathBuf> = Vec::new();
    let mut owned_now: Vec<PathBuf> = Vec::with_capacity(plan.files.len());
    for file in &plan.files {
        let dst = mod_dir.join(&file.relative);
        let result = if occupied(&dst) {
            if method == LinkMethod::Symlink && is_symlink_to(&dst, &file.source) {
                Ok(())
            } else {
                Err(ModError::LinkFailed {
                    method,
                    src: file.source.clone(),
                    dst: dst.clone(),
                    reason: LinkFailure::Unmanaged,
                })
            }
        } else {
            link_file(&file.source, &dst, method).map(|()| created.push(dst.clone()))
        };

        if let Err(err) = result {
            rollback(&created, method, mod_dir);
            return Err(err);
        }
        owned_now.push(file.relative.clone());
    }

    installed.deployed = true;
    installed.deployed_version = installed.version.clone();
    installed.link_method = method;
    installed.owned_paths = owned_now;
    installed.shadowed_paths = plan.shadowed.clone();
    Ok(ApplyOutcome::Changed)
}

/// Remove the files earlier mods still own at paths `plan` wins, handing
/// each path over only once it is gone from disk.
fn evict_shadowed(mods: &mut [InstalledMod], plan: &ModPlan, mod_dir: &Path) -> Result<()> {
    for takeover in &plan.takes_over {
        let path = mod_dir.join(&takeover.relative);
        tracing::debug!(
            path = %path.display(),
            previous = %takeover.previous,
            "evicting shadowed file"
        );
        unlink_file(&path, takeover.method).map_err(|err| ModError::io(&path, err))?;
        prune_parents(&path, mod_dir);
        mods[takeover.previous_index]
            .owned_paths
            .retain(|p| p != &takeover.relative);
    }
    Ok(())
}

/// Unlink every owned path. Paths that cannot be removed stay recorded and
/// the mod stays deployed; the first such error is returned.
fn remove_owned(installed: &mut InstalledMod, mod_dir: &Path) -> Result<()> {
    let mut first_error = None;
    let mut left = Vec::new();
    for relative in std::mem::take(&mut installed.owned_paths) {
        let path = mod_dir.join(&relative);
        match unlink_file(&path, installed.link_method) {
            Ok(true) => prune_parents(&path, mod_dir),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot remove file");
                first_error.get_or_insert(ModError::io(&path, err));
                left.push(relative);
            }
        }
    }

    installed.owned_paths = left;
    if let Some(err) = first_error {
        return Err(err);
    }
    installed.deployed = false;
    installed.deployed_version.clear();
    installed.shadowed_paths.clear();
    Ok(())
}

fn rollback(created: &[PathBuf], method: LinkMethod, mod_dir: &Path) {
    for path in created.iter().rev() {
        if let Err(err) = unlink_file(path, method) {
            tracing::warn!(path = %path.display(), error = %err, "rollback failed");
        }
        prune_parents(path, mod_dir);
    }
}

fn occupied(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}

fn prune_parents(path: &Path, mod_dir: &Path) {
    if let Some(parent) = path.parent() {
        prune_empty_dirs(parent, mod_dir);
    }
}
