//! Update reconciliation: installed mods against backend state.
//!
//! Two independent signals produce an update. The remote mod version may be
//! newer than the installed one, or one of the installed file ids may have
//! been superseded by the backend even though the mod version did not move.

use std::collections::{BTreeMap, HashSet};

use crate::cancel::CancellationToken;
use crate::error::{ItemFailure, ModError, PartialFailure, Result};
use crate::source::{ModSource, SourceRegistry};
use crate::types::{InstalledMod, Mod, ModFiles, Update};
use crate::version::is_newer;

/// Check one installed mod against its source.
///
/// Fetches the remote metadata and then the file list, one request each.
pub async fn check_mod_update<S>(source: &S, installed: &InstalledMod) -> Result<Option<Update>>
where
    S: ModSource + ?Sized,
{
    let remote = source
        .get_mod(&installed.metadata.game_id, &installed.metadata.id)
        .await?;
    let files = source.get_mod_files(&remote).await?;
    Ok(detect_update(installed, &remote, &files))
}

/// Pure form of [`check_mod_update`] over already-fetched state.
pub fn detect_update(installed: &InstalledMod, remote: &Mod, files: &ModFiles) -> Option<Update> {
    let replacements = superseded_files(&installed.file_ids, &files.file_updates);
    let version_bump = is_newer(&installed.version, &remote.version);
    if !version_bump && replacements.is_empty() {
        return None;
    }

    let new_version = if !remote.version.is_empty() && remote.version != installed.version {
        remote.version.clone()
    } else {
        replacements
            .values()
            .filter_map(|id| files.find(id))
            .map(|file| file.version.as_str())
            .find(|version| !version.is_empty())
            .unwrap_or(installed.version.as_str())
            .to_string()
    };

    Some(Update {
        key: installed.key(),
        name: installed.name(),
        current_version: installed.version.clone(),
        new_version,
        changelog: changelog(files),
        file_id_replacements: replacements,
    })
}

/// Map each superseded installed file id to its final replacement,
/// following chains (a -> b -> c yields a -> c).
fn superseded_files(
    file_ids: &[String],
    file_updates: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut replacements = BTreeMap::new();
    for old in file_ids {
        let Some(mut next) = file_updates.get(old) else {
            continue;
        };
        let mut seen: HashSet<&str> = HashSet::from([old.as_str()]);
        while let Some(further) = file_updates.get(next) {
            if !seen.insert(further.as_str()) {
                break;
            }
            next = further;
        }
        replacements.insert(old.clone(), next.clone());
    }
    replacements
}

fn changelog(files: &ModFiles) -> String {
    files
        .primary()
        .map(|file| file.changelog.as_str())
        .filter(|text| !text.is_empty())
        .or_else(|| {
            files
                .files
                .iter()
                .map(|file| file.changelog.as_str())
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

/// Progress side channel: zero-based index, total, and mod name, reported
/// once per mod before it is fetched.
pub type ProgressFn<'a> = dyn Fn(usize, usize, &str) + Send + Sync + 'a;

/// Result of a reconciliation scan.
#[derive(Debug, Default)]
pub struct UpdateScan {
    pub updates: Vec<Update>,
    pub failures: PartialFailure,
    /// Mods actually checked, successfully or not.
    pub checked: usize,
    /// The scan stopped early on the cancellation token.
    pub cancelled: bool,
}

impl UpdateScan {
    /// Updates plus the joined error for every skipped mod.
    pub fn into_parts(self) -> (Vec<Update>, Option<ModError>) {
        (self.updates, self.failures.into_error())
    }

    /// Count one checked mod and file its outcome.
    pub(crate) fn record(&mut self, mod_state: &InstalledMod, result: Result<Option<Update>>) {
        self.checked += 1;
        match result {
            Ok(Some(update)) => {
                tracing::debug!(
                    key = %update.key,
                    from = %update.current_version,
                    to = %update.new_version,
                    "update available"
                );
                self.updates.push(update);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(key = %mod_state.key(), error = %err, "update check failed");
                let failure = ItemFailure::new(mod_state.key(), mod_state.name(), err);
                self.failures.push(failure);
            }
        }
    }
}

pub struct UpdateReconciler<'a> {
    sources: &'a SourceRegistry,
    cancel: Option<&'a CancellationToken>,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> UpdateReconciler<'a> {
    pub fn new(sources: &'a SourceRegistry) -> Self {
        Self {
            sources,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Check every installed mod, one at a time.
    ///
    /// Per-mod failures are collected in [`UpdateScan::failures`] and never
    /// stop the scan. Cancellation is observed between mods only.
    pub async fn check(&self, installed: &[InstalledMod]) -> UpdateScan {
        let mut scan = UpdateScan::default();
        let total = installed.len();

        for (index, mod_state) in installed.iter().enumerate() {
            if self.cancel.is_some_and(CancellationToken::is_cancelled) {
                tracing::info!(checked = scan.checked, total, "update check cancelled");
                scan.cancelled = true;
                break;
            }

            if let Some(progress) = self.progress {
                progress(index, total, &mod_state.name());
            }

            let result = match self.sources.get(&mod_state.metadata.source_id) {
                Ok(source) => check_mod_update(&**source, mod_state).await,
                Err(err) => Err(err),
            };
            scan.record(mod_state, result);
        }

        tracing::info!(
            updates = scan.updates.len(),
            failed = scan.failures.len(),
            "update check finished"
        );
        scan
    }

    /// Apply `update` to the installed record for the caller to persist.
    ///
    /// Deployment state is left alone; the next deploy sees the version
    /// change and relinks.
    pub fn apply_update(installed: &mut InstalledMod, update: &Update) -> Result<()> {
        if installed.key() != update.key {
            return Err(ModError::InvalidConfig(format!(
                "update for {} applied to {}",
                update.key,
                installed.key()
            )));
        }

        installed.version = update.new_version.clone();
        for file_id in &mut installed.file_ids {
            if let Some(replacement) = update.file_id_replacements.get(file_id) {
                *file_id = replacement.clone();
            }
        }
        Ok(())
    }
}
