//! Engine settings loaded from `modweave.toml`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{ModError, Result};

/// What happens when two mods in a batch claim the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Abort with a conflict error naming both mods.
    #[default]
    Strict,
    /// The later mod in install order wins the path.
    Override,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub conflict_policy: ConflictPolicy,
    /// Root of the coordinate-keyed mod cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl EngineSettings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))
    }

    pub fn to_toml(&self) -> Result<String> {
        let text = toml::to_string_pretty(self)
            .context("Failed to serialize settings to TOML")?;
        Ok(text)
    }

    /// Configured cache directory, else the platform cache dir.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("modweave"))
            .ok_or_else(|| {
                ModError::InvalidConfig("Could not determine cache directory".to_string())
            })
    }
}

/// Default location of `modweave.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modweave").join("modweave.toml"))
}

fn enhance_toml_error(error: toml::de::Error, content: &str) -> ModError {
    let message = error.to_string();
    let Some(span) = error.span() else {
        return ModError::InvalidConfig(format!("TOML parsing error: {}", message.trim()));
    };

    let line_num = content[..span.start.min(content.len())].matches('\n').count() + 1;
    ModError::InvalidConfig(format!(
        "TOML parsing error at line {}:\n{}\n\nError: {}",
        line_num,
        get_line_context(content, line_num),
        message.trim()
    ))
}

fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = EngineSettings::from_toml_str("").expect("parse should succeed");
        assert_eq!(settings.conflict_policy, ConflictPolicy::Strict);
        assert!(settings.cache_dir.is_none());
    }

    #[test]
    fn parses_override_policy_and_cache_dir() {
        let settings = EngineSettings::from_toml_str(
            r#"
conflict_policy = "override"
cache_dir = "/var/cache/mods"
"#,
        )
        .expect("parse should succeed");

        assert_eq!(settings.conflict_policy, ConflictPolicy::Override);
        assert_eq!(
            settings.cache_dir().expect("cache_dir should resolve"),
            PathBuf::from("/var/cache/mods")
        );
    }

    #[test]
    fn unknown_policy_reports_line() {
        let err = EngineSettings::from_toml_str("\nconflict_policy = \"newest\"\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn load_reads_file_and_tolerates_missing() {
        let mut file = NamedTempFile::new().expect("tempfile should succeed");
        writeln!(file, "conflict_policy = \"override\"").expect("write should succeed");

        let settings = EngineSettings::load(file.path()).expect("load should succeed");
        assert_eq!(settings.conflict_policy, ConflictPolicy::Override);

        let missing = file.path().with_extension("missing");
        assert_eq!(
            EngineSettings::load(&missing).expect("missing file is fine"),
            EngineSettings::default()
        );
    }
}
