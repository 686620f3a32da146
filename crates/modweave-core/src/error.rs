//! Error types shared across resolution, deployment, and update checks.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::fs::LinkMethod;
use crate::types::ModKey;

pub type Result<T> = std::result::Result<T, ModError>;

/// What kind of record a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Mod,
    Game,
    Profile,
    Source,
    File,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotFoundKind::Mod => "mod",
            NotFoundKind::Game => "game",
            NotFoundKind::Profile => "profile",
            NotFoundKind::Source => "source",
            NotFoundKind::File => "file",
        };
        f.write_str(s)
    }
}

/// Why a link operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    /// Hardlink across filesystems. Never downgraded to a copy.
    CrossDevice,
    /// The destination exists and no mod in the batch owns it.
    Unmanaged,
    Io(String),
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFailure::CrossDevice => {
                f.write_str("source and destination are on different filesystems")
            }
            LinkFailure::Unmanaged => f.write_str("destination exists and is not managed"),
            LinkFailure::Io(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: String },

    #[error("Authentication required for source '{source_id}'")]
    AuthRequired { source_id: String },

    #[error("Source '{source_id}' does not support {operation}")]
    NotSupported {
        source_id: String,
        operation: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dependency loop: {}", format_cycle(.cycle))]
    DependencyLoop { cycle: Vec<ModKey> },

    #[error("File conflict at {}: owned by {owner}, also claimed by {claimant}", .path.display())]
    FileConflict {
        path: PathBuf,
        owner: ModKey,
        claimant: ModKey,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Failed to {method} {} -> {}: {reason}", .src.display(), .dst.display())]
    LinkFailed {
        method: LinkMethod,
        src: PathBuf,
        dst: PathBuf,
        reason: LinkFailure,
    },

    #[error("{operation} hook '{stage}' failed ({script}): {message}")]
    Hook {
        operation: &'static str,
        stage: &'static str,
        script: String,
        message: String,
    },

    #[error("Source '{source_id}' error: {message}")]
    Backend { source_id: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Partial(#[from] PartialFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModError {
    pub fn not_found(kind: NotFoundKind, id: impl Into<String>) -> Self {
        ModError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for conditions that abort the rest of a batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModError::DependencyLoop { .. }
                | ModError::FileConflict { .. }
                | ModError::Hook { .. }
                | ModError::Cancelled
        )
    }
}

fn format_cycle(cycle: &[ModKey]) -> String {
    cycle
        .iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One item that failed inside a batch that kept going.
#[derive(Debug)]
pub struct ItemFailure {
    pub key: ModKey,
    pub name: String,
    pub error: ModError,
}

impl ItemFailure {
    pub fn new(key: ModKey, name: impl Into<String>, error: ModError) -> Self {
        Self {
            key,
            name: name.into(),
            error,
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() || self.name == self.key.to_string() {
            write!(f, "{}: {}", self.key, self.error)
        } else {
            write!(f, "{} ({}): {}", self.name, self.key, self.error)
        }
    }
}

/// Joined per-item failures returned alongside a partial result.
#[derive(Debug, Default)]
pub struct PartialFailure {
    pub failures: Vec<ItemFailure>,
}

impl PartialFailure {
    pub fn new(failures: Vec<ItemFailure>) -> Self {
        Self { failures }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn push(&mut self, failure: ItemFailure) {
        self.failures.push(failure);
    }

    /// `None` when nothing failed.
    pub fn into_error(self) -> Option<ModError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(ModError::Partial(self))
        }
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mod(s) skipped", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_loop_lists_chain() {
        let err = ModError::DependencyLoop {
            cycle: vec![
                ModKey::new("nexus", "a"),
                ModKey::new("nexus", "b"),
                ModKey::new("nexus", "a"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Dependency loop: nexus:a -> nexus:b -> nexus:a"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn partial_failure_names_every_item() {
        let mut partial = PartialFailure::default();
        partial.push(ItemFailure::new(
            ModKey::new("nexus", "1"),
            "SkyUI",
            ModError::Backend {
                source_id: "nexus".to_string(),
                message: "HTTP 503".to_string(),
            },
        ));
        partial.push(ItemFailure::new(
            ModKey::new("curse", "2"),
            "",
            ModError::not_found(NotFoundKind::Mod, "2"),
        ));

        let message = partial.to_string();
        assert!(message.starts_with("2 mod(s) skipped"));
        assert!(message.contains("SkyUI (nexus:1)"));
        assert!(message.contains("curse:2: mod not found: 2"));
    }

    #[test]
    fn empty_partial_failure_is_not_an_error() {
        assert!(PartialFailure::default().into_error().is_none());
    }
}
