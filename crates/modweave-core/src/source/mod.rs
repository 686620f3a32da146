//! Hosting backends ("sources") and the uniform interface the engine uses.
//!
//! Each backend (a mod site's REST or GraphQL API) implements [`ModSource`].
//! The resolver and the update reconciler only ever talk to this trait.

mod query;
mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModError, Result};
use crate::types::{InstalledMod, Mod, ModFiles, ModReference};
use crate::update::UpdateScan;

pub use query::{SearchQuery, SortOrder};
pub use registry::SourceRegistry;

/// OAuth token returned by [`ModSource::exchange_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
pub trait ModSource: Send + Sync {
    /// Stable identifier, used as the first half of a ModKey.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Mod>>;

    /// `game_id` is the backend's own id for the game.
    async fn get_mod(&self, game_id: &str, mod_id: &str) -> Result<Mod>;

    /// Strict required dependencies only; optional and incompatible
    /// relations are not returned.
    async fn get_dependencies(&self, m: &Mod) -> Result<Vec<ModReference>>;

    /// File list plus the backend's file supersession relation.
    async fn get_mod_files(&self, m: &Mod) -> Result<ModFiles>;

    async fn get_download_url(&self, m: &Mod, file_id: &str) -> Result<String>;

    /// Backends with a native bulk update endpoint override this. The
    /// default applies the generic per-mod rule to each mod in turn; a mod
    /// whose lookup fails lands in [`UpdateScan::failures`] and the rest are
    /// still checked.
    async fn check_updates(&self, installed: &[InstalledMod]) -> UpdateScan {
        let mut scan = UpdateScan::default();
        for mod_state in installed {
            let result = crate::update::check_mod_update(self, mod_state).await;
            scan.record(mod_state, result);
        }
        scan
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    /// Backends store the key with interior mutability.
    fn set_api_key(&self, _key: &str) -> Result<()> {
        Err(self.not_supported("API keys"))
    }

    async fn validate_api_key(&self, _key: &str) -> Result<()> {
        Err(self.not_supported("API key validation"))
    }

    async fn exchange_token(&self, _code: &str) -> Result<Token> {
        Err(self.not_supported("OAuth token exchange"))
    }

    fn not_supported(&self, operation: &'static str) -> ModError {
        ModError::NotSupported {
            source_id: self.id().to_string(),
            operation,
        }
    }
}
