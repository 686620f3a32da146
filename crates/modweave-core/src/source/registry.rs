use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModError, NotFoundKind, Result};

use super::ModSource;

/// Configured sources keyed by [`ModSource::id`].
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn ModSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any source with the same id.
    pub fn register(&mut self, source: Arc<dyn ModSource>) {
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn with(mut self, source: Arc<dyn ModSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, source_id: &str) -> Result<&Arc<dyn ModSource>> {
        self.sources
            .get(source_id)
            .ok_or_else(|| ModError::not_found(NotFoundKind::Source, source_id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
