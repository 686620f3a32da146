use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    Downloads,
    Updated,
    Name,
}

/// Typed search request. Backends translate it into their own query format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub game_id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub page: u32,
    pub page_size: u32,
}

impl SearchQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(game_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            text: text.into(),
            tags: Vec::new(),
            sort: SortOrder::default(),
            page: 0,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, Self::MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_page_size() {
        let query = SearchQuery::new("skyrim", "ui").page_size(500).page(2);
        assert_eq!(query.page_size, SearchQuery::MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn builder_collects_tags() {
        let query = SearchQuery::new("skyrim", "")
            .tag("armor")
            .tag("lore")
            .sort(SortOrder::Downloads);
        assert_eq!(query.tags, vec!["armor", "lore"]);
        assert_eq!(query.sort, SortOrder::Downloads);
    }
}
