use serde::{Deserialize, Serialize};

use shelfsync_core::ProductId;

/// A product as held by the catalog store.
///
/// The catalog owns this record. The reconciliation pipeline reads it for
/// matching and only ever writes `quantity` (and `track_quantity`) back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub quantity: i64,
    #[serde(default)]
    pub track_quantity: bool,
}

impl CatalogProduct {
    pub fn new(product_id: ProductId, sku: impl Into<String>, title: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            title: title.into(),
            tags: Vec::new(),
            quantity,
            track_quantity: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive containment search over title, SKU and tags.
    ///
    /// `needle` is lowercased here; an empty needle never matches.
    pub fn contains_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.title.to_lowercase().contains(&needle)
            || self.sku.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }

    /// True when the title or SKU equals `name`, ignoring case and surrounding whitespace.
    pub fn is_exact_match(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.title.trim().to_lowercase() == name || self.sku.trim().to_lowercase() == name
    }
}
