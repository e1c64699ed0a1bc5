//! Product identifiers and catalog records

use serde::{Deserialize, Serialize};

use crate::placement::Placement;

/// Catalog identifier of a product (e.g. "glasses-1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Try-on category derived from the identifier prefix
    pub fn category(&self) -> Category {
        Category::from_product_id(&self.0)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Try-on category, which decides default placement and presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Glasses,
    Shirt,
    Jacket,
    Unknown,
}

impl Default for Category {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Category {
    /// Classify a product identifier by its prefix ("glasses-2" -> Glasses)
    pub fn from_product_id(id: &str) -> Self {
        if id.starts_with("glasses") {
            Self::Glasses
        } else if id.starts_with("shirt") {
            Self::Shirt
        } else if id.starts_with("jacket") {
            Self::Jacket
        } else {
            Self::Unknown
        }
    }

    /// Shirts and jackets share the torso placement bucket
    pub fn is_apparel(&self) -> bool {
        matches!(self, Self::Shirt | Self::Jacket)
    }

    /// Default pose for a freshly selected product of this category
    pub fn default_placement(&self) -> Placement {
        let position = match self {
            Self::Glasses => [0.0, 0.2, -1.0],
            Self::Shirt | Self::Jacket => [0.0, -1.0, -3.0],
            Self::Unknown => [0.0, 0.0, -2.0],
        };
        Placement {
            scale: 1.0,
            position,
            rotation: [0.0, 0.0, 0.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glasses => "glasses",
            Self::Shirt => "shirt",
            Self::Jacket => "jacket",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product record as served by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    /// Listing category ("glasses", "clothing")
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Thumbnail image URL
    #[serde(default)]
    pub image: String,
    /// Catalog-advertised model URL
    #[serde(default)]
    pub model_url: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    /// Available sizes; empty for products without sizing
    #[serde(default)]
    pub sizes: Vec<String>,
}

impl Product {
    pub fn try_on_category(&self) -> Category {
        self.id.category()
    }
}
