//! Model resolver - Maps product identifiers to 3D assets
//!
//! Resolution is total: every identifier, including an absent one, yields
//! exactly one asset reference. Identifiers missing from the asset index get
//! the fallback asset and the `unknown` category.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::catalog::CatalogError;
use crate::product::Category;

const BUILTIN_ASSETS: &str = include_str!("../assets/assets.toml");

/// Asset rendered when a product has no dedicated model
pub const FALLBACK_ASSET: &str = "/assets/3d/duck.glb";

/// Reference to a 3D asset (GLB URL or path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_ASSET.to_string())
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_ASSET
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of resolving a product identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub asset: AssetRef,
    pub category: Category,
}

/// A single product -> model entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub product: String,
    pub model: String,
}

/// The asset index file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIndex {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default)]
    pub asset: Vec<AssetEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_fallback() -> String {
    FALLBACK_ASSET.to_string()
}

impl Default for AssetIndex {
    fn default() -> Self {
        Self {
            version: default_version(),
            fallback: default_fallback(),
            asset: Vec::new(),
        }
    }
}

impl AssetIndex {
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let index: AssetIndex = toml::from_str(content)?;
        Ok(index)
    }

    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_ASSETS).unwrap_or_default()
    }
}

/// Pure product -> asset lookup
#[derive(Debug, Clone)]
pub struct ModelResolver {
    fallback: AssetRef,
    models: HashMap<String, AssetRef>,
}

impl ModelResolver {
    pub fn new(index: AssetIndex) -> Self {
        let models = index
            .asset
            .into_iter()
            .map(|e| (e.product, AssetRef(e.model)))
            .collect();
        Self {
            fallback: AssetRef(index.fallback),
            models,
        }
    }

    /// Resolver over the built-in asset table
    pub fn builtin() -> Self {
        Self::new(AssetIndex::builtin())
    }

    /// Resolve a product identifier to its asset and try-on category
    pub fn resolve(&self, product_id: Option<&str>) -> ResolvedModel {
        match product_id.and_then(|id| self.models.get(id).map(|asset| (id, asset))) {
            Some((id, asset)) => ResolvedModel {
                asset: asset.clone(),
                category: Category::from_product_id(id),
            },
            None => ResolvedModel {
                asset: self.fallback.clone(),
                category: Category::Unknown,
            },
        }
    }

    /// Whether the identifier has a dedicated model
    pub fn is_known(&self, product_id: &str) -> bool {
        self.models.contains_key(product_id)
    }

    pub fn fallback(&self) -> &AssetRef {
        &self.fallback
    }
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::builtin()
    }
}
