//! Product catalog - Repository interface and in-memory implementation
//!
//! The session never reaches into global product tables; it is handed a
//! [`ProductRepository`] and queries it. The default implementation is an
//! in-memory catalog loaded from a TOML index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::product::{Product, ProductId};

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.toml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog index: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse catalog index: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize catalog index: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Duplicate product id in catalog: {0}")]
    DuplicateId(String),
    #[error("Product not found: {0}")]
    NotFound(String),
}

/// Lookup interface for product records
pub trait ProductRepository: Send + Sync {
    /// List products, optionally restricted to a listing category.
    /// An unmatched category yields an empty list, not an error.
    fn list(&self, category: Option<&str>) -> Vec<Product>;

    /// Fetch a single product by id
    fn get(&self, id: &str) -> Result<Product, CatalogError>;
}

/// On-disk catalog index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndex {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub product: Vec<Product>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self {
            version: default_version(),
            product: Vec::new(),
        }
    }
}

impl CatalogIndex {
    /// Load catalog index from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load catalog index from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let index: CatalogIndex = toml::from_str(content)?;
        Ok(index)
    }

    /// The demo catalog shipped with the crate
    pub fn builtin() -> Self {
        // The embedded index is validated by tests; an empty catalog is the
        // only sensible outcome if it ever fails to parse.
        Self::from_toml(BUILTIN_CATALOG).unwrap_or_default()
    }

    /// Save the index to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), CatalogError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Catalog held entirely in memory, keyed by product id
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    /// Insertion order of the index, used for stable listings
    order: Vec<ProductId>,
    products: HashMap<ProductId, Product>,
}

impl InMemoryCatalog {
    /// Build a catalog from an index, rejecting duplicate ids
    pub fn new(index: CatalogIndex) -> Result<Self, CatalogError> {
        let mut order = Vec::with_capacity(index.product.len());
        let mut products = HashMap::with_capacity(index.product.len());

        for product in index.product {
            if products.contains_key(&product.id) {
                return Err(CatalogError::DuplicateId(product.id.0));
            }
            order.push(product.id.clone());
            products.insert(product.id.clone(), product);
        }

        Ok(Self { order, products })
    }

    /// Load from a file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        Self::new(CatalogIndex::from_file(path)?)
    }

    /// Catalog backed by the built-in demo products
    pub fn builtin() -> Self {
        Self::new(CatalogIndex::builtin()).unwrap_or_else(|_| Self::empty())
    }

    pub fn empty() -> Self {
        Self {
            order: Vec::new(),
            products: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl ProductRepository for InMemoryCatalog {
    fn list(&self, category: Option<&str>) -> Vec<Product> {
        self.order
            .iter()
            .filter_map(|id| self.products.get(id))
            .filter(|p| category.map_or(true, |c| p.category == c))
            .cloned()
            .collect()
    }

    fn get(&self, id: &str) -> Result<Product, CatalogError> {
        self.products
            .get(&ProductId::new(id))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}
