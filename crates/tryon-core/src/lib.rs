//! Tryon Core - Product types, catalog, model resolution and placement
//!
//! This crate provides the foundational types for the try-on session:
//! - Product identifiers, try-on categories and catalog records
//! - Catalog repository for product lookups
//! - Model resolver mapping products to 3D assets
//! - Placement controller with clamped overrides and landmark-driven updates
//! - 68-point face landmark sets

pub mod catalog;
pub mod landmarks;
pub mod placement;
pub mod product;
pub mod resolver;

pub use catalog::{CatalogError, CatalogIndex, InMemoryCatalog, ProductRepository};
pub use landmarks::{FaceLandmarks, LandmarkError, Point2};
pub use placement::{Axis, Placement, PlacementController, Viewport};
pub use product::{Category, Product, ProductId};
pub use resolver::{AssetIndex, AssetRef, ModelResolver, ResolvedModel, FALLBACK_ASSET};
