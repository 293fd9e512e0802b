//! Shared catalog model for the app market.
//!
//! Holds the [`CatalogEntry`] shape, the normalization step applied to every
//! record pushed by the document store, the pure view derivations used by the
//! admin console and storefront, and the error taxonomy shared by both.

pub mod entry;
pub mod error;
pub mod views;

pub use entry::{CatalogEntry, RawRecord};
pub use error::{CatalogError, Result};
pub use views::{CategoryFilter, DashboardStats, Page, Pager};
