//! # Category Module
//!
//! Category records as the two client stores see them, the merge that keeps
//! them in agreement, and the adapter contract for the binary store.
//!
//! ## Module layout
//!
//! - `record`: category and collection records, category keys
//! - `merger`: merge-only fold of desired facts into both record sets
//! - `store`: binary store handle contract and the in-memory adapter
//!
//! ## Example
//!
//! ```rust
//! use srm_categories_core::category::{CategoryMerger, CategoryRecords, UserCollections};
//! use srm_categories_core::{AppId, CategoryFact};
//!
//! let facts = vec![
//!     CategoryFact::new(AppId(1001), "Emulators"),
//!     CategoryFact::new(AppId(1002), "Emulators"),
//! ];
//! let outcome = CategoryMerger::new("srm-")
//!     .merge(&CategoryRecords::new(), &UserCollections::new(), &facts)
//!     .unwrap();
//!
//! assert_eq!(outcome.categories["srm-Emulators"].added.len(), 2);
//! assert!(outcome.collections.contains_key("srm-Emulators"));
//! ```

mod merger;
mod record;
mod store;

pub use merger::{CategoryMerger, MergeOutcome, MergeStats};
pub use record::{
    category_key, CategoryRecord, CategoryRecords, CollectionRecord, UserCollections,
    DEFAULT_CATEGORY_PREFIX,
};
pub use store::{CategoryStore, CategoryStoreOpener, MemoryCategoryStore, MemoryStoreOpener};
