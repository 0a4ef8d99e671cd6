pub mod app_id;
pub mod category;
pub mod config;
pub mod error;
pub mod localconfig;
pub mod manager;
pub mod plan;
pub mod platform;

pub use app_id::AppId;
pub use config::{FailurePolicy, SyncConfig};
pub use error::{Result, SyncError};
pub use localconfig::{KeyValuesCodec, LocalConfig, TextConfigCodec};
pub use manager::{
    CategoryManager, SyncReport, UnitFailure, UnitOutcome, UnitReport, UnitStage, WorkItem,
};
pub use plan::{
    ApplicationEntry, CategoryFact, Installation, InstallationPlan, SyncPlan, UserCategories,
    UserId, UserPlan,
};
pub use platform::{resolve_store_path, OsFamily};

// Category records and stores
pub use category::{
    category_key, CategoryMerger, CategoryRecord, CategoryRecords, CategoryStore,
    CategoryStoreOpener, CollectionRecord, MemoryCategoryStore, MemoryStoreOpener, MergeOutcome,
    MergeStats, UserCollections, DEFAULT_CATEGORY_PREFIX,
};
