//! Category merge
//!
//! Folds desired (app, category) facts into the records of both stores.
//! The merge only ever adds: members and collection ids already present are
//! kept, keys not mentioned by any fact are returned unchanged, and an id is
//! never inserted twice. Running the same merge again is a no-op.

use crate::category::record::{
    category_key, CategoryRecord, CategoryRecords, CollectionRecord, UserCollections,
};
use crate::error::Result;
use crate::plan::CategoryFact;

/// Counters describing what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub categories_created: usize,
    pub collections_created: usize,
    pub members_added: usize,
    pub collection_ids_added: usize,
}

impl MergeStats {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Updated record sets for both stores.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub categories: CategoryRecords,
    pub collections: UserCollections,
    /// Keys of category records that were created or gained members.
    pub changed_keys: Vec<String>,
    pub stats: MergeStats,
}

pub struct CategoryMerger<'a> {
    prefix: &'a str,
}

impl<'a> CategoryMerger<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn merge(
        &self,
        categories: &CategoryRecords,
        collections: &UserCollections,
        facts: &[CategoryFact],
    ) -> Result<MergeOutcome> {
        let mut categories = categories.clone();
        let mut collections = collections.clone();
        let mut changed_keys: Vec<String> = Vec::new();
        let mut stats = MergeStats::default();

        for fact in facts {
            let key = category_key(self.prefix, &fact.category);

            let mut changed = false;
            if !categories.get(&key).is_some_and(CategoryRecord::is_live) {
                categories.insert(key.clone(), CategoryRecord::new(fact.category.as_str()));
                stats.categories_created += 1;
                changed = true;
            }
            let record = categories
                .entry(key.clone())
                .or_insert_with(|| CategoryRecord::new(fact.category.as_str()));
            if !record.added.contains(&fact.app_id) {
                record.added.push(fact.app_id);
                stats.members_added += 1;
                changed = true;
            }
            if changed && !changed_keys.contains(&key) {
                changed_keys.push(key.clone());
            }

            let mut collection = match collections.get(&key)? {
                Some(existing) => existing,
                None => {
                    stats.collections_created += 1;
                    CollectionRecord::new(key.as_str())
                }
            };
            if !collection.added.contains(&fact.app_id) {
                collection.added.push(fact.app_id);
                stats.collection_ids_added += 1;
            }
            collections.insert(&collection)?;
        }

        Ok(MergeOutcome {
            categories,
            collections,
            changed_keys,
            stats,
        })
    }
}
