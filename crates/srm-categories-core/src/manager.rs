//! Category sync across Steam installations and users
//!
//! One unit of work per (installation, user). A unit opens the user's
//! category store, reads it alongside `localconfig.vdf`, merges the desired
//! facts, saves the store, then writes `localconfig.vdf`. The store is always
//! saved before the text config is written: an interrupted unit leaves the
//! text config stale, never ahead of the store, and rerunning the sync
//! repairs it because the merge only adds.
//!
//! Units run one at a time, in plan order. The store admits a single writer,
//! and nothing here locks it; running units concurrently would need per-store
//! locking first. A failed unit is recorded and the next unit starts.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::category::{
    CategoryMerger, CategoryRecords, CategoryStore, CategoryStoreOpener, MergeStats,
};
use crate::config::{FailurePolicy, SyncConfig};
use crate::error::{Result, SyncError};
use crate::localconfig::{KeyValuesCodec, LocalConfig, TextConfigCodec};
use crate::plan::{Installation, SyncPlan, UserCategories, UserId};
use crate::platform::{resolve_store_path, OsFamily};

/// Where a unit of work was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStage {
    Opening,
    Reading,
    Merging,
    WritingBinary,
    PatchingText,
    WritingText,
    Closing,
    Done,
}

impl UnitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Reading => "reading",
            Self::Merging => "merging",
            Self::WritingBinary => "writing-binary",
            Self::PatchingText => "patching-text",
            Self::WritingText => "writing-text",
            Self::Closing => "closing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct UnitFailure {
    pub stage: UnitStage,
    pub error: SyncError,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

fn at(stage: UnitStage) -> impl FnOnce(SyncError) -> UnitFailure {
    move |error| UnitFailure { stage, error }
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub store_path: PathBuf,
    pub localconfig_path: PathBuf,
    /// The store did not exist yet and was created from nothing.
    pub store_was_empty: bool,
    pub stats: MergeStats,
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub installation: Installation,
    pub user: UserId,
    pub result: std::result::Result<UnitReport, UnitFailure>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<UnitOutcome>,
    /// Units never started because the run was cancelled.
    pub skipped: Vec<(Installation, UserId)>,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Fold unit failures into one result according to `policy`.
    pub fn check(&self, policy: FailurePolicy) -> Result<()> {
        if policy == FailurePolicy::BestEffort {
            return Ok(());
        }
        let mut failures = self.failures();
        match failures.next() {
            None => Ok(()),
            Some(first) => Err(SyncError::UnitsFailed {
                failed: 1 + failures.count(),
                total: self.outcomes.len(),
                first: match &first.result {
                    Err(failure) => {
                        format!("{} user {}: {}", first.installation, first.user, failure)
                    }
                    Ok(_) => String::new(),
                },
            }),
        }
    }
}

/// One queued (installation, user) unit.
#[derive(Debug, Clone, Copy)]
pub struct WorkItem<'a> {
    pub installation: &'a Installation,
    pub user: UserId,
    pub data: &'a UserCategories,
}

pub struct CategoryManager<O, C = KeyValuesCodec> {
    opener: O,
    codec: C,
    prefix: String,
    os: OsFamily,
    local_app_data: Option<PathBuf>,
}

impl<O: CategoryStoreOpener> CategoryManager<O> {
    pub fn new(opener: O) -> Self {
        Self::from_config(opener, &SyncConfig::default())
    }

    pub fn from_config(opener: O, config: &SyncConfig) -> Self {
        Self {
            opener,
            codec: KeyValuesCodec,
            prefix: config.categories.prefix.clone(),
            os: config.os_family(),
            local_app_data: config.local_app_data(),
        }
    }
}

impl<O, C> CategoryManager<O, C>
where
    O: CategoryStoreOpener,
    C: TextConfigCodec,
{
    pub fn with_codec<C2: TextConfigCodec>(self, codec: C2) -> CategoryManager<O, C2> {
        CategoryManager {
            opener: self.opener,
            codec,
            prefix: self.prefix,
            os: self.os,
            local_app_data: self.local_app_data,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_os_family(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn with_local_app_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_app_data = Some(path.into());
        self
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Flatten a plan into units, in plan order.
    pub fn create_work_list<'a>(&self, plan: &'a SyncPlan) -> VecDeque<WorkItem<'a>> {
        plan.installations
            .iter()
            .flat_map(|install| {
                install.users.iter().map(move |user| WorkItem {
                    installation: &install.installation,
                    user: user.user,
                    data: &user.data,
                })
            })
            .collect()
    }

    pub async fn sync(&self, plan: &SyncPlan) -> SyncReport {
        self.sync_with_cancel(plan, &CancellationToken::new()).await
    }

    /// Run every unit of `plan`.
    ///
    /// Cancellation is honoured between units only; a started unit always
    /// runs to completion.
    pub async fn sync_with_cancel(
        &self,
        plan: &SyncPlan,
        cancel: &CancellationToken,
    ) -> SyncReport {
        let mut queue = self.create_work_list(plan);
        let mut report = SyncReport::default();
        info!(units = queue.len(), "starting category sync");

        while let Some(item) = queue.pop_front() {
            if cancel.is_cancelled() {
                report.skipped.push((item.installation.clone(), item.user));
                continue;
            }

            let result = self.run_unit(&item).await;
            match &result {
                Ok(unit) => info!(
                    installation = %item.installation,
                    user = %item.user,
                    categories_created = unit.stats.categories_created,
                    ids_added = unit.stats.collection_ids_added,
                    "categories synced"
                ),
                Err(failure) => warn!(
                    installation = %item.installation,
                    user = %item.user,
                    stage = %failure.stage,
                    error = %failure.error,
                    "category sync failed"
                ),
            }
            report.outcomes.push(UnitOutcome {
                installation: item.installation.clone(),
                user: item.user,
                result,
            });
        }

        if !report.skipped.is_empty() {
            info!(skipped = report.skipped.len(), "category sync cancelled");
        }
        report
    }

    /// Run one unit. The store handle is closed on every path once opened.
    async fn run_unit(&self, item: &WorkItem<'_>) -> std::result::Result<UnitReport, UnitFailure> {
        let store_path = resolve_store_path(
            self.os,
            item.installation.root(),
            self.local_app_data.as_deref(),
        )
        .map_err(at(UnitStage::Opening))?;
        debug!(user = %item.user, path = %store_path.display(), "opening category store");

        let mut store = self
            .opener
            .open(&store_path, item.user)
            .await
            .map_err(at(UnitStage::Opening))?;

        let result = self.apply(&mut store, item, store_path).await;

        debug!(user = %item.user, stage = %UnitStage::Closing, "closing category store");
        match (result, store.close().await) {
            (Ok(report), Ok(())) => {
                debug!(user = %item.user, stage = %UnitStage::Done, "unit finished");
                Ok(report)
            }
            (Ok(_), Err(error)) => Err(UnitFailure {
                stage: UnitStage::Closing,
                error,
            }),
            (Err(failure), Err(close_error)) => {
                warn!(user = %item.user, error = %close_error, "failed to close category store");
                Err(failure)
            }
            (Err(failure), Ok(())) => Err(failure),
        }
    }

    async fn apply(
        &self,
        store: &mut O::Store,
        item: &WorkItem<'_>,
        store_path: PathBuf,
    ) -> std::result::Result<UnitReport, UnitFailure> {
        let user = item.user;

        debug!(user = %user, stage = %UnitStage::Reading, "reading stores");
        let store_was_empty = match store.read().await {
            Ok(()) => false,
            Err(e) if e.is_store_not_found() => {
                debug!(user = %user, "no category store yet, starting empty");
                true
            }
            Err(e) => return Err(at(UnitStage::Reading)(e)),
        };
        let existing = if store_was_empty {
            CategoryRecords::new()
        } else {
            store.records().clone()
        };

        let localconfig_path = item.installation.localconfig_path(user);
        let mut localconfig = LocalConfig::load(&localconfig_path, &self.codec)
            .await
            .map_err(at(UnitStage::Reading))?;
        let collections = localconfig.collections().map_err(at(UnitStage::Reading))?;

        debug!(user = %user, stage = %UnitStage::Merging, "merging categories");
        let facts = item.data.facts();
        let outcome = CategoryMerger::new(&self.prefix)
            .merge(&existing, &collections, &facts)
            .map_err(at(UnitStage::Merging))?;

        if !outcome.changed_keys.is_empty() {
            debug!(
                user = %user,
                stage = %UnitStage::WritingBinary,
                keys = outcome.changed_keys.len(),
                "saving category store"
            );
            for key in &outcome.changed_keys {
                if let Some(record) = outcome.categories.get(key) {
                    store.add(key, record.clone());
                }
            }
            store.save().await.map_err(at(UnitStage::WritingBinary))?;
        }

        let stats = outcome.stats;
        if stats.collections_created > 0 || stats.collection_ids_added > 0 {
            debug!(user = %user, stage = %UnitStage::PatchingText, "patching localconfig");
            localconfig
                .set_collections(&outcome.collections)
                .map_err(at(UnitStage::PatchingText))?;

            debug!(user = %user, stage = %UnitStage::WritingText, "writing localconfig");
            localconfig
                .save(&self.codec)
                .await
                .map_err(at(UnitStage::WritingText))?;
        }

        Ok(UnitReport {
            store_path,
            localconfig_path,
            store_was_empty,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::MemoryStoreOpener;
    use crate::plan::ApplicationEntry;

    #[test]
    fn test_create_work_list_order() {
        let a = Installation::new("/a");
        let b = Installation::new("/b");
        let mut plan = SyncPlan::new();
        plan.add(&a, UserId(2), ApplicationEntry::new("x", "X", ["C"]));
        plan.add(&a, UserId(1), ApplicationEntry::new("y", "Y", ["C"]));
        plan.add(&b, UserId(2), ApplicationEntry::new("z", "Z", ["C"]));

        let manager = CategoryManager::new(MemoryStoreOpener::new());
        let order: Vec<(String, UserId)> = manager
            .create_work_list(&plan)
            .iter()
            .map(|item| (item.installation.to_string(), item.user))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/a".to_string(), UserId(2)),
                ("/a".to_string(), UserId(1)),
                ("/b".to_string(), UserId(2)),
            ]
        );
    }

    #[test]
    fn test_check_policies() {
        let report = SyncReport {
            outcomes: vec![UnitOutcome {
                installation: Installation::new("/a"),
                user: UserId(1),
                result: Err(UnitFailure {
                    stage: UnitStage::WritingBinary,
                    error: SyncError::StoreWrite {
                        path: PathBuf::from("/db"),
                        message: "disk full".to_string(),
                    },
                }),
            }],
            skipped: Vec::new(),
        };
        assert!(report.check(FailurePolicy::BestEffort).is_ok());
        let err = report.check(FailurePolicy::FailOnAny).unwrap_err();
        assert!(matches!(err, SyncError::UnitsFailed { failed: 1, total: 1, .. }));
        assert!(err.to_string().contains("writing-binary"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(UnitStage::WritingText.to_string(), "writing-text");
        assert_eq!(UnitStage::Done.as_str(), "done");
    }
}
