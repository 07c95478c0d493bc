//! Session-scoped report cache backed by `DashMap`.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::error::CotError;
use crate::filter::{AliasKey, AliasSet};
use crate::record::MergedReport;

/// Merged reports keyed by canonical alias set, plus the contract universe.
///
/// Owned by exactly one session and dropped with it. There is no eviction:
/// past-year archives never change and the current year changes at most
/// weekly, well beyond a session's useful life.
#[derive(Default)]
pub struct ReportCache {
    reports: DashMap<AliasKey, Arc<MergedReport>>,
    contracts: Mutex<Option<Arc<BTreeSet<String>>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the report for `key`, either stored under that exact key or
    /// narrowed down from a stored superset. A narrowed report is stored
    /// under `key` before it is returned.
    pub fn get(&self, key: &AliasKey) -> Option<Arc<MergedReport>> {
        if let Some(hit) = self.reports.get(key) {
            return Some(Arc::clone(hit.value()));
        }

        let superset = self
            .reports
            .iter()
            .find(|entry| key.is_subset_of(entry.key()))
            .map(|entry| Arc::clone(entry.value()))?;

        let records = superset
            .records()
            .iter()
            .filter(|r| key.aliases().binary_search(&r.contract).is_ok())
            .cloned()
            .collect();
        let narrowed = Arc::new(MergedReport::new(
            superset.family(),
            superset.shared_columns(),
            records,
        ));
        self.reports.insert(key.clone(), Arc::clone(&narrowed));
        Some(narrowed)
    }

    /// Inserts or overwrites the report for `key`.
    pub fn insert(&self, key: AliasKey, report: Arc<MergedReport>) {
        self.reports.insert(key, report);
    }

    /// Returns the cached report for `aliases`, running `compute` on a miss
    /// and storing its result. Failed computations are not cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        aliases: &AliasSet,
        compute: F,
    ) -> Result<Arc<MergedReport>, CotError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MergedReport, CotError>>,
    {
        let key = aliases.key();
        if let Some(hit) = self.get(&key) {
            tracing::debug!("Report cache hit for {:?}", key.aliases());
            return Ok(hit);
        }

        let report = Arc::new(compute().await?);
        self.insert(key, Arc::clone(&report));
        Ok(report)
    }

    /// Returns the cached contract universe, computing it on first use.
    pub async fn contracts_or_compute<F, Fut>(
        &self,
        compute: F,
    ) -> Result<Arc<BTreeSet<String>>, CotError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BTreeSet<String>, CotError>>,
    {
        if let Some(hit) = self.cached_contracts() {
            return Ok(hit);
        }

        let contracts = Arc::new(compute().await?);
        *self.contracts.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&contracts));
        Ok(contracts)
    }

    fn cached_contracts(&self) -> Option<Arc<BTreeSet<String>>> {
        self.contracts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of stored alias-set reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Removes all entries from the cache.
    pub fn clear(&self) {
        self.reports.clear();
        *self.contracts.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
