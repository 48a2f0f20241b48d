//! Cross-batch pipeline state.

use anyhow::{Context, Result};
use tracing::debug;

use crate::company::CompanyRegistry;
use crate::store::QuoteStore;
use crate::variance::VarianceTracker;
use crate::volume::VolumeCarry;

/// State carried from one batch to the next.
///
/// Companies and price statistics are reloaded from the store; the volume
/// carry lives only for the process since a trading day never spans two
/// batches.
#[derive(Debug, Default, Clone)]
pub struct PipelineState {
    pub companies: CompanyRegistry,
    pub variance: VarianceTracker,
    pub volumes: VolumeCarry,
}

impl PipelineState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the persisted part of the state.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn load<S: QuoteStore>(store: &S) -> Result<Self> {
        let companies = store
            .load_companies()
            .await
            .context("Failed to load companies")?;
        let stats = store
            .load_symbol_stats()
            .await
            .context("Failed to load symbol statistics")?;

        let companies = CompanyRegistry::from_records(companies);
        debug!(companies = companies.len(), symbols = stats.len(), "Loaded pipeline state");
        Ok(Self {
            companies,
            variance: VarianceTracker::from_records(stats),
            volumes: VolumeCarry::new(),
        })
    }

    /// Persists the statistics changed since the last save.
    ///
    /// # Errors
    /// Returns an error if the store write fails.
    pub async fn save<S: QuoteStore>(&mut self, store: &S) -> Result<u64> {
        let records = self.variance.take_dirty_records();
        store
            .save_symbol_stats(&records)
            .await
            .context("Failed to save symbol statistics")
    }
}
