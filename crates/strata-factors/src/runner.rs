//! Computing factors from warehouse data and persisting the results.

use crate::{IndustryClassification, LogMarketCap, PreprocessConfig, preprocess};
use chrono::Duration;
use polars::prelude::*;
use strata_store::{UpsertGateway, UpsertOutcome, catalog};
use strata_sync::{GapFillOrchestrator, LongLayout, long::records_to_frame};
use strata_traits::{Date, Factor, LongRecord, Result, Symbol, WideFrame};
use tracing::{debug, info, warn};

/// Melt one factor column into long records, dropping nulls.
pub fn to_long_format(factor_name: &str, values: &WideFrame) -> Result<Vec<LongRecord>> {
    Ok(values
        .to_records()?
        .into_iter()
        .filter(|r| r.field == factor_name)
        .collect())
}

/// Computes factors through the gap-fill pipeline and stores them.
#[derive(Debug, Clone)]
pub struct FactorRunner {
    orchestrator: GapFillOrchestrator,
    gateway: UpsertGateway,
}

impl FactorRunner {
    /// Create a runner.
    pub const fn new(orchestrator: GapFillOrchestrator, gateway: UpsertGateway) -> Self {
        Self {
            orchestrator,
            gateway,
        }
    }

    /// Resolve the factor's inputs (including its lookback) and compute it over `[start, end]`.
    ///
    /// # Errors
    ///
    /// Propagates request classification and calculation errors.
    pub async fn compute(
        &self,
        factor: &dyn Factor,
        symbols: &[Symbol],
        start: Date,
        end: Date,
    ) -> Result<WideFrame> {
        let input_start = start - Duration::days(factor.lookback_days());
        let mut universe = symbols.to_vec();
        for reference in factor.reference_symbols() {
            if !universe.contains(&reference) {
                universe.push(reference);
            }
        }
        debug!(factor = factor.name(), from = %input_start, to = %end, "resolving inputs");
        let inputs = self
            .orchestrator
            .resolve(&universe, &factor.requests(), input_start, end)
            .await?;
        factor.calculate(&inputs, start, end)
    }

    /// Compute the factor, then preprocess it neutralized against size and industry.
    ///
    /// Exposures are `log_market_cap` and one dummy per industry present
    /// (see [`IndustryClassification::with_dummies`]). Rows missing an
    /// exposure are dropped from the result.
    ///
    /// # Errors
    ///
    /// See [`compute`](Self::compute) and [`preprocess`].
    pub async fn compute_neutralized(
        &self,
        factor: &dyn Factor,
        symbols: &[Symbol],
        start: Date,
        end: Date,
        industries: &IndustryClassification,
    ) -> Result<WideFrame> {
        let values = self.compute(factor, symbols, start, end).await?;
        if values.is_empty() {
            return Ok(values);
        }
        let mut exposures = Vec::new();
        let mut frame = values;
        if factor.name() != LogMarketCap.name() {
            let size = self.compute(&LogMarketCap, symbols, start, end).await?;
            if size.is_empty() {
                warn!(factor = factor.name(), "no market cap data, size exposure skipped");
            } else {
                frame = frame.merge(&size)?;
                exposures.push(LogMarketCap.name().to_string());
            }
        }
        let (frame, dummies) = industries.with_dummies(&frame)?;
        exposures.extend(dummies);
        info!(factor = factor.name(), exposures = exposures.len(), "neutralizing");

        let config = PreprocessConfig {
            exposures,
            ..PreprocessConfig::default()
        };
        preprocess(&frame, factor.name(), &config)
    }

    /// Write one factor's values into `factor_panel_data`.
    ///
    /// # Errors
    ///
    /// Fails if the values cannot be reshaped; write failures are reported
    /// through the returned outcome.
    pub fn persist_factor(&self, factor_name: &str, values: &WideFrame) -> Result<UpsertOutcome> {
        if values.is_empty() {
            warn!(factor = factor_name, "factor result is empty, nothing stored");
            return Ok(UpsertOutcome::Skipped);
        }
        let records = to_long_format(factor_name, values)?;
        if records.is_empty() {
            warn!(factor = factor_name, "factor result is empty after dropping nulls, nothing stored");
            return Ok(UpsertOutcome::Skipped);
        }

        let rows = records_to_frame(&records, LongLayout::FACTOR)?;
        debug!(factor = factor_name, rows = rows.height(), "writing factor values");
        Ok(self
            .gateway
            .upsert(catalog::FACTOR_TABLE, &rows, &LongLayout::FACTOR.key()))
    }

    /// Record the factor's name, category and description in `factor_metadata`.
    ///
    /// # Errors
    ///
    /// Fails if the metadata row cannot be built.
    pub fn register_metadata(&self, factor: &dyn Factor) -> Result<UpsertOutcome> {
        let rows = DataFrame::new(vec![
            Column::new("factor_name".into(), [factor.name()]),
            Column::new("category".into(), [factor.category()]),
            Column::new("definition".into(), [factor.description()]),
        ])?;
        Ok(self
            .gateway
            .upsert(catalog::FACTOR_METADATA_TABLE, &rows, &catalog::FACTOR_METADATA_KEY))
    }

    /// Compute, store metadata, and persist.
    ///
    /// # Errors
    ///
    /// See [`compute`](Self::compute) and [`persist_factor`](Self::persist_factor).
    pub async fn run(
        &self,
        factor: &dyn Factor,
        symbols: &[Symbol],
        start: Date,
        end: Date,
    ) -> Result<UpsertOutcome> {
        let values = self.compute(factor, symbols, start, end).await?;
        self.register_metadata(factor)?;
        let outcome = self.persist_factor(factor.name(), &values)?;
        info!(factor = factor.name(), rows = outcome.rows(), "factor stored");
        Ok(outcome)
    }
}
