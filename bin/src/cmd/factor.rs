//! `factor`: compute a factor and store it.

use crate::context;
use anyhow::{Result, anyhow};
use strata_factors::{
    FactorRunner, IndustryClassification, PreprocessConfig, create_factor, preprocess,
};
use strata_sync::GapFillOrchestrator;
use strata_traits::{Date, Symbol};
use tracing::{info, warn};

/// How raw values are treated before storing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Treatment {
    /// Store as computed.
    Raw,
    /// Winsorize and standardize per date.
    Standardize,
    /// Standardize after regressing out size and industry.
    Neutralize,
}

/// Compute `name` for `symbols` over `[start, end]` and write it to `factor_panel_data`.
pub(crate) async fn run_factor(
    db: &str,
    name: &str,
    symbols: &[Symbol],
    start: Date,
    end: Date,
    treatment: Treatment,
) -> Result<()> {
    let factor = create_factor(name)
        .ok_or_else(|| anyhow!("unknown factor '{name}', see `strata factors`"))?;

    let gateway = context::open_gateway(db)?;
    let orchestrator = GapFillOrchestrator::new(context::provider()?, gateway.clone());
    let runner = FactorRunner::new(orchestrator, gateway.clone());

    let values = match treatment {
        Treatment::Raw => runner.compute(factor.as_ref(), symbols, start, end).await?,
        Treatment::Standardize => {
            let values = runner.compute(factor.as_ref(), symbols, start, end).await?;
            info!(factor = name, "preprocessing cross-sections");
            preprocess(&values, factor.name(), &PreprocessConfig::default())?
        }
        Treatment::Neutralize => {
            let industries = IndustryClassification::load(gateway.store().as_ref(), symbols)?;
            if industries.is_empty() {
                warn!("no industry data, run `strata load-industry` or `strata load-basics`; neutralizing on size only");
            }
            runner
                .compute_neutralized(factor.as_ref(), symbols, start, end, &industries)
                .await?
        }
    };
    runner.register_metadata(factor.as_ref())?;
    let outcome = runner.persist_factor(factor.name(), &values)?;

    println!("Factor:   {} ({})", factor.name(), factor.category());
    println!("Symbols:  {}", symbols.join(", "));
    println!("Window:   {start} .. {end}");
    println!("Treated:  {treatment:?}");
    println!("Stored:   {} rows", outcome.rows());
    Ok(())
}
