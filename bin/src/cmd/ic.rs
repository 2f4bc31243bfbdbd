//! `ic`: IC analysis of a stored factor.

use crate::{OutputFormat, context};
use anyhow::Result;
use strata_eval::{IcAnalyzer, IcConfig, IcSummary};
use strata_traits::Date;

/// Analyse `factor` against next-day returns from the price table.
pub(crate) fn analyze(
    db: &str,
    factor: &str,
    start: Option<Date>,
    end: Option<Date>,
    min_observations: usize,
    format: OutputFormat,
) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let config = IcConfig {
        min_observations,
        ..IcConfig::default()
    };
    let report = IcAnalyzer::with_config(gateway.store().clone(), config).analyze(factor, start, end)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("IC ANALYSIS: {} (returns from {})", report.factor, report.price_column);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
            println!("{:18} {:>10} {:>10}", "", "IC", "Rank IC");
            print_row("Mean", &report.ic, &report.rank_ic, |s| s.mean);
            print_row("Std", &report.ic, &report.rank_ic, |s| s.std);
            print_row("IC-IR", &report.ic, &report.rank_ic, |s| s.ic_ir);
            print_row("t-stat", &report.ic, &report.rank_ic, |s| s.t_stat);
            print_row("Positive ratio", &report.ic, &report.rank_ic, |s| s.positive_ratio);
            println!("{:18} {:>10} {:>10}", "Periods", report.ic.periods, report.rank_ic.periods);
        }
    }
    Ok(())
}

fn print_row(label: &str, ic: &IcSummary, rank_ic: &IcSummary, pick: impl Fn(&IcSummary) -> f64) {
    println!("{label:18} {:>10.4} {:>10.4}", pick(ic), pick(rank_ic));
}
