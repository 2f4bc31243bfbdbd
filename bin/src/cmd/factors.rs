//! `factors`: list the registered factors.

use strata_factors::{FactorCategory, available_factors};

/// List factors grouped by category, optionally filtered.
pub(crate) fn list_factors(category: Option<String>, verbose: bool) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Available Factors                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let factors = available_factors();
    for cat in FactorCategory::ALL {
        if let Some(ref filter) = category
            && !cat.label().contains(&filter.to_lowercase())
        {
            continue;
        }

        let in_category: Vec<_> = factors.iter().filter(|f| f.category == cat).collect();
        if in_category.is_empty() {
            continue;
        }

        println!("{} ({}):", cat, cat.description());
        println!("{}", "-".repeat(60));
        for factor in in_category {
            if verbose {
                println!(
                    "  {:22} - {} (lookback: {} days, endpoints: {})",
                    factor.name,
                    factor.description,
                    factor.lookback_days,
                    factor.endpoints.join(", ")
                );
            } else {
                println!("  {}", factor.name);
            }
        }
        println!();
    }

    if !verbose {
        println!("Use --verbose for detailed factor descriptions.\n");
    }
}
