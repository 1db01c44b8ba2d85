//! Basic example demonstrating EMCOMP imputation.
//!
//! This example shows how to:
//! 1. Generate synthetic compositions with below-detection values
//! 2. Profile the censoring pattern
//! 3. Impute the censored cells
//! 4. Compare imputed values with the values that were removed

use composable_emcomp::prelude::*;

fn main() -> Result<()> {
    println!("=== Composable EMCOMP Example ===\n");

    // 1000 four-part compositions, lowest 10% of part 3 removed
    let synth = generate_synthetic(&SyntheticConfig::default())?;
    let data = &synth.data;

    println!("Data dimensions:");
    println!("  Samples: {}", data.n_rows());
    println!("  Parts:   {}", data.n_parts());
    println!();

    // Detection limits at the 10th percentile of each part's observed values
    let limits = DetectionLimits::from_percentile(data.matrix(), 10.0)?;

    println!("=== Censoring Profile ===\n");
    let profile = profile_censoring(data, &limits, true)?;
    println!("{}", profile);

    println!("=== Running EMCOMP ===\n");
    let config = EmcompConfig::default().with_tolerance(0.01);
    let result = emcomp_with_config(data, &limits, &config)?;
    println!("{}", result.summary());

    println!("Change per iteration:");
    for (i, change) in result.history.iter().enumerate() {
        println!("  {:>3}: {:.3e}", i + 1, change);
    }
    println!();

    // Compare with the removed values
    println!("=== First 10 Imputed Cells ===\n");
    println!(
        "{:<8} {:>12} {:>12} {:>12}",
        "Sample", "Imputed", "True", "Limit"
    );
    println!("{}", "-".repeat(47));

    let threshold = limits.get(3);
    let imputed_rows = (0..data.n_rows()).filter(|&i| synth.missing[(i, 3)]);
    for i in imputed_rows.take(10) {
        println!(
            "{:<8} {:>12.5} {:>12.5} {:>12.5}",
            data.sample_ids()[i],
            result.imputed.get(i, 3),
            synth.truth[(i, 3)],
            threshold
        );
    }

    println!("\n=== Configuration (YAML) ===\n");
    println!("{}", config.to_yaml()?);

    Ok(())
}
