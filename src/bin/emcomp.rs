//! EMCOMP - below-detection imputation CLI
//!
//! Command-line interface for imputing censored values in compositional data.

use clap::{Parser, Subcommand, ValueEnum};
use composable_emcomp::benchmark::{generate_synthetic, MissingMechanism, SyntheticConfig};
use composable_emcomp::censor::DetectionLimits;
use composable_emcomp::data::CompositionMatrix;
use composable_emcomp::error::{ImputeError, Result};
use composable_emcomp::impute::{emcomp_with_config, EmcompConfig};
use composable_emcomp::profile::profile_censoring;
use std::path::PathBuf;

/// CLI-friendly missingness mechanism
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMechanism {
    /// Missing completely at random
    Mcar,
    /// Missing at random (driven by an observed part)
    Mar,
    /// Missing not at random (lowest values censored)
    Mnar,
}

impl From<CliMechanism> for MissingMechanism {
    fn from(mechanism: CliMechanism) -> Self {
        match mechanism {
            CliMechanism::Mcar => MissingMechanism::Mcar,
            CliMechanism::Mar => MissingMechanism::Mar,
            CliMechanism::Mnar => MissingMechanism::Mnar,
        }
    }
}

/// EM imputation of below-detection values in compositional data
#[derive(Parser)]
#[command(name = "emcomp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Impute censored values in a composition TSV
    Impute {
        /// Path to composition TSV (samples as rows, parts as columns)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the imputed TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Detection limit per part as a percentile of its observed values
        #[arg(short, long, conflicts_with = "thresholds")]
        percentile: Option<f64>,

        /// Comma-separated detection limits, one per part
        #[arg(short, long, value_delimiter = ',')]
        thresholds: Option<Vec<f64>>,

        /// Path to EMCOMP configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Convergence tolerance (overrides config)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Maximum EM iterations (overrides config)
        #[arg(long)]
        max_iter: Option<usize>,

        /// Optional path for a JSON run summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Profile the censoring pattern of a composition TSV
    Profile {
        /// Path to composition TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Detection limit per part as a percentile of its observed values
        #[arg(short, long, default_value = "10", conflicts_with = "thresholds")]
        percentile: f64,

        /// Comma-separated detection limits, one per part
        #[arg(short, long, value_delimiter = ',')]
        thresholds: Option<Vec<f64>>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate a synthetic dataset with injected censoring
    Simulate {
        /// Output directory (data.tsv, truth.tsv, config.yaml)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "1000")]
        rows: usize,

        /// Number of parts
        #[arg(short = 'd', long, default_value = "4")]
        parts: usize,

        /// Comma-separated ALR standard deviations (D-1 values)
        #[arg(long, value_delimiter = ',')]
        sigmas: Option<Vec<f64>>,

        /// Proportion of rows made missing in each missing part
        #[arg(long, default_value = "0.1")]
        propnan: f64,

        /// Missingness mechanism
        #[arg(long, value_enum, default_value = "mnar")]
        mechanism: CliMechanism,

        /// Comma-separated parts that receive missing values
        #[arg(long, value_delimiter = ',', default_value = "3")]
        missing_parts: Vec<usize>,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Write an example EMCOMP configuration
    Example {
        /// Output path for example YAML
        #[arg(short, long, default_value = "emcomp.yaml")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Impute {
            input,
            output,
            percentile,
            thresholds,
            config,
            tolerance,
            max_iter,
            summary,
        } => cmd_impute(
            &input,
            &output,
            percentile,
            thresholds,
            config.as_ref(),
            tolerance,
            max_iter,
            summary.as_ref(),
        ),

        Commands::Profile {
            input,
            percentile,
            thresholds,
            format,
        } => cmd_profile(&input, percentile, thresholds, &format),

        Commands::Simulate {
            output,
            rows,
            parts,
            sigmas,
            propnan,
            mechanism,
            missing_parts,
            seed,
        } => cmd_simulate(&output, rows, parts, sigmas, propnan, mechanism, missing_parts, seed),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Detection limits from explicit values or a per-part percentile.
fn resolve_limits(
    data: &CompositionMatrix,
    percentile: Option<f64>,
    thresholds: Option<Vec<f64>>,
) -> Result<DetectionLimits> {
    match (thresholds, percentile) {
        (Some(values), _) => DetectionLimits::new(values),
        (None, Some(p)) => DetectionLimits::from_percentile(data.matrix(), p),
        (None, None) => Err(ImputeError::Configuration(
            "either --percentile or --thresholds is required".to_string(),
        )),
    }
}

/// Impute censored values
#[allow(clippy::too_many_arguments)]
fn cmd_impute(
    input_path: &PathBuf,
    output_path: &PathBuf,
    percentile: Option<f64>,
    thresholds: Option<Vec<f64>>,
    config_path: Option<&PathBuf>,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    summary_path: Option<&PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            eprintln!("Loading configuration from {:?}...", path);
            EmcompConfig::from_yaml(&std::fs::read_to_string(path)?)?
        }
        None => EmcompConfig::default(),
    };
    if let Some(tol) = tolerance {
        config = config.with_tolerance(tol);
    }
    if let Some(max) = max_iter {
        config = config.with_max_iterations(max);
    }

    eprintln!("Loading data...");
    let data = CompositionMatrix::from_tsv(input_path)?;
    eprintln!(
        "  {} samples x {} parts, {} censored cells",
        data.n_rows(),
        data.n_parts(),
        data.n_missing()
    );

    let limits = resolve_limits(&data, percentile, thresholds)?;
    eprintln!("  Detection limits: {:?}", limits.values());

    eprintln!("Running EMCOMP...");
    let result = emcomp_with_config(&data, &limits, &config)?;

    eprintln!("Writing imputed data to {:?}...", output_path);
    result.imputed.to_tsv(output_path)?;

    let summary = result.summary();
    if let Some(path) = summary_path {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        eprintln!("Wrote summary to {:?}", path);
    }

    eprintln!(
        "Done! {} cells imputed in {} rows (p0 = {:.3}), {} iterations",
        summary.n_imputed_cells, summary.n_censored, summary.p0, summary.iterations
    );
    if !result.converged() {
        eprintln!("  Warning: iteration cap reached before convergence");
    }

    Ok(())
}

/// Profile the censoring pattern
fn cmd_profile(
    input_path: &PathBuf,
    percentile: f64,
    thresholds: Option<Vec<f64>>,
    format: &str,
) -> Result<()> {
    eprintln!("Loading data...");
    let data = CompositionMatrix::from_tsv(input_path)?;
    let limits = resolve_limits(&data, Some(percentile), thresholds)?;
    let profile = profile_censoring(&data, &limits, true)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&profile)?),
        "text" => print!("{}", profile),
        other => {
            return Err(ImputeError::Configuration(format!(
                "unknown format '{}', expected text or json",
                other
            )))
        }
    }

    Ok(())
}

/// Generate synthetic data
#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    output_dir: &PathBuf,
    rows: usize,
    parts: usize,
    sigmas: Option<Vec<f64>>,
    propnan: f64,
    mechanism: CliMechanism,
    missing_parts: Vec<usize>,
    seed: u64,
) -> Result<()> {
    let mut config = SyntheticConfig::new("simulated")
        .with_dimensions(rows, parts)
        .with_missing(propnan, mechanism.into(), missing_parts)
        .with_seed(seed);
    if let Some(sigmas) = sigmas {
        config = config.with_sigmas(sigmas);
    }

    eprintln!(
        "Generating {} x {} compositions ({:?}, {:.1}% missing per part)...",
        rows,
        parts,
        config.mechanism,
        propnan * 100.0
    );
    let synth = generate_synthetic(&config)?;
    synth.write_to_dir(output_dir)?;

    eprintln!(
        "Wrote {} missing cells (p0 = {:.3}) to {:?}",
        synth.n_missing(),
        synth.p0(),
        output_dir
    );

    Ok(())
}

/// Generate example configuration
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let yaml = EmcompConfig::default().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
