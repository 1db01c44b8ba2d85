//! EMCOMP: EM imputation of below-detection values in compositional data.
//!
//! The run proceeds as:
//!
//! 1. **Initialize** - classify rows, seed censored cells with placeholders,
//!    ALR-transform usable rows, estimate starting moments (complete rows only
//!    when there are enough of them, otherwise all usable rows).
//! 2. **Iterate** - refresh censored coordinates with their truncated
//!    conditional expectations, re-estimate the moments with the
//!    conditional-variance correction, and compare with the previous moments.
//! 3. **Finish** - stop when the change drops below the tolerance
//!    ([`EmStatus::Converged`]) or the iteration cap is hit
//!    ([`EmStatus::MaxIterationsReached`]), then back-transform the censored
//!    cells. Any estimation error aborts the run without a result.
//!
//! All state is local to one call.

use crate::censor::{classify_rows, DetectionLimits};
use crate::data::CompositionMatrix;
use crate::error::{ImputeError, Result};
use crate::estep::{censoring_bounds, expectation_step};
use crate::impute::config::{Closure, EmcompConfig};
use crate::impute::result::{EmStatus, ImputeResult};
use crate::moments::estimate_moments;
use crate::transform::{close_multiplicative, infer_total, select_reference, AlrTransform};
use crate::zero::seed_placeholders;
use nalgebra::DMatrix;

/// Run EMCOMP with the default configuration.
///
/// # Example
/// ```ignore
/// use composable_emcomp::prelude::*;
///
/// let data = CompositionMatrix::from_tsv("assays.tsv")?;
/// let limits = DetectionLimits::from_percentile(data.matrix(), 10.0)?;
/// let result = emcomp(&data, &limits)?;
/// println!("{} iterations, p0 = {:.2}", result.iterations, result.p0);
/// ```
pub fn emcomp(matrix: &CompositionMatrix, limits: &DetectionLimits) -> Result<ImputeResult> {
    emcomp_with_config(matrix, limits, &EmcompConfig::default())
}

/// Run EMCOMP on a bare matrix with explicit thresholds, tolerance and
/// iteration cap. Censored cells are `NaN` (or zero).
pub fn emcomp_dense(
    data: &DMatrix<f64>,
    thresholds: &[f64],
    tolerance: f64,
    max_iterations: usize,
) -> Result<ImputeResult> {
    let matrix = CompositionMatrix::from_matrix(data.clone());
    let limits = DetectionLimits::new(thresholds.to_vec())?;
    let config = EmcompConfig::default()
        .with_tolerance(tolerance)
        .with_max_iterations(max_iterations);
    emcomp_with_config(&matrix, &limits, &config)
}

/// Run EMCOMP with a custom configuration.
///
/// Every imputed cell lies strictly between 0 and its detection limit. With
/// the default [`Closure::PreserveObserved`] observed cells are returned bit
/// for bit and rows are not re-closed, so imputed rows need not sum to the
/// total; use [`Closure::Multiplicative`] when rows must stay on the simplex.
///
/// # Errors
/// - `Configuration` / `InvalidValue` for malformed inputs (checked before any
///   estimation)
/// - `Configuration` if no part is observed in every usable row while the
///   reference part is [`ReferencePart::Auto`](crate::transform::ReferencePart),
///   or if an explicit reference part is censored somewhere
/// - `InsufficientData` if fewer than D usable rows remain
/// - `SingularCovariance` if an observed sub-covariance cannot be factorized
///   during an E-step; the run stops without a result
pub fn emcomp_with_config(
    matrix: &CompositionMatrix,
    limits: &DetectionLimits,
    config: &EmcompConfig,
) -> Result<ImputeResult> {
    config.validate()?;
    let data = matrix.matrix();
    let n_parts = data.ncols();

    // === Initialize ===
    let pattern = classify_rows(data, limits, config.zeros_as_censored)?;
    let reference = select_reference(&pattern, config.reference)?;
    let complete = pattern.complete_mask();
    let usable = pattern.usable_mask();

    let total = match (config.total, config.closure) {
        (Some(total), _) => total,
        (None, Closure::PreserveObserved) => infer_total(data, &complete).unwrap_or(1.0),
        (None, Closure::Multiplicative) => infer_total(data, &complete).ok_or_else(|| {
            ImputeError::Configuration(
                "multiplicative closure needs a total or at least one complete row".to_string(),
            )
        })?,
    };
    let transform = AlrTransform::new(n_parts, reference, total)?;
    let dim = transform.dim();

    log::info!(
        "EMCOMP: {} rows x {} parts; {} complete, {} censored, {} unusable; reference part {}",
        pattern.n_rows(),
        n_parts,
        pattern.n_complete(),
        pattern.n_censored(),
        pattern.n_unusable(),
        matrix.part_ids()[reference]
    );

    let seeded = seed_placeholders(data, &pattern, limits, config.placeholder_fraction)?;
    let mut y = transform.forward_rows(&seeded, &usable)?;
    let bounds = censoring_bounds(data, &pattern, limits, &transform);

    let mut moments = if pattern.n_complete() > dim {
        estimate_moments(&y, &complete, None)?
    } else {
        log::debug!("too few complete rows; starting from placeholder-seeded rows");
        estimate_moments(&y, &usable, None)?
    };

    // === Iterate ===
    let mut history = Vec::new();
    let mut iterations = 0;
    let status = loop {
        iterations += 1;

        let sweep = expectation_step(&y, &bounds, &pattern, &transform, &moments, config.parallel)?;
        let correction = sweep.total_correction(dim);
        let updated = estimate_moments(&sweep.completed, &usable, Some(&correction))?;

        let change = updated.change(&moments, config.metric);
        history.push(change);
        log::debug!("iteration {}: change = {:.3e}", iterations, change);

        y = sweep.completed;
        moments = updated;

        if change < config.tolerance {
            break EmStatus::Converged;
        }
        if iterations >= config.max_iterations {
            break EmStatus::MaxIterationsReached;
        }
    };

    match status {
        EmStatus::Converged => log::info!("EMCOMP converged after {} iterations", iterations),
        EmStatus::MaxIterationsReached => log::warn!(
            "EMCOMP did not converge within {} iterations (last change {:.3e})",
            iterations,
            history.last().copied().unwrap_or(f64::NAN)
        ),
    }

    // === Back-transform ===
    let mut imputed = data.clone();
    for (i, row) in pattern.rows().iter().enumerate() {
        if !row.is_censored() {
            continue;
        }
        let parts = transform.inverse_anchored(&y.row(i).transpose(), data[(i, reference)]);
        for &j in row.censored_parts() {
            imputed[(i, j)] = below_limit(parts[j], limits.get(j));
        }
        if config.closure == Closure::Multiplicative {
            let mut values: Vec<f64> = imputed.row(i).iter().copied().collect();
            close_multiplicative(&mut values, row.censored_parts(), total)?;
            for (j, v) in values.into_iter().enumerate() {
                imputed[(i, j)] = v;
            }
        }
    }

    let censored_rows = pattern.censored_mask();
    let p0 = pattern.proportion_censored();

    Ok(ImputeResult {
        imputed: matrix.with_values(imputed)?,
        pattern,
        censored_rows,
        p0,
        iterations,
        status,
        moments,
        reference_part: reference,
        history,
    })
}

/// Keep a back-transformed cell inside `(0, limit)`; `exp` can land on the
/// limit itself or underflow to zero.
fn below_limit(value: f64, limit: f64) -> f64 {
    value.max(f64::MIN_POSITIVE).min(limit * (1.0 - f64::EPSILON))
}
