//! Seeded random-sample-consensus driver shared by the epipolar filter and the homography fit.
//!
//! The RNG is seeded from the caller's options, so the same data always produces the
//! same model and the same inlier set.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// A model that can be fitted from a minimal sample and scored per datum.
pub(crate) trait Estimator {
    type Datum;
    type Model;

    const MIN_SAMPLES: usize;

    /// Fits a model to the data at `indices`, or `None` if the sample cannot define one.
    fn fit(data: &[Self::Datum], indices: &[usize]) -> Option<Self::Model>;

    /// Residual of one datum under `model`, in pixels.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Rejects samples that are degenerate before fitting.
    fn is_degenerate(_data: &[Self::Datum], _indices: &[usize]) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RansacOptions {
    pub threshold: f64,
    pub confidence: f64,
    pub max_iterations: usize,
    pub seed: u64,
}

#[derive(Debug)]
pub(crate) struct Consensus<M> {
    pub model: M,
    /// Inlier indices in ascending (input) order.
    pub inliers: Vec<usize>,
    pub iterations: usize,
}

/// Runs the consensus loop and refits on the best inlier set.
///
/// Returns `None` when no sample produced a model with at least `MIN_SAMPLES` inliers.
pub(crate) fn ransac_fit<E: Estimator>(
    data: &[E::Datum],
    opts: &RansacOptions,
) -> Option<Consensus<E::Model>> {
    let n = data.len();
    if n < E::MIN_SAMPLES {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut best: Option<(E::Model, Vec<usize>)> = None;
    let mut required = opts.max_iterations;
    let mut iterations = 0;

    while iterations < required.min(opts.max_iterations) {
        iterations += 1;

        let mut sample = rand::seq::index::sample(&mut rng, n, E::MIN_SAMPLES).into_vec();
        sample.sort_unstable();
        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        let inliers = collect_inliers::<E>(&model, data, opts.threshold);
        let best_count = best.as_ref().map_or(0, |(_, b)| b.len());
        if inliers.len() > best_count && inliers.len() >= E::MIN_SAMPLES {
            required = required_iterations(
                inliers.len() as f64 / n as f64,
                E::MIN_SAMPLES,
                opts.confidence,
                opts.max_iterations,
            );
            best = Some((model, inliers));
        }
    }

    let (model, inliers) = best?;
    log::trace!(
        "consensus after {} iterations: {}/{} inliers",
        iterations,
        inliers.len(),
        n
    );

    // Refit on the whole consensus set and keep the result only if it does not lose support.
    let refined = E::fit(data, &inliers).and_then(|refit| {
        let refit_inliers = collect_inliers::<E>(&refit, data, opts.threshold);
        (refit_inliers.len() >= inliers.len()).then_some((refit, refit_inliers))
    });
    let (model, inliers) = refined.unwrap_or((model, inliers));

    Some(Consensus {
        model,
        inliers,
        iterations,
    })
}

fn collect_inliers<E: Estimator>(
    model: &E::Model,
    data: &[E::Datum],
    threshold: f64,
) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, datum)| {
            let r = E::residual(model, datum);
            r.is_finite() && r <= threshold
        })
        .map(|(i, _)| i)
        .collect()
}

/// Iterations needed to draw one all-inlier sample with probability `confidence`.
fn required_iterations(
    inlier_ratio: f64,
    sample_size: usize,
    confidence: f64,
    max_iterations: usize,
) -> usize {
    let all_inliers = inlier_ratio.powi(sample_size as i32);
    if all_inliers >= 1.0 - f64::EPSILON {
        return 1;
    }
    if all_inliers <= f64::EPSILON {
        return max_iterations;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - all_inliers).ln();
    if needed.is_finite() {
        (needed.ceil() as usize).clamp(1, max_iterations)
    } else {
        max_iterations
    }
}
