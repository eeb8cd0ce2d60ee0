//! Loss Exceedance Curve Generator
//!
//! Approximates a loss exceedance curve from the residual triangle alone,
//! without Monte-Carlo sampling. The curve passes through the configured
//! anchors (by default `(0.95, min*0.3)`, `(0.75, avg*0.7)`, `(0.50, avg)`,
//! `(0.10, max)`) and is filled in by linear interpolation between them.
//!
//! Portfolio curves add the per-risk losses at matching probabilities. That is
//! an independent-sum approximation, not a convolution of the distributions.

use crate::error::{EngineError, Result};
use crate::policy::{AnchorStatistic, ExceedancePolicy};
use crate::types::TriangularEstimate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceedancePoint {
    /// Probability that annual loss exceeds `loss_amount`
    pub probability: f64,
    pub loss_amount: f64,
}

impl ExceedancePoint {
    pub const fn new(probability: f64, loss_amount: f64) -> Self {
        Self {
            probability,
            loss_amount,
        }
    }
}

/// Ordered exceedance points: probability strictly falls as loss strictly rises
///
/// An empty curve means "no material risk" and is not an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossExceedanceCurve {
    pub points: Vec<ExceedancePoint>,
    /// Implied 90th percentile of annual loss
    pub percentile_90: Option<f64>,
}

impl LossExceedanceCurve {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a curve from externally supplied points, rejecting non-monotone input
    pub fn from_points(name: &str, points: Vec<ExceedancePoint>) -> Result<Self> {
        for point in &points {
            if !(0.0..=1.0).contains(&point.probability) {
                return Err(EngineError::out_of_range(
                    format!("curve {}.probability", name),
                    point.probability,
                    "a probability in [0, 1]",
                ));
            }
            if !point.loss_amount.is_finite() || point.loss_amount < 0.0 {
                return Err(EngineError::out_of_range(
                    format!("curve {}.lossAmount", name),
                    point.loss_amount,
                    "a finite, non-negative amount",
                ));
            }
        }

        if let Some(index) = points.windows(2).position(|w| !is_ordered(&w[0], &w[1])) {
            return Err(EngineError::NonMonotoneCurve {
                name: name.to_string(),
                index: index + 1,
            });
        }

        Ok(Self {
            points,
            percentile_90: None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Loss amount at the given exceedance probability, clamped to the curve ends
    pub fn loss_at(&self, probability: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if probability >= first.probability {
            return Some(first.loss_amount);
        }
        if probability <= last.probability {
            return Some(last.loss_amount);
        }

        self.points.windows(2).find_map(|w| {
            let (hi, lo) = (w[0], w[1]);
            (probability <= hi.probability && probability >= lo.probability).then(|| {
                let t = (hi.probability - probability) / (hi.probability - lo.probability);
                lerp(hi.loss_amount, lo.loss_amount, t)
            })
        })
    }

    /// Probability that annual loss exceeds `loss`, clamped to the curve ends
    pub fn probability_of_exceeding(&self, loss: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if loss <= first.loss_amount {
            return Some(first.probability);
        }
        if loss >= last.loss_amount {
            return Some(last.probability);
        }

        self.points.windows(2).find_map(|w| {
            let (lo, hi) = (w[0], w[1]);
            (loss >= lo.loss_amount && loss <= hi.loss_amount).then(|| {
                let t = (loss - lo.loss_amount) / (hi.loss_amount - lo.loss_amount);
                lerp(lo.probability, hi.probability, t)
            })
        })
    }
}

fn is_ordered(a: &ExceedancePoint, b: &ExceedancePoint) -> bool {
    b.probability < a.probability && b.loss_amount > a.loss_amount
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Implied 90th percentile: `avg + share * (max - avg)`
pub fn implied_percentile_90(residual: &TriangularEstimate, policy: &ExceedancePolicy) -> f64 {
    residual.avg + policy.p90_tail_share * (residual.max - residual.avg)
}

/// Anchor points for a residual triangle
///
/// Anchors that would not strictly increase the loss (e.g. `avg == max`) are
/// dropped so the ordering guarantee holds for degenerate triangles.
pub fn anchors(residual: &TriangularEstimate, policy: &ExceedancePolicy) -> Vec<ExceedancePoint> {
    let mut points: Vec<ExceedancePoint> = Vec::with_capacity(policy.anchors.len());
    for anchor in &policy.anchors {
        let statistic = match anchor.statistic {
            AnchorStatistic::Min => residual.min,
            AnchorStatistic::Avg => residual.avg,
            AnchorStatistic::Max => residual.max,
        };
        let point = ExceedancePoint::new(anchor.probability, statistic * anchor.factor);
        match points.last() {
            Some(previous) if !is_ordered(previous, &point) => {
                log::debug!(
                    "[EXCEEDANCE] Dropping anchor p={} loss={} (not above {})",
                    point.probability,
                    point.loss_amount,
                    previous.loss_amount
                );
            }
            _ => points.push(point),
        }
    }
    points
}

/// Spreads `resolution - anchors` extra points evenly over the anchor segments
fn densify(anchors: &[ExceedancePoint], resolution: usize) -> Vec<ExceedancePoint> {
    if anchors.len() < 2 || resolution <= anchors.len() {
        return anchors.to_vec();
    }

    let segments = anchors.len() - 1;
    let extra = resolution - anchors.len();
    let mut points = Vec::with_capacity(resolution);

    for (i, pair) in anchors.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let inner = extra / segments + usize::from(i < extra % segments);
        points.push(start);
        for j in 1..=inner {
            let t = j as f64 / (inner + 1) as f64;
            points.push(ExceedancePoint::new(
                lerp(start.probability, end.probability, t),
                lerp(start.loss_amount, end.loss_amount, t),
            ));
        }
    }
    points.extend(anchors.last().copied());
    points
}

/// Generates the exceedance curve for one residual triangle
///
/// `resolution` is clamped into the configured point range. A zero residual
/// average yields an empty curve.
pub fn generate_curve(
    residual: &TriangularEstimate,
    resolution: Option<usize>,
    policy: &ExceedancePolicy,
) -> LossExceedanceCurve {
    if residual.avg <= 0.0 {
        log::debug!("[EXCEEDANCE] Zero residual average; no exceedance curve");
        return LossExceedanceCurve::empty();
    }

    let points = densify(&anchors(residual, policy), policy.resolution(resolution));
    LossExceedanceCurve {
        points,
        percentile_90: Some(implied_percentile_90(residual, policy)),
    }
}

/// Probabilities every portfolio member is sampled at
fn probability_grid(policy: &ExceedancePolicy, resolution: usize) -> Vec<f64> {
    let skeleton: Vec<ExceedancePoint> = policy
        .anchors
        .iter()
        .enumerate()
        .map(|(i, a)| ExceedancePoint::new(a.probability, i as f64))
        .collect();
    densify(&skeleton, resolution)
        .into_iter()
        .map(|p| p.probability)
        .collect()
}

/// Aggregates per-risk residual triangles into one portfolio curve
pub fn generate_portfolio_curve(
    residuals: &[TriangularEstimate],
    resolution: Option<usize>,
    policy: &ExceedancePolicy,
) -> LossExceedanceCurve {
    let resolution = policy.resolution(resolution);
    let curves: Vec<LossExceedanceCurve> = residuals
        .iter()
        .map(|r| generate_curve(r, Some(resolution), policy))
        .filter(|c| !c.is_empty())
        .collect();

    if curves.is_empty() {
        return LossExceedanceCurve::empty();
    }

    let mut points: Vec<ExceedancePoint> = Vec::with_capacity(resolution);
    for probability in probability_grid(policy, resolution) {
        let loss: f64 = curves.iter().filter_map(|c| c.loss_at(probability)).sum();
        let point = ExceedancePoint::new(probability, loss);
        if points.last().map_or(true, |previous| is_ordered(previous, &point)) {
            points.push(point);
        }
    }

    let percentile_90 = curves.iter().filter_map(|c| c.percentile_90).sum();
    log::info!(
        "[EXCEEDANCE] Portfolio curve from {} risks, {} points",
        curves.len(),
        points.len()
    );

    LossExceedanceCurve {
        points,
        percentile_90: Some(percentile_90),
    }
}

/// An externally supplied reference curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCurve {
    pub name: String,
    pub curve: LossExceedanceCurve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveDelta {
    pub probability: f64,
    pub current_loss: f64,
    pub previous_loss: f64,
    pub change: f64,
}

/// Current curve next to an optional previous period and benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveComparison {
    pub current: LossExceedanceCurve,
    pub previous: Option<LossExceedanceCurve>,
    pub benchmarks: Vec<NamedCurve>,
    /// Loss change at each point of the current curve
    pub deltas: Vec<CurveDelta>,
}

/// Builds a comparison report; benchmarks must be valid exceedance curves
pub fn compare_curves(
    current: &TriangularEstimate,
    previous: Option<&TriangularEstimate>,
    benchmarks: Vec<NamedCurve>,
    resolution: Option<usize>,
    policy: &ExceedancePolicy,
) -> Result<CurveComparison> {
    for benchmark in &benchmarks {
        LossExceedanceCurve::from_points(&benchmark.name, benchmark.curve.points.clone())?;
    }

    let current_curve = generate_curve(current, resolution, policy);
    let previous_curve = previous.map(|p| generate_curve(p, resolution, policy));

    let deltas = match &previous_curve {
        Some(prev) if !prev.is_empty() => current_curve
            .points
            .iter()
            .filter_map(|point| {
                let previous_loss = prev.loss_at(point.probability)?;
                Some(CurveDelta {
                    probability: point.probability,
                    current_loss: point.loss_amount,
                    previous_loss,
                    change: point.loss_amount - previous_loss,
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(CurveComparison {
        current: current_curve,
        previous: previous_curve,
        benchmarks,
        deltas,
    })
}
