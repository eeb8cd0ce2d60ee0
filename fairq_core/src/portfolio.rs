//! Portfolio Summarizer
//!
//! Aggregates per-risk evaluations into a portfolio view: severity and
//! category counts, total inherent/residual exposure, top risks, a monthly
//! trend, system-wide control effectiveness, cost-impact roll-up and the
//! portfolio loss exceedance curve.
//!
//! Risks that fail evaluation never reach this module; the caller records
//! them as [`ExcludedRisk`] and they are reported alongside the summary.

use crate::cost_impact::{roll_up, CostImpactBreakdown, CostImpactRollup};
use crate::effectiveness::{compose, Composition};
use crate::exceedance::{generate_portfolio_curve, LossExceedanceCurve};
use crate::exposure::RiskExposure;
use crate::policy::{EngineConfig, SeverityThresholds};
use crate::types::{Control, TriangularEstimate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category bucket for risks that name none
pub const UNCATEGORIZED: &str = "uncategorized";

/// Severity band of a risk's residual annualized loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_residual(residual_avg: f64, thresholds: &SeverityThresholds) -> Self {
        if residual_avg >= thresholds.critical {
            Severity::Critical
        } else if residual_avg >= thresholds.high {
            Severity::High
        } else if residual_avg >= thresholds.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    pub fn color_code(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🟢",
        }
    }
}

/// A successfully evaluated risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvaluation {
    pub risk_id: String,
    pub name: String,
    pub category: Option<String>,
    pub identified_at: Option<DateTime<Utc>>,
    pub exposure: RiskExposure,
    pub cost_impact: CostImpactBreakdown,
}

/// A risk left out of the summary and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedRisk {
    pub risk_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRisk {
    pub risk_id: String,
    pub name: String,
    pub severity: Severity,
    pub inherent_avg: f64,
    pub residual_avg: f64,
    pub reduction_ratio: f64,
}

/// Exposure accumulated up to and including one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `YYYY-MM`
    pub period: String,
    /// Risks identified in this month
    pub risk_count: usize,
    pub cumulative_inherent: f64,
    pub cumulative_residual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_risks: usize,
    pub evaluated_risks: usize,
    pub excluded: Vec<ExcludedRisk>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub total_inherent: TriangularEstimate,
    pub total_residual: TriangularEstimate,
    pub reduction_ratio: f64,
    pub top_risks: Vec<RankedRisk>,
    pub trend: Vec<TrendPoint>,
    pub system_effectiveness: Composition,
    pub cost_impact: CostImpactRollup,
    pub loss_exceedance: LossExceedanceCurve,
}

impl PortfolioSummary {
    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Returns the top N evaluations by residual average, largest first
pub fn top_risks(evaluations: &[RiskEvaluation], n: usize, thresholds: &SeverityThresholds) -> Vec<RankedRisk> {
    let mut ranked: Vec<RankedRisk> = evaluations
        .iter()
        .map(|e| RankedRisk {
            risk_id: e.risk_id.clone(),
            name: e.name.clone(),
            severity: Severity::from_residual(e.exposure.residual.avg, thresholds),
            inherent_avg: e.exposure.inherent.avg,
            residual_avg: e.exposure.residual.avg,
            reduction_ratio: e.exposure.reduction_ratio(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.residual_avg
            .total_cmp(&a.residual_avg)
            .then_with(|| a.risk_id.cmp(&b.risk_id))
    });
    ranked.truncate(n);
    ranked
}

/// Monthly cumulative exposure; undated risks are left out
pub fn monthly_trend(evaluations: &[RiskEvaluation]) -> Vec<TrendPoint> {
    let mut months: BTreeMap<String, (usize, f64, f64)> = BTreeMap::new();
    for evaluation in evaluations {
        let Some(at) = evaluation.identified_at else {
            continue;
        };
        let entry = months
            .entry(at.format("%Y-%m").to_string())
            .or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += evaluation.exposure.inherent.avg;
        entry.2 += evaluation.exposure.residual.avg;
    }

    let mut inherent = 0.0;
    let mut residual = 0.0;
    months
        .into_iter()
        .map(|(period, (count, month_inherent, month_residual))| {
            inherent += month_inherent;
            residual += month_residual;
            TrendPoint {
                period,
                risk_count: count,
                cumulative_inherent: inherent,
                cumulative_residual: residual,
            }
        })
        .collect()
}

/// Builds the portfolio summary
///
/// `total_risks` counts every risk considered, including the excluded ones.
/// `all_controls` is the full control catalog used for system effectiveness.
pub fn summarize(
    total_risks: usize,
    evaluations: &[RiskEvaluation],
    excluded: Vec<ExcludedRisk>,
    all_controls: &[Control],
    config: &EngineConfig,
) -> PortfolioSummary {
    let thresholds = &config.portfolio.severity;

    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    for evaluation in evaluations {
        let severity = Severity::from_residual(evaluation.exposure.residual.avg, thresholds);
        *by_severity.entry(severity).or_insert(0) += 1;

        let category = evaluation
            .category
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        *by_category.entry(category).or_insert(0) += 1;
    }

    let total_inherent: TriangularEstimate = evaluations.iter().map(|e| e.exposure.inherent).sum();
    let total_residual: TriangularEstimate = evaluations.iter().map(|e| e.exposure.residual).sum();
    let reduction_ratio = if total_inherent.avg > 0.0 {
        (total_inherent.avg - total_residual.avg) / total_inherent.avg
    } else {
        0.0
    };

    let residuals: Vec<TriangularEstimate> = evaluations.iter().map(|e| e.exposure.residual).collect();
    let loss_exceedance = generate_portfolio_curve(&residuals, None, &config.exceedance);

    let summary = PortfolioSummary {
        total_risks,
        evaluated_risks: evaluations.len(),
        excluded,
        by_severity,
        by_category,
        total_inherent,
        total_residual,
        reduction_ratio,
        top_risks: top_risks(evaluations, config.portfolio.top_risks, thresholds),
        trend: monthly_trend(evaluations),
        system_effectiveness: compose(all_controls, &config.effectiveness),
        cost_impact: roll_up(evaluations.iter().map(|e| &e.cost_impact)),
        loss_exceedance,
    };

    log::info!(
        "[PORTFOLIO] {} of {} risks evaluated, residual avg {:.2} (inherent {:.2})",
        summary.evaluated_risks,
        summary.total_risks,
        summary.total_residual.avg,
        summary.total_inherent.avg
    );
    if !summary.excluded.is_empty() {
        log::warn!("[PORTFOLIO] {} risks excluded from the summary", summary.excluded.len());
    }

    summary
}
