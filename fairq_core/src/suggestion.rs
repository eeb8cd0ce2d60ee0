//! Control Suggestion Ranker
//!
//! Suggests catalog controls for a risk by matching the risk's threat and
//! vulnerability keywords against declared control/risk mappings, then prices
//! each candidate: the risk reduction it would bring if fully implemented,
//! its annualized cost, ROI and payback period.

use crate::effectiveness::compose;
use crate::exposure::calculate_exposure;
use crate::policy::{EngineConfig, SuggestionPolicy};
use crate::types::{
    Control, ControlRiskMapping, ControlType, ImpactCategory, ImplementationStatus, Risk,
    RiskParameters,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static word pattern"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "that", "this", "these", "those", "are",
    "was", "were", "via", "not", "any", "all", "its", "our", "their", "has", "have", "can", "may",
];

const MIN_TOKEN_LEN: usize = 3;

/// Lower-cased keywords of `text`: alphanumeric words of 3+ chars minus stop words
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Keywords describing a risk's threat community and vulnerability
pub fn risk_keywords(risk: &Risk) -> BTreeSet<String> {
    let mut keywords = tokenize(&risk.threat_community);
    keywords.extend(tokenize(&risk.vulnerability));
    keywords
}

/// Keywords a mapping declares
pub fn mapping_keywords(mapping: &ControlRiskMapping) -> BTreeSet<String> {
    let mut keywords = tokenize(&mapping.threat_community);
    keywords.extend(tokenize(&mapping.vulnerability_pattern));
    keywords
}

/// Match score in `[0, 100]` between a risk's keywords and one mapping
pub fn match_score(risk_keywords: &BTreeSet<String>, mapping: &ControlRiskMapping) -> f64 {
    let declared = mapping_keywords(mapping);
    if declared.is_empty() {
        return 0.0;
    }
    let shared = declared.intersection(risk_keywords).count();
    let overlap = shared as f64 / declared.len() as f64;
    (100.0 * overlap * mapping.relevance_score).clamp(0.0, 100.0)
}

/// Side of the risk equation a control acts on
pub fn classify_impact(control: &Control, mapping: Option<&ControlRiskMapping>) -> ImpactCategory {
    if let Some(impact) = mapping.and_then(|m| m.impact_type) {
        return impact;
    }

    if control.has_explicit_coefficients() {
        let positive = |c: Option<f64>| c.is_some_and(|v| v > 0.0);
        let likelihood = positive(control.e_avoid) || positive(control.e_deter);
        let magnitude = positive(control.e_detect) || positive(control.e_resist);
        return match (likelihood, magnitude) {
            (true, true) => ImpactCategory::Both,
            (true, false) => ImpactCategory::Likelihood,
            _ => ImpactCategory::Magnitude,
        };
    }

    match control.control_type {
        ControlType::Preventive | ControlType::Detective => ImpactCategory::Likelihood,
        ControlType::Corrective => ImpactCategory::Magnitude,
    }
}

/// A ratio that may have no finite value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Finite(f64),
    /// Unlimited upside: a free control, or one that eliminates the residual
    Unbounded,
    /// The control does not lower the residual, so the ratio is meaningless
    NoReduction,
}

impl Metric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Finite(v) => Some(*v),
            Metric::Unbounded | Metric::NoReduction => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Metric::Unbounded)
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Metric::NoReduction)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Finite(v) => write!(f, "{:.1}", v),
            Metric::Unbounded => write!(f, "unbounded"),
            Metric::NoReduction => write!(f, "n/a (no reduction)"),
        }
    }
}

/// ROI in percent of the annualized cost
pub fn return_on_investment(reduction: f64, cost: f64) -> Metric {
    if reduction <= 0.0 {
        Metric::NoReduction
    } else if cost > 0.0 {
        Metric::Finite((reduction - cost) / cost * 100.0)
    } else {
        Metric::Unbounded
    }
}

/// Months until the monthly reduction pays back the annualized cost
pub fn payback_months(reduction: f64, cost: f64) -> Metric {
    if reduction <= 0.0 {
        Metric::NoReduction
    } else {
        Metric::Finite(cost / (reduction / 12.0))
    }
}

/// Reduction, ROI and payback of moving from one residual to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    /// Signed; negative when the control makes the composed residual worse
    pub reduction: f64,
    pub annualized_cost: f64,
    pub roi: Metric,
    pub payback_months: Metric,
}

/// Prices a control that takes the residual from `before` to `after`
///
/// A control that removes a positive residual entirely has unbounded ROI
/// whatever it costs.
pub fn price_control(before: f64, after: f64, cost: f64) -> Pricing {
    let reduction = before - after;
    let eliminated = before > 0.0 && after <= 0.0;
    Pricing {
        reduction,
        annualized_cost: cost,
        roi: if eliminated {
            Metric::Unbounded
        } else {
            return_on_investment(reduction, cost)
        },
        payback_months: payback_months(reduction, cost),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_roi(roi: Metric, policy: &SuggestionPolicy) -> Self {
        match roi {
            Metric::Unbounded => Priority::High,
            Metric::Finite(v) if v > policy.high_priority_roi => Priority::High,
            Metric::Finite(v) if v > policy.medium_priority_roi => Priority::Medium,
            Metric::Finite(_) | Metric::NoReduction => Priority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSuggestion {
    pub control_id: String,
    pub control_name: String,
    pub match_score: f64,
    pub priority: Priority,
    pub estimated_risk_reduction: f64,
    pub annualized_control_cost: f64,
    pub roi: Metric,
    pub payback_months: Metric,
    pub impact_category: ImpactCategory,
    pub reasoning: String,
    /// Already linked to the risk; shown for reference, never ranked
    pub is_associated: bool,
}

/// Ranked suggestions for one risk, bucketed by impact category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSuggestionBuckets {
    pub risk_id: String,
    pub current_residual: f64,
    pub likelihood_controls: Vec<ControlSuggestion>,
    pub magnitude_controls: Vec<ControlSuggestion>,
    pub both_controls: Vec<ControlSuggestion>,
    pub associated_control_ids: Vec<String>,
    /// Associated controls that match the risk, priced by the reduction they
    /// deliver today
    pub associated_controls: Vec<ControlSuggestion>,
}

impl ControlSuggestionBuckets {
    pub fn total(&self) -> usize {
        self.likelihood_controls.len() + self.magnitude_controls.len() + self.both_controls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlSuggestion> {
        self.likelihood_controls
            .iter()
            .chain(&self.magnitude_controls)
            .chain(&self.both_controls)
    }
}

fn ranking_order(a: &ControlSuggestion, b: &ControlSuggestion) -> Ordering {
    b.match_score
        .total_cmp(&a.match_score)
        .then_with(|| b.estimated_risk_reduction.total_cmp(&a.estimated_risk_reduction))
        .then_with(|| a.control_id.cmp(&b.control_id))
}

fn describe(mapping: &ControlRiskMapping, keywords: &BTreeSet<String>) -> String {
    if !mapping.reasoning.trim().is_empty() {
        return mapping.reasoning.clone();
    }
    let declared = mapping_keywords(mapping);
    let shared: Vec<&str> = declared.intersection(keywords).map(String::as_str).collect();
    format!("Matches threat keywords: {}", shared.join(", "))
}

fn suggestion(
    control: &Control,
    score: f64,
    mapping: &ControlRiskMapping,
    keywords: &BTreeSet<String>,
    pricing: Pricing,
    is_associated: bool,
    policy: &SuggestionPolicy,
) -> ControlSuggestion {
    ControlSuggestion {
        control_id: control.id.clone(),
        control_name: control.name.clone(),
        match_score: score,
        priority: Priority::from_roi(pricing.roi, policy),
        estimated_risk_reduction: pricing.reduction,
        annualized_control_cost: pricing.annualized_cost,
        roi: pricing.roi,
        payback_months: pricing.payback_months,
        impact_category: classify_impact(control, Some(mapping)),
        reasoning: describe(mapping, keywords),
        is_associated,
    }
}

fn residual_with<'a, I>(controls: I, params: &RiskParameters, config: &EngineConfig) -> f64
where
    I: IntoIterator<Item = &'a Control>,
{
    let composition = compose(controls, &config.effectiveness);
    calculate_exposure(params, &composition.scores, &config.exposure)
        .residual
        .avg
}

fn keep_best<'m>(
    best: &mut BTreeMap<&'m str, (f64, &'m ControlRiskMapping)>,
    score: f64,
    mapping: &'m ControlRiskMapping,
) {
    let entry = best.entry(mapping.control_id.as_str()).or_insert((score, mapping));
    if score > entry.0 {
        *entry = (score, mapping);
    }
}

/// Ranks catalog controls for a risk
///
/// `associated` are the controls already linked to the risk; they form the
/// current residual and are never ranked. Those that match the risk are
/// listed separately, marked `is_associated`, and priced by the reduction
/// they deliver now. Candidates without a matching mapping above the
/// configured threshold are dropped.
pub fn rank_controls(
    risk: &Risk,
    params: &RiskParameters,
    associated: &[Control],
    catalog: &[Control],
    mappings: &[ControlRiskMapping],
    config: &EngineConfig,
) -> ControlSuggestionBuckets {
    let policy = &config.suggestion;
    let current_residual = residual_with(associated, params, config);

    let associated_ids: BTreeSet<&str> = associated.iter().map(|c| c.id.as_str()).collect();
    let keywords = risk_keywords(risk);

    // Best-scoring mapping per control
    let mut candidates: BTreeMap<&str, (f64, &ControlRiskMapping)> = BTreeMap::new();
    let mut in_place: BTreeMap<&str, (f64, &ControlRiskMapping)> = BTreeMap::new();
    for mapping in mappings {
        if let Err(e) = mapping.validate() {
            log::warn!("[SUGGEST] Ignoring invalid mapping: {}", e);
            continue;
        }
        let score = match_score(&keywords, mapping);
        if score <= policy.min_match_score {
            continue;
        }
        if associated_ids.contains(mapping.control_id.as_str()) {
            keep_best(&mut in_place, score, mapping);
        } else {
            keep_best(&mut candidates, score, mapping);
        }
    }

    let mut buckets = ControlSuggestionBuckets {
        risk_id: risk.id.clone(),
        current_residual,
        likelihood_controls: Vec::new(),
        magnitude_controls: Vec::new(),
        both_controls: Vec::new(),
        associated_control_ids: associated.iter().map(|c| c.id.clone()).collect(),
        associated_controls: Vec::new(),
    };

    for (control_id, (score, mapping)) in candidates {
        let Some(control) = catalog.iter().find(|c| c.id == control_id) else {
            log::debug!("[SUGGEST] Mapping references unknown control {}", control_id);
            continue;
        };

        let hypothetical = control
            .clone()
            .with_status(ImplementationStatus::FullyImplemented);
        let residual = residual_with(
            associated.iter().chain(std::iter::once(&hypothetical)),
            params,
            config,
        );
        let cost = control.cost.annualized(policy.amortization_years);
        let pricing = price_control(current_residual, residual, cost);
        if pricing.roi.is_flagged() {
            log::debug!(
                "[SUGGEST] {} would not lower the residual of {} ({:.2})",
                control.id,
                risk.id,
                pricing.reduction
            );
        }

        let entry = suggestion(control, score, mapping, &keywords, pricing, false, policy);
        match entry.impact_category {
            ImpactCategory::Likelihood => buckets.likelihood_controls.push(entry),
            ImpactCategory::Magnitude => buckets.magnitude_controls.push(entry),
            ImpactCategory::Both => buckets.both_controls.push(entry),
        }
    }

    for (control_id, (score, mapping)) in in_place {
        let Some(control) = associated.iter().find(|c| c.id == control_id) else {
            continue;
        };
        let without = residual_with(
            associated.iter().filter(|c| c.id != control_id),
            params,
            config,
        );
        let cost = control.cost.annualized(policy.amortization_years);
        let pricing = price_control(without, current_residual, cost);
        buckets
            .associated_controls
            .push(suggestion(control, score, mapping, &keywords, pricing, true, policy));
    }

    buckets.likelihood_controls.sort_by(ranking_order);
    buckets.magnitude_controls.sort_by(ranking_order);
    buckets.both_controls.sort_by(ranking_order);
    buckets.associated_controls.sort_by(ranking_order);

    log::info!(
        "[SUGGEST] Risk {}: {} suggestions ({} associated controls excluded)",
        risk.id,
        buckets.total(),
        buckets.associated_control_ids.len()
    );

    buckets
}
