//! Engine policy: every floor, cap and heuristic the calculations depend on.
//!
//! The defaults encode actuarial judgment calls. They can be tuned from a YAML
//! file without touching calculation code; any field left out of the file
//! keeps its default.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

/// Effectiveness assumed for a mechanism no control contributes to
pub const BASELINE_EFFECTIVENESS: f64 = 0.05;
/// Lowest effectiveness credited to a mechanism with at least one contributor
pub const CONTRIBUTOR_FLOOR: f64 = 0.1;
/// No mechanism is ever treated as perfectly effective
pub const EFFECTIVENESS_CAP: f64 = 0.95;
pub const FULLY_IMPLEMENTED_WEIGHT: f64 = 1.0;
pub const IN_PROGRESS_WEIGHT: f64 = 0.5;
/// Generic control scores are expressed on a 0-10 scale
pub const GENERIC_SCORE_SCALE: f64 = 10.0;

/// Share of loss magnitude that faster detection can contain
pub const DETECTION_MITIGATION_FACTOR: f64 = 0.3;

pub const DEFAULT_CURVE_POINTS: usize = 20;
pub const MIN_CURVE_POINTS: usize = 4;
pub const MAX_CURVE_POINTS: usize = 100;
/// Implied 90th percentile sits this far from the average towards the max
pub const P90_TAIL_SHARE: f64 = 0.3;

pub const HIGH_PRIORITY_ROI: f64 = 100.0;
pub const MEDIUM_PRIORITY_ROI: f64 = 0.0;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectivenessPolicy {
    pub baseline: f64,
    pub contributor_floor: f64,
    pub cap: f64,
    pub fully_implemented_weight: f64,
    pub in_progress_weight: f64,
}

impl Default for EffectivenessPolicy {
    fn default() -> Self {
        Self {
            baseline: BASELINE_EFFECTIVENESS,
            contributor_floor: CONTRIBUTOR_FLOOR,
            cap: EFFECTIVENESS_CAP,
            fully_implemented_weight: FULLY_IMPLEMENTED_WEIGHT,
            in_progress_weight: IN_PROGRESS_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExposurePolicy {
    pub detection_mitigation_factor: f64,
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self {
            detection_mitigation_factor: DETECTION_MITIGATION_FACTOR,
        }
    }
}

/// Statistic of the residual triangle an exceedance anchor is scaled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatistic {
    Min,
    Avg,
    Max,
}

/// One fixed point of the exceedance curve: P(loss > factor * statistic) = probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveAnchor {
    pub probability: f64,
    pub statistic: AnchorStatistic,
    pub factor: f64,
}

impl CurveAnchor {
    pub const fn new(probability: f64, statistic: AnchorStatistic, factor: f64) -> Self {
        Self {
            probability,
            statistic,
            factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExceedancePolicy {
    pub anchors: Vec<CurveAnchor>,
    pub default_points: usize,
    pub min_points: usize,
    pub max_points: usize,
    pub p90_tail_share: f64,
}

impl Default for ExceedancePolicy {
    fn default() -> Self {
        Self {
            anchors: vec![
                CurveAnchor::new(0.95, AnchorStatistic::Min, 0.3),
                CurveAnchor::new(0.75, AnchorStatistic::Avg, 0.7),
                CurveAnchor::new(0.50, AnchorStatistic::Avg, 1.0),
                CurveAnchor::new(0.10, AnchorStatistic::Max, 1.0),
            ],
            default_points: DEFAULT_CURVE_POINTS,
            min_points: MIN_CURVE_POINTS,
            max_points: MAX_CURVE_POINTS,
            p90_tail_share: P90_TAIL_SHARE,
        }
    }
}

impl ExceedancePolicy {
    /// Clamps a requested resolution into the supported range
    pub fn resolution(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_points)
            .clamp(self.min_points, self.max_points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuggestionPolicy {
    /// Controls scoring at or below this are not suggested
    pub min_match_score: f64,
    pub high_priority_roi: f64,
    pub medium_priority_roi: f64,
    /// Years over which a one-off implementation cost is spread
    pub amortization_years: f64,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self {
            min_match_score: 0.0,
            high_priority_roi: HIGH_PRIORITY_ROI,
            medium_priority_roi: MEDIUM_PRIORITY_ROI,
            amortization_years: 1.0,
        }
    }
}

/// Residual-exposure thresholds (annualized currency) for severity bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 1_000_000.0,
            high: 250_000.0,
            medium: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioPolicy {
    pub top_risks: usize,
    pub severity: SeverityThresholds,
}

impl Default for PortfolioPolicy {
    fn default() -> Self {
        Self {
            top_risks: 5,
            severity: SeverityThresholds::default(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub effectiveness: EffectivenessPolicy,
    pub exposure: ExposurePolicy,
    pub exceedance: ExceedancePolicy,
    pub suggestion: SuggestionPolicy,
    pub portfolio: PortfolioPolicy,
}

impl EngineConfig {
    /// Loads and validates a YAML configuration file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: EngineConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        log::info!("[CONFIG] Loaded engine configuration from {}", path);
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.effectiveness;
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(unit(e.baseline) && unit(e.contributor_floor) && unit(e.cap)) {
            return Err(ConfigError::Invalid(
                "effectiveness baseline, floor and cap must be fractions in [0, 1]".to_string(),
            ));
        }
        if e.contributor_floor > e.cap || e.baseline > e.cap {
            return Err(ConfigError::Invalid(format!(
                "effectiveness floor {} / baseline {} exceed cap {}",
                e.contributor_floor, e.baseline, e.cap
            )));
        }
        if !(unit(e.fully_implemented_weight) && unit(e.in_progress_weight)) {
            return Err(ConfigError::Invalid(
                "implementation weights must be fractions in [0, 1]".to_string(),
            ));
        }

        if !unit(self.exposure.detection_mitigation_factor) {
            return Err(ConfigError::Invalid(format!(
                "detection mitigation factor {} must be in [0, 1]",
                self.exposure.detection_mitigation_factor
            )));
        }

        let x = &self.exceedance;
        if x.min_points < MIN_CURVE_POINTS || x.max_points > MAX_CURVE_POINTS || x.min_points > x.max_points {
            return Err(ConfigError::Invalid(format!(
                "curve resolution range {}..={} must lie within {}..={}",
                x.min_points, x.max_points, MIN_CURVE_POINTS, MAX_CURVE_POINTS
            )));
        }
        if x.anchors.len() < 2 {
            return Err(ConfigError::Invalid(
                "at least two exceedance anchors are required".to_string(),
            ));
        }
        let descending = x
            .anchors
            .windows(2)
            .all(|w| w[0].probability > w[1].probability);
        let in_range = x
            .anchors
            .iter()
            .all(|a| a.probability > 0.0 && a.probability < 1.0 && a.factor > 0.0);
        if !descending || !in_range {
            return Err(ConfigError::Invalid(
                "exceedance anchors must have strictly decreasing probabilities in (0, 1) and positive factors"
                    .to_string(),
            ));
        }

        if self.suggestion.amortization_years < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "amortization years {} must be at least 1",
                self.suggestion.amortization_years
            )));
        }

        let s = &self.portfolio.severity;
        if !(s.critical >= s.high && s.high >= s.medium && s.medium >= 0.0) {
            return Err(ConfigError::Invalid(
                "severity thresholds must satisfy critical >= high >= medium >= 0".to_string(),
            ));
        }

        Ok(())
    }
}
