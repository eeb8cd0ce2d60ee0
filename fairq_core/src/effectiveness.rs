//! Control Effectiveness Composer
//!
//! Reduces a set of controls into four aggregate mechanism scores:
//! avoidance, deterrence, detection and resistance.
//!
//! Rules:
//! - Only `fully_implemented` (weight 1.0) and `in_progress` (weight 0.5)
//!   controls contribute
//! - Each mechanism is the MEAN of its contributions, so controls do not stack
//! - Mechanisms with contributors land in `[floor, cap]`; mechanisms without
//!   any stay at 0
//! - With no qualifying control at all, every mechanism takes the baseline

use crate::policy::{EffectivenessPolicy, GENERIC_SCORE_SCALE};
use crate::types::{Control, ControlType, ImplementationStatus};
use serde::{Deserialize, Serialize};

/// Aggregate effectiveness per mechanism, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessScores {
    pub avoid: f64,
    pub deter: f64,
    pub detect: f64,
    pub resist: f64,
}

impl EffectivenessScores {
    /// No control effect at all; the inherent-risk pass uses this
    pub const fn none() -> Self {
        Self {
            avoid: 0.0,
            deter: 0.0,
            detect: 0.0,
            resist: 0.0,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self {
            avoid: value,
            deter: value,
            detect: value,
            resist: value,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.avoid, self.deter, self.detect, self.resist]
    }
}

/// Number of controls contributing to each mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanismCounts {
    pub avoid: usize,
    pub deter: usize,
    pub detect: usize,
    pub resist: usize,
}

/// Composer output with enough detail to explain the scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub scores: EffectivenessScores,
    pub contributors: MechanismCounts,
    /// Controls whose status made them count
    pub qualifying_controls: usize,
    /// Qualifying controls with neither coefficients nor a generic score
    pub data_quality_skipped: Vec<String>,
}

impl Composition {
    pub fn has_contributors(&self) -> bool {
        let c = &self.contributors;
        c.avoid + c.deter + c.detect + c.resist > 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn resolve(&self, qualifying: usize, policy: &EffectivenessPolicy) -> f64 {
        if self.count == 0 {
            return if qualifying == 0 { policy.baseline } else { 0.0 };
        }
        let mean = self.sum / self.count as f64;
        mean.clamp(0.0, policy.cap).max(policy.contributor_floor)
    }
}

fn status_weight(status: ImplementationStatus, policy: &EffectivenessPolicy) -> Option<f64> {
    match status {
        ImplementationStatus::FullyImplemented => Some(policy.fully_implemented_weight),
        ImplementationStatus::InProgress => Some(policy.in_progress_weight),
        _ => None,
    }
}

/// Composes the effectiveness of `controls`
///
/// Accepts any iterator of control references so callers can chain a
/// hypothetical control onto an existing set without cloning it.
pub fn compose<'a, I>(controls: I, policy: &EffectivenessPolicy) -> Composition
where
    I: IntoIterator<Item = &'a Control>,
{
    let mut avoid = Accumulator::default();
    let mut deter = Accumulator::default();
    let mut detect = Accumulator::default();
    let mut resist = Accumulator::default();
    let mut qualifying = 0;
    let mut skipped = Vec::new();

    for control in controls {
        let Some(weight) = status_weight(control.implementation_status, policy) else {
            continue;
        };
        qualifying += 1;

        if control.has_explicit_coefficients() {
            let slots = [&mut avoid, &mut deter, &mut detect, &mut resist];
            for (slot, coefficient) in slots.into_iter().zip(control.coefficients()) {
                if let Some(value) = coefficient.filter(|v| *v > 0.0) {
                    slot.add(value * weight);
                }
            }
        } else if let Some(score) = control.control_effectiveness {
            let value = (score / GENERIC_SCORE_SCALE).clamp(0.0, 1.0) * weight;
            match control.control_type {
                ControlType::Preventive => {
                    avoid.add(value * 0.5);
                    deter.add(value * 0.5);
                }
                ControlType::Detective => detect.add(value),
                ControlType::Corrective => resist.add(value),
            }
        } else {
            log::warn!(
                "[COMPOSER] Control {} ({}) has no effectiveness data; contributes nothing",
                control.id,
                control.implementation_status.as_str()
            );
            skipped.push(control.id.clone());
        }
    }

    let composition = Composition {
        scores: EffectivenessScores {
            avoid: avoid.resolve(qualifying, policy),
            deter: deter.resolve(qualifying, policy),
            detect: detect.resolve(qualifying, policy),
            resist: resist.resolve(qualifying, policy),
        },
        contributors: MechanismCounts {
            avoid: avoid.count,
            deter: deter.count,
            detect: detect.count,
            resist: resist.count,
        },
        qualifying_controls: qualifying,
        data_quality_skipped: skipped,
    };

    log::debug!(
        "[COMPOSER] {} qualifying controls -> {:?}",
        qualifying,
        composition.scores
    );

    composition
}

/// Shorthand returning only the scores
pub fn compose_scores<'a, I>(controls: I, policy: &EffectivenessPolicy) -> EffectivenessScores
where
    I: IntoIterator<Item = &'a Control>,
{
    compose(controls, policy).scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Control, ControlType, ImplementationStatus::*};

    fn policy() -> EffectivenessPolicy {
        EffectivenessPolicy::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_no_controls_yields_baseline() {
        let composition = compose(&Vec::<Control>::new(), &policy());
        assert_eq!(composition.scores, EffectivenessScores::uniform(0.05));
        assert!(!composition.has_contributors());
        assert_eq!(composition.qualifying_controls, 0);
    }

    #[test]
    fn test_baseline_only_without_qualifying_controls() {
        let planned = Control::new("C-1", "Backups", ControlType::Corrective)
            .with_score(9.0)
            .with_status(Planned);
        let scores = compose_scores(std::iter::once(&planned), &policy());
        assert_eq!(scores, EffectivenessScores::uniform(0.05));

        let siem = Control::new("C-2", "SIEM", ControlType::Detective)
            .with_score(6.0)
            .with_status(FullyImplemented);
        let scores = compose_scores([&planned, &siem], &policy());
        assert!(approx(scores.detect, 0.6));
        assert_eq!(scores.avoid, 0.0);
        assert_eq!(scores.deter, 0.0);
        assert_eq!(scores.resist, 0.0);
    }

    #[test]
    fn test_preventive_generic_score_splits_into_avoid_and_deter() {
        let controls = vec![Control::new("C-1", "MFA", ControlType::Preventive)
            .with_score(8.0)
            .with_status(FullyImplemented)];
        let scores = compose_scores(&controls, &policy());
        assert!(approx(scores.avoid, 0.4));
        assert!(approx(scores.deter, 0.4));
        assert_eq!(scores.detect, 0.0);
        assert_eq!(scores.resist, 0.0);
    }

    #[test]
    fn test_detective_and_corrective_mapping() {
        let controls = vec![
            Control::new("C-1", "SIEM", ControlType::Detective)
                .with_score(6.0)
                .with_status(FullyImplemented),
            Control::new("C-2", "Backups", ControlType::Corrective)
                .with_score(9.0)
                .with_status(FullyImplemented),
        ];
        let scores = compose_scores(&controls, &policy());
        assert!(approx(scores.detect, 0.6));
        assert!(approx(scores.resist, 0.9));
        assert_eq!(scores.avoid, 0.0);
    }

    #[test]
    fn test_in_progress_counts_half() {
        let controls = vec![Control::new("C-1", "WAF", ControlType::Preventive)
            .with_coefficients(0.8, 0.0, 0.0, 0.0)
            .with_status(InProgress)];
        let composition = compose(&controls, &policy());
        assert!(approx(composition.scores.avoid, 0.4));
        assert_eq!(composition.contributors.avoid, 1);
        assert_eq!(composition.contributors.deter, 0);
        assert_eq!(composition.scores.deter, 0.0);
    }

    #[test]
    fn test_other_statuses_ignored() {
        let controls: Vec<Control> = [NotImplemented, Planned, PartiallyImplemented]
            .iter()
            .enumerate()
            .map(|(i, status)| {
                Control::new(&format!("C-{}", i), "x", ControlType::Preventive)
                    .with_coefficients(0.9, 0.9, 0.9, 0.9)
                    .with_status(*status)
            })
            .collect();
        let composition = compose(&controls, &policy());
        assert_eq!(composition.qualifying_controls, 0);
        assert_eq!(composition.scores, EffectivenessScores::uniform(0.05));
    }

    #[test]
    fn test_mean_not_sum() {
        let weak = |id: &str| {
            Control::new(id, "weak", ControlType::Preventive)
                .with_coefficients(0.3, 0.0, 0.0, 0.0)
                .with_status(FullyImplemented)
        };
        let controls = vec![weak("A"), weak("B"), weak("C"), weak("D"), weak("E")];
        let scores = compose_scores(&controls, &policy());
        assert!(approx(scores.avoid, 0.3));
    }

    #[test]
    fn test_cap_and_floor() {
        let controls = vec![
            Control::new("C-1", "Strong", ControlType::Preventive)
                .with_coefficients(1.0, 0.02, 0.0, 0.0)
                .with_status(FullyImplemented),
        ];
        let scores = compose_scores(&controls, &policy());
        assert_eq!(scores.avoid, 0.95);
        assert_eq!(scores.deter, 0.1);
    }

    #[test]
    fn test_explicit_coefficients_take_precedence_over_score() {
        let controls = vec![Control::new("C-1", "EDR", ControlType::Preventive)
            .with_coefficients(0.0, 0.0, 0.7, 0.0)
            .with_score(10.0)
            .with_status(FullyImplemented)];
        let composition = compose(&controls, &policy());
        assert!(approx(composition.scores.detect, 0.7));
        assert_eq!(composition.contributors.avoid, 0);
    }

    #[test]
    fn test_control_without_data_is_skipped_not_failed() {
        let controls = vec![Control::new("C-1", "Policy doc", ControlType::Preventive)
            .with_status(FullyImplemented)];
        let composition = compose(&controls, &policy());
        assert_eq!(composition.qualifying_controls, 1);
        assert_eq!(composition.data_quality_skipped, vec!["C-1".to_string()]);
        assert_eq!(composition.scores, EffectivenessScores::none());
    }

    #[test]
    fn test_bounds_hold_over_grid() {
        let statuses = [FullyImplemented, InProgress, Planned];
        let mut controls = Vec::new();
        for (i, coefficient) in [0.0, 0.05, 0.3, 0.6, 0.99, 1.0].iter().enumerate() {
            for status in statuses {
                controls.push(
                    Control::new(&format!("C-{}", i), "grid", ControlType::Corrective)
                        .with_coefficients(*coefficient, 1.0 - coefficient, *coefficient, 0.5)
                        .with_status(status),
                );
                let composition = compose(&controls, &policy());
                let counts = composition.contributors;
                let pairs = [
                    (composition.scores.avoid, counts.avoid),
                    (composition.scores.deter, counts.deter),
                    (composition.scores.detect, counts.detect),
                    (composition.scores.resist, counts.resist),
                ];
                for (score, count) in pairs {
                    assert!((0.0..=0.95).contains(&score));
                    if count > 0 {
                        assert!(score >= 0.1);
                    }
                }
            }
        }
    }
}
