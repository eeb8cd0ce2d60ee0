//! FAIR Exposure Calculator
//!
//! Computes inherent and residual annualized risk for one risk scenario.
//! Each pass runs per bound (min/avg/max):
//!
//! ```text
//! TEF  = contactFrequency * probabilityOfAction * (1 - eAvoid) * (1 - eDeter)
//! vuln = threatCapability / (threatCapability + resistanceStrength * (1 + eResist))
//! LEF  = TEF * vuln
//! LM   = lossMagnitude * (1 - eDetect * detectionMitigationFactor)
//! risk = LEF * LM
//! ```
//!
//! The inherent pass uses zero effectiveness. Every effectiveness term only
//! reduces its factor, so residual <= inherent holds on every bound.

use crate::effectiveness::{compose, Composition, EffectivenessScores};
use crate::error::Result;
use crate::policy::{EngineConfig, ExposurePolicy};
use crate::types::{Control, FairInputs, RiskParameters, TriangularEstimate};
use serde::{Deserialize, Serialize};

/// Intermediate FAIR factors for one pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairBreakdown {
    pub threat_event_frequency: TriangularEstimate,
    pub vulnerability: TriangularEstimate,
    pub loss_event_frequency: TriangularEstimate,
    pub loss_magnitude: TriangularEstimate,
    pub annualized_risk: TriangularEstimate,
}

/// Inherent vs residual annualized loss for one risk
///
/// A snapshot: recomputed from current risk and control state on every
/// request and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskExposure {
    pub inherent: TriangularEstimate,
    pub residual: TriangularEstimate,
    pub inherent_breakdown: FairBreakdown,
    pub residual_breakdown: FairBreakdown,
    pub effectiveness: EffectivenessScores,
}

impl RiskExposure {
    /// Average annualized loss removed by the current controls
    pub fn risk_reduction(&self) -> f64 {
        self.inherent.avg - self.residual.avg
    }

    /// Share of the inherent average removed by controls, 0 when there is no inherent risk
    pub fn reduction_ratio(&self) -> f64 {
        if self.inherent.avg > 0.0 {
            self.risk_reduction() / self.inherent.avg
        } else {
            0.0
        }
    }
}

/// Vulnerability for one bound; no threat capability means no vulnerability
fn vulnerability(threat_capability: f64, resistance_strength: f64, e_resist: f64) -> f64 {
    if threat_capability <= 0.0 {
        return 0.0;
    }
    threat_capability / (threat_capability + resistance_strength * (1.0 + e_resist))
}

/// Runs one FAIR pass with the given effectiveness
pub fn evaluate(
    params: &RiskParameters,
    scores: &EffectivenessScores,
    policy: &ExposurePolicy,
) -> FairBreakdown {
    let rate_retained = (1.0 - scores.avoid) * (1.0 - scores.deter);
    let threat_event_frequency = params
        .contact_frequency()
        .zip_with(params.probability_of_action(), |cf, poa| cf * poa * rate_retained);

    // Conservative interval: the low bound pairs weakest attacker with strongest
    // defence, the high bound the reverse.
    let tc = params.threat_capability();
    let rs = params.resistance_strength();
    let vuln = TriangularEstimate {
        min: vulnerability(tc.min, rs.max, scores.resist),
        avg: vulnerability(tc.avg, rs.avg, scores.resist),
        max: vulnerability(tc.max, rs.min, scores.resist),
    };

    let loss_event_frequency = threat_event_frequency.zip_with(vuln, |tef, v| tef * v);

    let magnitude_retained = 1.0 - scores.detect * policy.detection_mitigation_factor;
    let loss_magnitude = params.loss_magnitude().map(|lm| lm * magnitude_retained);

    FairBreakdown {
        threat_event_frequency,
        vulnerability: vuln,
        loss_event_frequency,
        loss_magnitude,
        annualized_risk: loss_event_frequency.zip_with(loss_magnitude, |lef, lm| lef * lm),
    }
}

/// Computes inherent and residual exposure from validated parameters
pub fn calculate_exposure(
    params: &RiskParameters,
    scores: &EffectivenessScores,
    policy: &ExposurePolicy,
) -> RiskExposure {
    let inherent_breakdown = evaluate(params, &EffectivenessScores::none(), policy);
    let residual_breakdown = evaluate(params, scores, policy);

    RiskExposure {
        inherent: inherent_breakdown.annualized_risk,
        residual: residual_breakdown.annualized_risk,
        inherent_breakdown,
        residual_breakdown,
        effectiveness: *scores,
    }
}

/// Calculator boundary: validates stored inputs, composes controls, computes exposure
///
/// Fails fast on the first invalid FAIR input; no partial result is produced.
pub fn calculate_for_inputs(
    inputs: &FairInputs,
    controls: &[Control],
    config: &EngineConfig,
) -> Result<(RiskExposure, Composition)> {
    let params = RiskParameters::try_from(inputs)?;
    let composition = compose(controls, &config.effectiveness);
    let exposure = calculate_exposure(&params, &composition.scores, &config.exposure);
    log::debug!(
        "[EXPOSURE] inherent avg {:.2}, residual avg {:.2}",
        exposure.inherent.avg,
        exposure.residual.avg
    );
    Ok((exposure, composition))
}
