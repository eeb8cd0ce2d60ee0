//! Domain records consumed by the engine.
//!
//! Records arrive from repositories in their stored form. Field names are
//! canonical camelCase on the wire, with snake_case accepted as an alias so
//! mixed-convention storage normalizes on read. FAIR parameters stay in their
//! raw `FairInputs` form on the risk record and are validated into
//! `RiskParameters` at the calculator boundary.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================
// TRIANGULAR ESTIMATES
// ============================================================

/// Three-point (min, average, max) estimate of an uncertain quantity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TriangularEstimate {
    pub min: f64,
    #[serde(alias = "average")]
    pub avg: f64,
    pub max: f64,
}

impl TriangularEstimate {
    /// Builds a validated estimate: finite, non-negative, `min <= avg <= max`
    pub fn new(field: &str, min: f64, avg: f64, max: f64) -> Result<Self> {
        let estimate = Self { min, avg, max };
        estimate.validate(field)?;
        Ok(estimate)
    }

    pub const fn zero() -> Self {
        Self {
            min: 0.0,
            avg: 0.0,
            max: 0.0,
        }
    }

    /// Degenerate estimate with all three bounds equal
    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            avg: value,
            max: value,
        }
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        for (bound, value) in [("min", self.min), ("avg", self.avg), ("max", self.max)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::out_of_range(
                    format!("{}.{}", field, bound),
                    value,
                    "a finite, non-negative number",
                ));
            }
        }

        if self.min > self.avg || self.avg > self.max {
            return Err(EngineError::DegenerateDistribution {
                field: field.to_string(),
                min: self.min,
                avg: self.avg,
                max: self.max,
            });
        }

        Ok(())
    }

    /// Validates the estimate as a fraction in `[0, 1]`
    pub fn validate_fraction(&self, field: &str) -> Result<()> {
        self.validate(field)?;
        if self.max > 1.0 {
            return Err(EngineError::out_of_range(
                format!("{}.max", field),
                self.max,
                "a fraction in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Applies `f` to each bound
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            min: f(self.min),
            avg: f(self.avg),
            max: f(self.max),
        }
    }

    /// Combines two estimates bound by bound
    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            min: f(self.min, other.min),
            avg: f(self.avg, other.avg),
            max: f(self.max, other.max),
        }
    }
}

impl std::ops::Add for TriangularEstimate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a + b)
    }
}

impl std::iter::Sum for TriangularEstimate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, e| acc + e)
    }
}

/// A stored estimate whose bounds may be missing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawEstimate {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default, alias = "average")]
    pub avg: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl RawEstimate {
    fn resolve(&self, field: &str) -> Result<TriangularEstimate> {
        let min = self
            .min
            .ok_or_else(|| EngineError::missing(format!("{}.min", field)))?;
        let avg = self
            .avg
            .ok_or_else(|| EngineError::missing(format!("{}.avg", field)))?;
        let max = self
            .max
            .ok_or_else(|| EngineError::missing(format!("{}.max", field)))?;
        TriangularEstimate::new(field, min, avg, max)
    }
}

impl From<TriangularEstimate> for RawEstimate {
    fn from(estimate: TriangularEstimate) -> Self {
        Self {
            min: Some(estimate.min),
            avg: Some(estimate.avg),
            max: Some(estimate.max),
        }
    }
}

// ============================================================
// FAIR PARAMETERS
// ============================================================

/// FAIR factors as stored on a risk record, possibly incomplete
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairInputs {
    #[serde(default, alias = "contact_frequency")]
    pub contact_frequency: Option<RawEstimate>,
    #[serde(default, alias = "probability_of_action")]
    pub probability_of_action: Option<RawEstimate>,
    #[serde(default, alias = "threat_capability")]
    pub threat_capability: Option<RawEstimate>,
    #[serde(default, alias = "resistance_strength")]
    pub resistance_strength: Option<RawEstimate>,
    #[serde(default, alias = "primary_loss_magnitude")]
    pub primary_loss_magnitude: Option<RawEstimate>,
    #[serde(default, alias = "secondary_loss_magnitude")]
    pub secondary_loss_magnitude: Option<RawEstimate>,
}

fn required(field: &str, raw: &Option<RawEstimate>) -> Result<TriangularEstimate> {
    raw.as_ref()
        .ok_or_else(|| EngineError::missing(field))?
        .resolve(field)
}

/// Validated FAIR input factors for one risk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FairInputs", into = "FairInputs")]
pub struct RiskParameters {
    contact_frequency: TriangularEstimate,
    probability_of_action: TriangularEstimate,
    threat_capability: TriangularEstimate,
    resistance_strength: TriangularEstimate,
    primary_loss_magnitude: TriangularEstimate,
    secondary_loss_magnitude: Option<TriangularEstimate>,
}

impl RiskParameters {
    pub fn new(
        contact_frequency: TriangularEstimate,
        probability_of_action: TriangularEstimate,
        threat_capability: TriangularEstimate,
        resistance_strength: TriangularEstimate,
        primary_loss_magnitude: TriangularEstimate,
    ) -> Result<Self> {
        let params = Self {
            contact_frequency,
            probability_of_action,
            threat_capability,
            resistance_strength,
            primary_loss_magnitude,
            secondary_loss_magnitude: None,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_secondary_loss(mut self, secondary: TriangularEstimate) -> Result<Self> {
        secondary.validate("secondaryLossMagnitude")?;
        self.secondary_loss_magnitude = Some(secondary);
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        self.contact_frequency.validate("contactFrequency")?;
        self.probability_of_action
            .validate_fraction("probabilityOfAction")?;
        self.threat_capability.validate_fraction("threatCapability")?;
        self.resistance_strength
            .validate_fraction("resistanceStrength")?;
        self.primary_loss_magnitude.validate("primaryLossMagnitude")?;
        if let Some(secondary) = &self.secondary_loss_magnitude {
            secondary.validate("secondaryLossMagnitude")?;
        }
        Ok(())
    }

    pub fn contact_frequency(&self) -> TriangularEstimate {
        self.contact_frequency
    }

    pub fn probability_of_action(&self) -> TriangularEstimate {
        self.probability_of_action
    }

    pub fn threat_capability(&self) -> TriangularEstimate {
        self.threat_capability
    }

    pub fn resistance_strength(&self) -> TriangularEstimate {
        self.resistance_strength
    }

    pub fn primary_loss_magnitude(&self) -> TriangularEstimate {
        self.primary_loss_magnitude
    }

    pub fn secondary_loss_magnitude(&self) -> Option<TriangularEstimate> {
        self.secondary_loss_magnitude
    }

    /// Per-event loss: primary plus secondary when present
    pub fn loss_magnitude(&self) -> TriangularEstimate {
        match self.secondary_loss_magnitude {
            Some(secondary) => self.primary_loss_magnitude + secondary,
            None => self.primary_loss_magnitude,
        }
    }
}

impl TryFrom<&FairInputs> for RiskParameters {
    type Error = EngineError;

    fn try_from(inputs: &FairInputs) -> Result<Self> {
        let params = Self::new(
            required("contactFrequency", &inputs.contact_frequency)?,
            required("probabilityOfAction", &inputs.probability_of_action)?,
            required("threatCapability", &inputs.threat_capability)?,
            required("resistanceStrength", &inputs.resistance_strength)?,
            required("primaryLossMagnitude", &inputs.primary_loss_magnitude)?,
        )?;

        match &inputs.secondary_loss_magnitude {
            Some(raw) => params.with_secondary_loss(raw.resolve("secondaryLossMagnitude")?),
            None => Ok(params),
        }
    }
}

impl TryFrom<FairInputs> for RiskParameters {
    type Error = EngineError;

    fn try_from(inputs: FairInputs) -> Result<Self> {
        Self::try_from(&inputs)
    }
}

impl From<RiskParameters> for FairInputs {
    fn from(params: RiskParameters) -> Self {
        Self {
            contact_frequency: Some(params.contact_frequency.into()),
            probability_of_action: Some(params.probability_of_action.into()),
            threat_capability: Some(params.threat_capability.into()),
            resistance_strength: Some(params.resistance_strength.into()),
            primary_loss_magnitude: Some(params.primary_loss_magnitude.into()),
            secondary_loss_magnitude: params.secondary_loss_magnitude.map(RawEstimate::from),
        }
    }
}

// ============================================================
// RISK
// ============================================================

/// A risk scenario record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "legal_entity")]
    pub legal_entity: Option<String>,
    #[serde(default, alias = "threat_community")]
    pub threat_community: String,
    #[serde(default, alias = "vulnerability_pattern")]
    pub vulnerability: String,
    #[serde(default, alias = "identified_at")]
    pub identified_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "fair_inputs")]
    pub parameters: FairInputs,
}

impl Risk {
    pub fn new(id: &str, name: &str, parameters: FairInputs) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: None,
            legal_entity: None,
            threat_community: String::new(),
            vulnerability: String::new(),
            identified_at: None,
            parameters,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_legal_entity(mut self, entity: &str) -> Self {
        self.legal_entity = Some(entity.to_string());
        self
    }

    pub fn with_threat(mut self, threat_community: &str, vulnerability: &str) -> Self {
        self.threat_community = threat_community.to_string();
        self.vulnerability = vulnerability.to_string();
        self
    }

    pub fn with_identified_at(mut self, at: DateTime<Utc>) -> Self {
        self.identified_at = Some(at);
        self
    }

    /// Validates the stored inputs into calculator parameters
    pub fn parameters(&self) -> Result<RiskParameters> {
        RiskParameters::try_from(&self.parameters)
    }
}

// ============================================================
// CONTROLS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Preventive,
    Detective,
    Corrective,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Preventive => "preventive",
            ControlType::Detective => "detective",
            ControlType::Corrective => "corrective",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationStatus {
    #[default]
    NotImplemented,
    Planned,
    InProgress,
    PartiallyImplemented,
    FullyImplemented,
}

impl ImplementationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImplementationStatus::NotImplemented => "not_implemented",
            ImplementationStatus::Planned => "planned",
            ImplementationStatus::InProgress => "in_progress",
            ImplementationStatus::PartiallyImplemented => "partially_implemented",
            ImplementationStatus::FullyImplemented => "fully_implemented",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedPricing {
    #[serde(default, alias = "implementation_cost")]
    pub implementation_cost: f64,
    #[serde(default, alias = "annual_maintenance_cost")]
    pub annual_maintenance_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerAgentPricing {
    #[serde(alias = "cost_per_agent")]
    pub cost_per_agent: f64,
    #[serde(default, alias = "deployed_agents")]
    pub deployed_agents: u32,
    #[serde(alias = "total_agents")]
    pub total_agents: u32,
}

/// Exactly one pricing model is active per control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pricing", rename_all = "snake_case")]
pub enum ControlCost {
    Fixed(FixedPricing),
    PerAgent(PerAgentPricing),
}

impl Default for ControlCost {
    fn default() -> Self {
        ControlCost::Fixed(FixedPricing::default())
    }
}

impl ControlCost {
    pub fn fixed(implementation_cost: f64, annual_maintenance_cost: f64) -> Self {
        ControlCost::Fixed(FixedPricing {
            implementation_cost,
            annual_maintenance_cost,
        })
    }

    pub fn per_agent(cost_per_agent: f64, deployed_agents: u32, total_agents: u32) -> Self {
        ControlCost::PerAgent(PerAgentPricing {
            cost_per_agent,
            deployed_agents,
            total_agents,
        })
    }

    /// Yearly cost of running the control at full rollout
    pub fn annualized(&self, amortization_years: f64) -> f64 {
        match self {
            ControlCost::Fixed(p) => {
                p.implementation_cost / amortization_years.max(1.0) + p.annual_maintenance_cost
            }
            ControlCost::PerAgent(p) => p.cost_per_agent * f64::from(p.total_agents),
        }
    }

    fn validate(&self, control_id: &str) -> Result<()> {
        let amounts: Vec<(&str, f64)> = match self {
            ControlCost::Fixed(p) => vec![
                ("implementationCost", p.implementation_cost),
                ("annualMaintenanceCost", p.annual_maintenance_cost),
            ],
            ControlCost::PerAgent(p) => {
                if p.deployed_agents > p.total_agents {
                    return Err(EngineError::out_of_range(
                        format!("control {}.deployedAgents", control_id),
                        f64::from(p.deployed_agents),
                        "at most totalAgents",
                    ));
                }
                vec![("costPerAgent", p.cost_per_agent)]
            }
        };

        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::out_of_range(
                    format!("control {}.{}", control_id, name),
                    value,
                    "a finite, non-negative amount",
                ));
            }
        }
        Ok(())
    }
}

/// A mitigating control with its mechanism-specific effectiveness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "control_type")]
    pub control_type: ControlType,
    #[serde(default, alias = "e_avoid")]
    pub e_avoid: Option<f64>,
    #[serde(default, alias = "e_deter")]
    pub e_deter: Option<f64>,
    #[serde(default, alias = "e_detect")]
    pub e_detect: Option<f64>,
    #[serde(default, alias = "e_resist")]
    pub e_resist: Option<f64>,
    /// Generic 0-10 score used when no mechanism coefficient is set
    #[serde(default, alias = "control_effectiveness")]
    pub control_effectiveness: Option<f64>,
    #[serde(default, alias = "implementation_status")]
    pub implementation_status: ImplementationStatus,
    #[serde(default)]
    pub cost: ControlCost,
}

impl Control {
    pub fn new(id: &str, name: &str, control_type: ControlType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            control_type,
            e_avoid: None,
            e_deter: None,
            e_detect: None,
            e_resist: None,
            control_effectiveness: None,
            implementation_status: ImplementationStatus::NotImplemented,
            cost: ControlCost::default(),
        }
    }

    pub fn with_coefficients(mut self, avoid: f64, deter: f64, detect: f64, resist: f64) -> Self {
        self.e_avoid = Some(avoid);
        self.e_deter = Some(deter);
        self.e_detect = Some(detect);
        self.e_resist = Some(resist);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.control_effectiveness = Some(score);
        self
    }

    pub fn with_status(mut self, status: ImplementationStatus) -> Self {
        self.implementation_status = status;
        self
    }

    pub fn with_cost(mut self, cost: ControlCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Mechanism coefficients in (avoid, deter, detect, resist) order
    pub fn coefficients(&self) -> [Option<f64>; 4] {
        [self.e_avoid, self.e_deter, self.e_detect, self.e_resist]
    }

    /// True when at least one mechanism coefficient is set and non-zero
    pub fn has_explicit_coefficients(&self) -> bool {
        self.coefficients()
            .iter()
            .any(|c| matches!(c, Some(v) if *v > 0.0))
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::missing("control.id"));
        }

        let names = ["eAvoid", "eDeter", "eDetect", "eResist"];
        for (name, coefficient) in names.iter().zip(self.coefficients()) {
            if let Some(value) = coefficient {
                if !(0.0..=1.0).contains(&value) {
                    return Err(EngineError::out_of_range(
                        format!("control {}.{}", self.id, name),
                        value,
                        "a fraction in [0, 1]",
                    ));
                }
            }
        }

        if let Some(score) = self.control_effectiveness {
            if !(0.0..=10.0).contains(&score) {
                return Err(EngineError::out_of_range(
                    format!("control {}.controlEffectiveness", self.id),
                    score,
                    "a score in [0, 10]",
                ));
            }
        }

        self.cost.validate(&self.id)
    }
}

// ============================================================
// COST MODULES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Fixed,
    PerEvent,
    PerHour,
    Percentage,
}

impl CostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostType::Fixed => "fixed",
            CostType::PerEvent => "per_event",
            CostType::PerHour => "per_hour",
            CostType::Percentage => "percentage",
        }
    }
}

/// A reusable financial-impact rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostModule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_module_type", alias = "module_type")]
    pub module_type: String,
    #[serde(alias = "cost_type")]
    pub cost_type: CostType,
    #[serde(alias = "cost_factor")]
    pub cost_factor: f64,
}

fn default_module_type() -> String {
    "general".to_string()
}

impl CostModule {
    pub fn new(id: &str, name: &str, module_type: &str, cost_type: CostType, cost_factor: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            module_type: module_type.to_string(),
            cost_type,
            cost_factor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cost_factor.is_finite() || self.cost_factor < 0.0 {
            return Err(EngineError::out_of_range(
                format!("cost module {}.costFactor", self.id),
                self.cost_factor,
                "a finite, non-negative amount",
            ));
        }
        if self.cost_type == CostType::Percentage && self.cost_factor > 1.0 {
            return Err(EngineError::out_of_range(
                format!("cost module {}.costFactor", self.id),
                self.cost_factor,
                "a fraction in [0, 1] for percentage modules",
            ));
        }
        Ok(())
    }
}

pub fn default_weight() -> f64 {
    1.0
}

/// A cost module attached to a risk with its materiality weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedCostModule {
    pub module: CostModule,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl WeightedCostModule {
    pub fn new(module: CostModule, weight: f64) -> Self {
        Self { module, weight }
    }

    pub fn validate(&self) -> Result<()> {
        self.module.validate()?;
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(EngineError::out_of_range(
                format!("cost module {}.weight", self.module.id),
                self.weight,
                "a finite, non-negative weight",
            ));
        }
        Ok(())
    }
}

// ============================================================
// CONTROL / RISK MAPPINGS
// ============================================================

/// Which side of the risk equation a control acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactCategory {
    Likelihood,
    Magnitude,
    Both,
}

impl ImpactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactCategory::Likelihood => "likelihood",
            ImpactCategory::Magnitude => "magnitude",
            ImpactCategory::Both => "both",
        }
    }
}

/// Declared relevance of a control to a threat/vulnerability pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRiskMapping {
    #[serde(alias = "control_id")]
    pub control_id: String,
    #[serde(default, alias = "threat_community")]
    pub threat_community: String,
    #[serde(default, alias = "vulnerability_pattern")]
    pub vulnerability_pattern: String,
    #[serde(alias = "relevance_score")]
    pub relevance_score: f64,
    #[serde(default, alias = "impact_type")]
    pub impact_type: Option<ImpactCategory>,
    #[serde(default)]
    pub reasoning: String,
}

impl ControlRiskMapping {
    pub fn new(control_id: &str, threat_community: &str, vulnerability_pattern: &str, relevance_score: f64) -> Self {
        Self {
            control_id: control_id.to_string(),
            threat_community: threat_community.to_string(),
            vulnerability_pattern: vulnerability_pattern.to_string(),
            relevance_score,
            impact_type: None,
            reasoning: String::new(),
        }
    }

    pub fn with_impact(mut self, impact: ImpactCategory) -> Self {
        self.impact_type = Some(impact);
        self
    }

    pub fn with_reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = reasoning.to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance_score) {
            return Err(EngineError::out_of_range(
                format!("mapping {}.relevanceScore", self.control_id),
                self.relevance_score,
                "a fraction in [0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(min: f64, avg: f64, max: f64) -> RawEstimate {
        RawEstimate {
            min: Some(min),
            avg: Some(avg),
            max: Some(max),
        }
    }

    fn complete_inputs() -> FairInputs {
        FairInputs {
            contact_frequency: Some(tri(1.0, 5.0, 10.0)),
            probability_of_action: Some(tri(0.1, 0.3, 0.5)),
            threat_capability: Some(tri(0.2, 0.5, 0.8)),
            resistance_strength: Some(tri(0.2, 0.5, 0.8)),
            primary_loss_magnitude: Some(tri(10_000.0, 50_000.0, 200_000.0)),
            secondary_loss_magnitude: None,
        }
    }

    #[test]
    fn test_triangular_rejects_inverted_bounds() {
        let err = TriangularEstimate::new("contactFrequency", 5.0, 1.0, 10.0).unwrap_err();
        assert!(matches!(err, EngineError::DegenerateDistribution { .. }));
    }

    #[test]
    fn test_triangular_rejects_negative_and_nan() {
        let err = TriangularEstimate::new("x", -1.0, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange { .. }));

        let err = TriangularEstimate::new("x", 0.0, f64::NAN, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange { .. }));
    }

    #[test]
    fn test_parameters_from_complete_inputs() {
        let params = RiskParameters::try_from(&complete_inputs()).unwrap();
        assert_eq!(params.contact_frequency().avg, 5.0);
        assert_eq!(params.loss_magnitude().max, 200_000.0);
    }

    #[test]
    fn test_missing_field_is_reported_by_name() {
        let mut inputs = complete_inputs();
        inputs.threat_capability = None;
        let err = RiskParameters::try_from(&inputs).unwrap_err();
        assert_eq!(err, EngineError::missing("threatCapability"));

        let mut inputs = complete_inputs();
        inputs.contact_frequency = Some(RawEstimate {
            min: Some(1.0),
            avg: None,
            max: Some(3.0),
        });
        let err = RiskParameters::try_from(&inputs).unwrap_err();
        assert_eq!(err, EngineError::missing("contactFrequency.avg"));
    }

    #[test]
    fn test_probability_above_one_rejected() {
        let mut inputs = complete_inputs();
        inputs.probability_of_action = Some(tri(0.5, 0.9, 1.2));
        let err = RiskParameters::try_from(&inputs).unwrap_err();
        match err {
            EngineError::OutOfRange { field, .. } => assert_eq!(field, "probabilityOfAction.max"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_secondary_loss_adds_to_magnitude() {
        let mut inputs = complete_inputs();
        inputs.secondary_loss_magnitude = Some(tri(1_000.0, 2_000.0, 3_000.0));
        let params = RiskParameters::try_from(&inputs).unwrap();
        assert_eq!(params.loss_magnitude().avg, 52_000.0);
    }

    #[test]
    fn test_risk_accepts_snake_case_fields() {
        let json = r#"{
            "id": "R-1",
            "name": "Ransomware",
            "legal_entity": "Acme GmbH",
            "threat_community": "organized crime",
            "parameters": {
                "contact_frequency": {"min": 1, "avg": 2, "max": 3},
                "probabilityOfAction": {"min": 0.1, "average": 0.2, "max": 0.3}
            }
        }"#;
        let risk: Risk = serde_json::from_str(json).unwrap();
        assert_eq!(risk.legal_entity.as_deref(), Some("Acme GmbH"));
        assert_eq!(risk.parameters.contact_frequency.unwrap().avg, Some(2.0));
        assert_eq!(risk.parameters.probability_of_action.unwrap().avg, Some(0.2));
        assert!(risk.parameters().is_err());
    }

    #[test]
    fn test_control_validation() {
        let control = Control::new("C-1", "MFA", ControlType::Preventive).with_coefficients(0.5, 0.2, 0.0, 1.2);
        assert!(control.validate().is_err());

        let control = Control::new("C-2", "EDR", ControlType::Detective).with_score(11.0);
        assert!(control.validate().is_err());

        let control = Control::new("C-3", "Agents", ControlType::Detective)
            .with_cost(ControlCost::per_agent(10.0, 20, 10));
        assert!(control.validate().is_err());

        let control = Control::new("C-4", "Backups", ControlType::Corrective).with_score(7.0);
        assert!(control.validate().is_ok());
    }

    #[test]
    fn test_control_cost_is_tagged() {
        let json = r#"{
            "id": "C-9",
            "name": "EDR",
            "controlType": "detective",
            "cost": {"pricing": "per_agent", "costPerAgent": 40, "deployedAgents": 10, "totalAgents": 50}
        }"#;
        let control: Control = serde_json::from_str(json).unwrap();
        assert_eq!(control.cost, ControlCost::per_agent(40.0, 10, 50));
        assert_eq!(control.cost.annualized(1.0), 2_000.0);
        assert_eq!(control.implementation_status, ImplementationStatus::NotImplemented);
    }

    #[test]
    fn test_fixed_cost_amortization() {
        let cost = ControlCost::fixed(30_000.0, 5_000.0);
        assert_eq!(cost.annualized(1.0), 35_000.0);
        assert_eq!(cost.annualized(3.0), 15_000.0);
    }

    #[test]
    fn test_percentage_module_must_be_fraction() {
        let module = CostModule::new("M-1", "Fines", "regulatory", CostType::Percentage, 1.5);
        assert!(module.validate().is_err());

        let weighted = WeightedCostModule::new(
            CostModule::new("M-2", "Legal", "legal", CostType::Fixed, 10.0),
            -1.0,
        );
        assert!(weighted.validate().is_err());
    }
}
