//! Cost-Impact Aggregator
//!
//! Applies the weighted cost modules attached to a risk:
//! - `percentage` modules: inherent average * factor * weight
//! - every other type: factor * weight
//!
//! Percentages always apply to the risk's own inherent value, never to the
//! portfolio total, so nothing is counted twice across risks.

use crate::error::Result;
use crate::types::{CostType, Risk, WeightedCostModule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Legal-entity bucket for risks that name none
pub const UNASSIGNED_ENTITY: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleContribution {
    pub module_id: String,
    pub module_name: String,
    pub module_type: String,
    pub cost_type: CostType,
    pub weight: f64,
    pub contribution: f64,
}

/// Total financial impact of one risk with its breakdowns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostImpactBreakdown {
    pub risk_id: String,
    pub legal_entity: Option<String>,
    /// Inherent average the percentage modules were applied to
    pub inherent_basis: f64,
    pub total: f64,
    pub by_module_type: BTreeMap<String, f64>,
    pub by_cost_type: BTreeMap<CostType, f64>,
    pub contributions: Vec<ModuleContribution>,
}

/// Contribution of a single module; inputs must already be validated
pub fn contribution(module: &WeightedCostModule, inherent_avg: f64) -> f64 {
    match module.module.cost_type {
        CostType::Percentage => inherent_avg * module.module.cost_factor * module.weight,
        CostType::Fixed | CostType::PerEvent | CostType::PerHour => {
            module.module.cost_factor * module.weight
        }
    }
}

/// Aggregates the cost modules attached to `risk`
///
/// Rejects negative or non-finite factors and weights before summing, so every
/// contribution is non-negative.
pub fn aggregate_cost_impact(
    risk: &Risk,
    inherent_avg: f64,
    modules: &[WeightedCostModule],
) -> Result<CostImpactBreakdown> {
    let mut breakdown = CostImpactBreakdown {
        risk_id: risk.id.clone(),
        legal_entity: risk.legal_entity.clone(),
        inherent_basis: inherent_avg,
        total: 0.0,
        by_module_type: BTreeMap::new(),
        by_cost_type: BTreeMap::new(),
        contributions: Vec::with_capacity(modules.len()),
    };

    for weighted in modules {
        weighted.validate()?;
        let amount = contribution(weighted, inherent_avg);

        breakdown.total += amount;
        *breakdown
            .by_module_type
            .entry(weighted.module.module_type.clone())
            .or_insert(0.0) += amount;
        *breakdown
            .by_cost_type
            .entry(weighted.module.cost_type)
            .or_insert(0.0) += amount;
        breakdown.contributions.push(ModuleContribution {
            module_id: weighted.module.id.clone(),
            module_name: weighted.module.name.clone(),
            module_type: weighted.module.module_type.clone(),
            cost_type: weighted.module.cost_type,
            weight: weighted.weight,
            contribution: amount,
        });
    }

    log::debug!(
        "[COST] Risk {}: {} modules, total impact {:.2}",
        risk.id,
        modules.len(),
        breakdown.total
    );

    Ok(breakdown)
}

/// Portfolio view of cost impact
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostImpactRollup {
    pub total: f64,
    pub risk_count: usize,
    pub by_legal_entity: BTreeMap<String, f64>,
    pub by_module_type: BTreeMap<String, f64>,
}

/// Rolls per-risk breakdowns up by legal entity and module type
pub fn roll_up<'a, I>(breakdowns: I) -> CostImpactRollup
where
    I: IntoIterator<Item = &'a CostImpactBreakdown>,
{
    let mut rollup = CostImpactRollup::default();
    for breakdown in breakdowns {
        rollup.total += breakdown.total;
        rollup.risk_count += 1;

        let entity = breakdown
            .legal_entity
            .clone()
            .unwrap_or_else(|| UNASSIGNED_ENTITY.to_string());
        *rollup.by_legal_entity.entry(entity).or_insert(0.0) += breakdown.total;

        for (module_type, amount) in &breakdown.by_module_type {
            *rollup
                .by_module_type
                .entry(module_type.clone())
                .or_insert(0.0) += amount;
        }
    }
    rollup
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostModule, FairInputs};

    fn risk(id: &str, entity: Option<&str>) -> Risk {
        let risk = Risk::new(id, "Data breach", FairInputs::default());
        match entity {
            Some(e) => risk.with_legal_entity(e),
            None => risk,
        }
    }

    fn module(id: &str, module_type: &str, cost_type: CostType, factor: f64, weight: f64) -> WeightedCostModule {
        WeightedCostModule::new(CostModule::new(id, id, module_type, cost_type, factor), weight)
    }

    #[test]
    fn test_percentage_module_uses_inherent_value() {
        let modules = vec![module("M-1", "regulatory", CostType::Percentage, 0.1, 1.0)];
        let breakdown = aggregate_cost_impact(&risk("R-1", None), 100_000.0, &modules).unwrap();
        assert!((breakdown.total - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_like_modules_ignore_inherent_value() {
        let modules = vec![
            module("M-1", "legal", CostType::Fixed, 25_000.0, 1.0),
            module("M-2", "operations", CostType::PerEvent, 4_000.0, 0.5),
            module("M-3", "operations", CostType::PerHour, 1_000.0, 2.0),
        ];
        let breakdown = aggregate_cost_impact(&risk("R-1", None), 999_999.0, &modules).unwrap();
        assert_eq!(breakdown.total, 25_000.0 + 2_000.0 + 2_000.0);
        assert_eq!(breakdown.by_module_type["operations"], 4_000.0);
        assert_eq!(breakdown.by_module_type["legal"], 25_000.0);
        assert_eq!(breakdown.by_cost_type[&CostType::PerHour], 2_000.0);
        assert_eq!(breakdown.contributions.len(), 3);
    }

    #[test]
    fn test_no_modules_is_zero() {
        let breakdown = aggregate_cost_impact(&risk("R-1", None), 50_000.0, &[]).unwrap();
        assert_eq!(breakdown.total, 0.0);
        assert!(breakdown.by_module_type.is_empty());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let modules = vec![module("M-1", "legal", CostType::Fixed, 100.0, -1.0)];
        assert!(aggregate_cost_impact(&risk("R-1", None), 0.0, &modules).is_err());
    }

    #[test]
    fn test_roll_up_by_entity_and_type() {
        let a = aggregate_cost_impact(
            &risk("R-1", Some("Acme Ltd")),
            100_000.0,
            &[module("M-1", "regulatory", CostType::Percentage, 0.2, 1.0)],
        )
        .unwrap();
        let b = aggregate_cost_impact(
            &risk("R-2", Some("Acme Ltd")),
            0.0,
            &[module("M-2", "legal", CostType::Fixed, 5_000.0, 1.0)],
        )
        .unwrap();
        let c = aggregate_cost_impact(
            &risk("R-3", None),
            0.0,
            &[module("M-2", "legal", CostType::Fixed, 5_000.0, 1.0)],
        )
        .unwrap();

        let rollup = roll_up(&[a, b, c]);
        assert_eq!(rollup.risk_count, 3);
        assert!((rollup.total - 30_000.0).abs() < 1e-9);
        assert!((rollup.by_legal_entity["Acme Ltd"] - 25_000.0).abs() < 1e-9);
        assert_eq!(rollup.by_legal_entity[UNASSIGNED_ENTITY], 5_000.0);
        assert_eq!(rollup.by_module_type["legal"], 10_000.0);
    }
}
