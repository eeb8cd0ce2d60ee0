//! Data access seams for the engine.
//!
//! The engine only reads through these traits; persistence is up to the
//! implementor. [`InMemoryRepository`] backs the CLI datasets and the tests.

use crate::error::{EngineError, Result};
use crate::suggestion::{mapping_keywords, tokenize};
use crate::types::{Control, ControlRiskMapping, CostModule, Risk, WeightedCostModule};
use std::collections::BTreeMap;

pub trait RiskRepository {
    fn get_risk(&self, id: &str) -> Result<Risk>;
    fn get_all_risks(&self) -> Result<Vec<Risk>>;
}

pub trait ControlRepository {
    /// Controls currently associated with a risk
    fn get_controls_for_risk(&self, risk_id: &str) -> Result<Vec<Control>>;
    /// The full control catalog
    fn get_all_controls(&self) -> Result<Vec<Control>>;
}

pub trait CostModuleRepository {
    fn get_cost_modules_for_risk(&self, risk_id: &str) -> Result<Vec<WeightedCostModule>>;
}

pub trait ControlRiskMappingRepository {
    /// Mappings sharing at least one keyword with the given threat description
    fn get_mappings_for(
        &self,
        threat_community: &str,
        vulnerability_pattern: &str,
    ) -> Result<Vec<ControlRiskMapping>>;
}

/// Everything the engine reads
pub trait Repository:
    RiskRepository + ControlRepository + CostModuleRepository + ControlRiskMappingRepository
{
}

impl<T> Repository for T where
    T: RiskRepository + ControlRepository + CostModuleRepository + ControlRiskMappingRepository
{
}

/// In-memory store; validates controls, cost modules and mappings on insert
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    risks: Vec<Risk>,
    controls: BTreeMap<String, Control>,
    associations: BTreeMap<String, Vec<String>>,
    cost_modules: BTreeMap<String, CostModule>,
    attachments: BTreeMap<String, Vec<(String, f64)>>,
    mappings: Vec<ControlRiskMapping>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a risk. FAIR inputs are validated lazily, when the
    /// risk is evaluated, so incomplete risks can still be stored.
    pub fn add_risk(&mut self, risk: Risk) {
        match self.risks.iter_mut().find(|r| r.id == risk.id) {
            Some(existing) => *existing = risk,
            None => self.risks.push(risk),
        }
    }

    pub fn add_control(&mut self, control: Control) -> Result<()> {
        control.validate()?;
        self.controls.insert(control.id.clone(), control);
        Ok(())
    }

    pub fn associate_control(&mut self, risk_id: &str, control_id: &str) -> Result<()> {
        if !self.risks.iter().any(|r| r.id == risk_id) {
            return Err(EngineError::not_found("Risk", risk_id));
        }
        if !self.controls.contains_key(control_id) {
            return Err(EngineError::not_found("Control", control_id));
        }
        let linked = self.associations.entry(risk_id.to_string()).or_default();
        if !linked.iter().any(|id| id == control_id) {
            linked.push(control_id.to_string());
        }
        Ok(())
    }

    pub fn add_cost_module(&mut self, module: CostModule) -> Result<()> {
        module.validate()?;
        self.cost_modules.insert(module.id.clone(), module);
        Ok(())
    }

    pub fn attach_cost_module(&mut self, risk_id: &str, module_id: &str, weight: f64) -> Result<()> {
        let module = self
            .cost_modules
            .get(module_id)
            .ok_or_else(|| EngineError::not_found("CostModule", module_id))?;
        WeightedCostModule::new(module.clone(), weight).validate()?;
        self.attachments
            .entry(risk_id.to_string())
            .or_default()
            .push((module_id.to_string(), weight));
        Ok(())
    }

    pub fn add_mapping(&mut self, mapping: ControlRiskMapping) -> Result<()> {
        mapping.validate()?;
        self.mappings.push(mapping);
        Ok(())
    }

    pub fn risk_count(&self) -> usize {
        self.risks.len()
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }
}

impl RiskRepository for InMemoryRepository {
    fn get_risk(&self, id: &str) -> Result<Risk> {
        self.risks
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("Risk", id))
    }

    fn get_all_risks(&self) -> Result<Vec<Risk>> {
        Ok(self.risks.clone())
    }
}

impl ControlRepository for InMemoryRepository {
    fn get_controls_for_risk(&self, risk_id: &str) -> Result<Vec<Control>> {
        let Some(ids) = self.associations.get(risk_id) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                self.controls
                    .get(id)
                    .cloned()
                    .ok_or_else(|| EngineError::not_found("Control", id.as_str()))
            })
            .collect()
    }

    fn get_all_controls(&self) -> Result<Vec<Control>> {
        Ok(self.controls.values().cloned().collect())
    }
}

impl CostModuleRepository for InMemoryRepository {
    fn get_cost_modules_for_risk(&self, risk_id: &str) -> Result<Vec<WeightedCostModule>> {
        let Some(attached) = self.attachments.get(risk_id) else {
            return Ok(Vec::new());
        };
        attached
            .iter()
            .map(|(module_id, weight)| {
                self.cost_modules
                    .get(module_id)
                    .map(|m| WeightedCostModule::new(m.clone(), *weight))
                    .ok_or_else(|| EngineError::not_found("CostModule", module_id.as_str()))
            })
            .collect()
    }
}

impl ControlRiskMappingRepository for InMemoryRepository {
    fn get_mappings_for(
        &self,
        threat_community: &str,
        vulnerability_pattern: &str,
    ) -> Result<Vec<ControlRiskMapping>> {
        let mut wanted = tokenize(threat_community);
        wanted.extend(tokenize(vulnerability_pattern));

        Ok(self
            .mappings
            .iter()
            .filter(|m| !mapping_keywords(m).is_disjoint(&wanted))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ControlType, CostType, FairInputs};

    fn repo() -> InMemoryRepository {
        let mut repo = InMemoryRepository::new();
        repo.add_risk(Risk::new("R-1", "Ransomware", FairInputs::default()));
        repo.add_control(Control::new("C-1", "Backups", ControlType::Corrective).with_score(7.0))
            .unwrap();
        repo
    }

    #[test]
    fn test_get_risk_not_found() {
        let err = repo().get_risk("R-404").unwrap_err();
        assert_eq!(err, EngineError::not_found("Risk", "R-404"));
    }

    #[test]
    fn test_add_risk_replaces_same_id() {
        let mut repo = repo();
        repo.add_risk(Risk::new("R-1", "Ransomware v2", FairInputs::default()));
        assert_eq!(repo.risk_count(), 1);
        assert_eq!(repo.get_risk("R-1").unwrap().name, "Ransomware v2");
    }

    #[test]
    fn test_invalid_control_rejected() {
        let mut repo = repo();
        let bad = Control::new("C-2", "Bad", ControlType::Preventive).with_coefficients(1.5, 0.0, 0.0, 0.0);
        assert!(repo.add_control(bad).is_err());
        assert_eq!(repo.control_count(), 1);
    }

    #[test]
    fn test_associations() {
        let mut repo = repo();
        repo.associate_control("R-1", "C-1").unwrap();
        repo.associate_control("R-1", "C-1").unwrap();
        assert_eq!(repo.get_controls_for_risk("R-1").unwrap().len(), 1);
        assert!(repo.get_controls_for_risk("R-2").unwrap().is_empty());
        assert!(repo.associate_control("R-1", "C-9").is_err());
        assert!(repo.associate_control("R-9", "C-1").is_err());
    }

    #[test]
    fn test_cost_module_attachment() {
        let mut repo = repo();
        repo.add_cost_module(CostModule::new("M-1", "Fines", "regulatory", CostType::Percentage, 0.1))
            .unwrap();
        repo.attach_cost_module("R-1", "M-1", 0.5).unwrap();
        assert!(repo.attach_cost_module("R-1", "M-1", -1.0).is_err());
        assert!(repo.attach_cost_module("R-1", "M-404", 1.0).is_err());

        let modules = repo.get_cost_modules_for_risk("R-1").unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].weight, 0.5);
    }

    #[test]
    fn test_mappings_filtered_by_keyword() {
        let mut repo = repo();
        repo.add_mapping(ControlRiskMapping::new("C-1", "ransomware operators", "unpatched servers", 0.9))
            .unwrap();
        repo.add_mapping(ControlRiskMapping::new("C-1", "insiders", "data exfiltration", 0.4))
            .unwrap();
        assert!(repo
            .add_mapping(ControlRiskMapping::new("C-1", "x", "y", 2.0))
            .is_err());

        let found = repo.get_mappings_for("Ransomware gangs", "Unpatched VPN").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].threat_community, "ransomware operators");
    }
}
