//! Dataset files: risks, controls, cost modules and mappings in one YAML or
//! JSON document, loaded into an [`InMemoryRepository`].
//!
//! ```yaml
//! risks:
//!   - id: R-1
//!     name: Credential phishing
//!     threatCommunity: External cybercriminals
//!     vulnerability: Phishing of employee credentials
//!     parameters:
//!       contactFrequency: { min: 1, avg: 5, max: 10 }
//!       ...
//! controls: [...]
//! costModules: [...]
//! mappings: [...]
//! associations:
//!   - { riskId: R-1, controlId: C-1 }
//! costAttachments:
//!   - { riskId: R-1, moduleId: M-1, weight: 0.5 }
//! ```

use crate::error::EngineError;
use crate::exceedance::NamedCurve;
use crate::repository::InMemoryRepository;
use crate::types::{default_weight, Control, ControlRiskMapping, CostModule, Risk};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid dataset: {0}")]
    Invalid(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAssociation {
    #[serde(alias = "risk_id")]
    pub risk_id: String,
    #[serde(alias = "control_id")]
    pub control_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAttachment {
    #[serde(alias = "risk_id")]
    pub risk_id: String,
    #[serde(alias = "module_id")]
    pub module_id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dataset {
    pub risks: Vec<Risk>,
    pub controls: Vec<Control>,
    #[serde(alias = "cost_modules")]
    pub cost_modules: Vec<CostModule>,
    pub mappings: Vec<ControlRiskMapping>,
    pub associations: Vec<ControlAssociation>,
    #[serde(alias = "cost_attachments")]
    pub cost_attachments: Vec<CostAttachment>,
    /// Reference curves for exceedance comparisons
    pub benchmarks: Vec<NamedCurve>,
}

impl Dataset {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DatasetError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds a repository, validating every control, module, mapping and link
    pub fn into_repository(self) -> Result<InMemoryRepository, DatasetError> {
        let mut repo = InMemoryRepository::new();
        for risk in self.risks {
            repo.add_risk(risk);
        }
        for control in self.controls {
            repo.add_control(control)?;
        }
        for module in self.cost_modules {
            repo.add_cost_module(module)?;
        }
        for mapping in self.mappings {
            repo.add_mapping(mapping)?;
        }
        for link in &self.associations {
            repo.associate_control(&link.risk_id, &link.control_id)?;
        }
        for attachment in &self.cost_attachments {
            repo.attach_cost_module(&attachment.risk_id, &attachment.module_id, attachment.weight)?;
        }
        Ok(repo)
    }
}

/// Loads a dataset; `.json` files are parsed as JSON, anything else as YAML
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let dataset: Dataset = if is_json {
        serde_json::from_reader(reader)?
    } else {
        serde_yaml::from_reader(reader)?
    };

    log::info!(
        "[DATASET] Loaded {} risks, {} controls, {} cost modules, {} mappings from {}",
        dataset.risks.len(),
        dataset.controls.len(),
        dataset.cost_modules.len(),
        dataset.mappings.len(),
        path.display()
    );
    Ok(dataset)
}
