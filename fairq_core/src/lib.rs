// Core engine for FAIRQ: FAIR risk quantification, control effectiveness,
// loss exceedance curves, cost impact and control suggestions.

// Records, errors and configuration
pub mod error;
pub mod policy;
pub mod types;

// Calculators
pub mod cost_impact;
pub mod effectiveness;
pub mod exceedance;
pub mod exposure;
pub mod portfolio;
pub mod suggestion;

// Data access and orchestration
pub mod cache;
pub mod dataset;
pub mod engine;
pub mod repository;

pub use engine::RiskEngine;
pub use error::{EngineError, Result};
pub use policy::EngineConfig;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), "0.1.0");
    }
}
