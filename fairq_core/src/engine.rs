use crate::cache::ExposureCache;
use crate::cost_impact::{aggregate_cost_impact, CostImpactBreakdown};
use crate::effectiveness::{compose, Composition};
use crate::error::Result;
use crate::exceedance::{
    compare_curves, generate_curve, generate_portfolio_curve, CurveComparison, LossExceedanceCurve,
    NamedCurve,
};
use crate::exposure::{calculate_exposure, RiskExposure};
use crate::policy::EngineConfig;
use crate::portfolio::{summarize, ExcludedRisk, PortfolioSummary, RiskEvaluation};
use crate::repository::{
    ControlRepository, ControlRiskMappingRepository, CostModuleRepository, Repository,
    RiskRepository,
};
use crate::suggestion::{rank_controls, ControlSuggestionBuckets};
use crate::types::{Control, Risk, RiskParameters, TriangularEstimate};

/// Entry point wiring the repositories to the calculators.
///
/// Holds shared references and an immutable config only; every call
/// recomputes from current repository state.
pub struct RiskEngine<'a> {
    risks: &'a dyn RiskRepository,
    controls: &'a dyn ControlRepository,
    cost_modules: &'a dyn CostModuleRepository,
    mappings: &'a dyn ControlRiskMappingRepository,
    config: EngineConfig,
}

/// A risk with validated parameters and its current controls
struct LoadedRisk {
    risk: Risk,
    params: RiskParameters,
    controls: Vec<Control>,
}

impl<'a> RiskEngine<'a> {
    /// Engine over one store implementing every repository trait
    pub fn new<R: Repository + 'a>(repo: &'a R, config: EngineConfig) -> Self {
        Self {
            risks: repo,
            controls: repo,
            cost_modules: repo,
            mappings: repo,
            config,
        }
    }

    pub fn with_repositories(
        risks: &'a dyn RiskRepository,
        controls: &'a dyn ControlRepository,
        cost_modules: &'a dyn CostModuleRepository,
        mappings: &'a dyn ControlRiskMappingRepository,
        config: EngineConfig,
    ) -> Self {
        Self {
            risks,
            controls,
            cost_modules,
            mappings,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn load(&self, risk: Risk) -> Result<LoadedRisk> {
        let params = risk.parameters()?;
        let controls = self.controls.get_controls_for_risk(&risk.id)?;
        Ok(LoadedRisk {
            risk,
            params,
            controls,
        })
    }

    fn load_by_id(&self, risk_id: &str) -> Result<LoadedRisk> {
        let risk = self.risks.get_risk(risk_id)?;
        self.load(risk)
    }

    fn exposure_of(&self, loaded: &LoadedRisk) -> (RiskExposure, Composition) {
        let composition = compose(&loaded.controls, &self.config.effectiveness);
        let exposure = calculate_exposure(&loaded.params, &composition.scores, &self.config.exposure);
        (exposure, composition)
    }

    /// Aggregate effectiveness of the controls associated with a risk
    pub fn compose_effectiveness(&self, risk_id: &str) -> Result<Composition> {
        let controls = self.controls.get_controls_for_risk(risk_id)?;
        Ok(compose(&controls, &self.config.effectiveness))
    }

    /// Inherent and residual exposure of one risk
    pub fn compute_exposure(&self, risk_id: &str) -> Result<RiskExposure> {
        let loaded = self.load_by_id(risk_id)?;
        let (exposure, _) = self.exposure_of(&loaded);
        log::info!(
            "[ENGINE] Risk {}: inherent {:.2}, residual {:.2}",
            risk_id,
            exposure.inherent.avg,
            exposure.residual.avg
        );
        Ok(exposure)
    }

    pub fn loss_exceedance_curve(
        &self,
        risk_id: &str,
        resolution: Option<usize>,
    ) -> Result<LossExceedanceCurve> {
        let exposure = self.compute_exposure(risk_id)?;
        Ok(generate_curve(&exposure.residual, resolution, &self.config.exceedance))
    }

    /// Current curve next to a previous residual and benchmark curves
    pub fn compare_loss_exceedance(
        &self,
        risk_id: &str,
        previous_residual: Option<&TriangularEstimate>,
        benchmarks: Vec<NamedCurve>,
        resolution: Option<usize>,
    ) -> Result<CurveComparison> {
        if let Some(previous) = previous_residual {
            previous.validate("previousResidual")?;
        }
        let exposure = self.compute_exposure(risk_id)?;
        compare_curves(
            &exposure.residual,
            previous_residual,
            benchmarks,
            resolution,
            &self.config.exceedance,
        )
    }

    pub fn cost_impact(&self, risk_id: &str) -> Result<CostImpactBreakdown> {
        let loaded = self.load_by_id(risk_id)?;
        let (exposure, _) = self.exposure_of(&loaded);
        let modules = self.cost_modules.get_cost_modules_for_risk(risk_id)?;
        aggregate_cost_impact(&loaded.risk, exposure.inherent.avg, &modules)
    }

    /// Ranked control suggestions for one risk
    pub fn suggest_controls(&self, risk_id: &str) -> Result<ControlSuggestionBuckets> {
        let loaded = self.load_by_id(risk_id)?;
        let catalog = self.controls.get_all_controls()?;
        let mappings = self
            .mappings
            .get_mappings_for(&loaded.risk.threat_community, &loaded.risk.vulnerability)?;
        Ok(rank_controls(
            &loaded.risk,
            &loaded.params,
            &loaded.controls,
            &catalog,
            &mappings,
            &self.config,
        ))
    }

    fn evaluate(&self, risk: Risk, cache: &mut ExposureCache) -> Result<RiskEvaluation> {
        let loaded = self.load(risk)?;
        let (exposure, _) = cache.get_or_compute(&loaded.params, &loaded.controls, || {
            self.exposure_of(&loaded)
        });
        let modules = self.cost_modules.get_cost_modules_for_risk(&loaded.risk.id)?;
        let cost_impact = aggregate_cost_impact(&loaded.risk, exposure.inherent.avg, &modules)?;

        Ok(RiskEvaluation {
            risk_id: loaded.risk.id,
            name: loaded.risk.name,
            category: loaded.risk.category,
            identified_at: loaded.risk.identified_at,
            exposure,
            cost_impact,
        })
    }

    fn evaluate_all(&self) -> Result<(usize, Vec<RiskEvaluation>, Vec<ExcludedRisk>)> {
        let risks = self.risks.get_all_risks()?;
        let total = risks.len();
        let mut cache = ExposureCache::new();
        let mut evaluations = Vec::with_capacity(total);
        let mut excluded = Vec::new();

        for risk in risks {
            let risk_id = risk.id.clone();
            match self.evaluate(risk, &mut cache) {
                Ok(evaluation) => evaluations.push(evaluation),
                Err(e) => {
                    log::warn!("[ENGINE] Skipping risk {}: {}", risk_id, e);
                    excluded.push(ExcludedRisk {
                        risk_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::debug!(
            "[CACHE] {} hits, {} misses over {} risks",
            cache.hits(),
            cache.misses(),
            total
        );
        Ok((total, evaluations, excluded))
    }

    /// Portfolio summary; risks that fail evaluation are skipped and recorded
    pub fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        let (total, evaluations, excluded) = self.evaluate_all()?;
        let all_controls = self.controls.get_all_controls()?;
        Ok(summarize(
            total,
            &evaluations,
            excluded,
            &all_controls,
            &self.config,
        ))
    }

    /// Portfolio curve alone, at a caller-chosen resolution
    pub fn portfolio_loss_exceedance(&self, resolution: Option<usize>) -> Result<LossExceedanceCurve> {
        let (_, evaluations, _) = self.evaluate_all()?;
        let residuals: Vec<TriangularEstimate> =
            evaluations.iter().map(|e| e.exposure.residual).collect();
        Ok(generate_portfolio_curve(&residuals, resolution, &self.config.exceedance))
    }
}
