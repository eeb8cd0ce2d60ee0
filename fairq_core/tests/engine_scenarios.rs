use fairq_core::engine::RiskEngine;
use fairq_core::error::{EngineError, Result};
use fairq_core::exceedance::{ExceedancePoint, LossExceedanceCurve, NamedCurve};
use fairq_core::policy::EngineConfig;
use fairq_core::repository::{
    ControlRepository, ControlRiskMappingRepository, CostModuleRepository, InMemoryRepository,
    RiskRepository,
};
use fairq_core::suggestion::Priority;
use fairq_core::types::{
    Control, ControlCost, ControlRiskMapping, ControlType, CostModule, CostType, FairInputs,
    ImplementationStatus, Risk, RiskParameters, TriangularEstimate, WeightedCostModule,
};
use std::sync::Mutex;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tri(min: f64, avg: f64, max: f64) -> TriangularEstimate {
    TriangularEstimate { min, avg, max }
}

fn scenario_inputs() -> FairInputs {
    FairInputs::from(
        RiskParameters::new(
            tri(1.0, 5.0, 10.0),
            tri(0.1, 0.3, 0.5),
            tri(0.2, 0.5, 0.8),
            tri(0.2, 0.5, 0.8),
            tri(10_000.0, 50_000.0, 200_000.0),
        )
        .unwrap(),
    )
}

fn phishing_repo() -> InMemoryRepository {
    let mut repo = InMemoryRepository::new();
    repo.add_risk(
        Risk::new("R-1", "Credential phishing", scenario_inputs())
            .with_category("cyber")
            .with_legal_entity("Acme Ltd")
            .with_threat("External cybercriminals", "Phishing of employee credentials"),
    );
    repo
}

#[test]
fn test_scenario_a_inherent_exposure() {
    init_logger();
    let repo = phishing_repo();
    let engine = RiskEngine::new(&repo, EngineConfig::default());

    let exposure = engine.compute_exposure("R-1").unwrap();
    assert!((exposure.inherent.avg - 37_500.0).abs() < 1e-6);
    assert!(exposure.residual.avg <= exposure.inherent.avg);
}

#[test]
fn test_scenario_b_preventive_control() {
    init_logger();
    let mut repo = phishing_repo();
    repo.add_control(
        Control::new("C-1", "MFA", ControlType::Preventive)
            .with_score(8.0)
            .with_status(ImplementationStatus::FullyImplemented),
    )
    .unwrap();
    repo.associate_control("R-1", "C-1").unwrap();

    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let composition = engine.compose_effectiveness("R-1").unwrap();
    assert!((composition.scores.avoid - 0.4).abs() < 1e-9);
    assert!((composition.scores.deter - 0.4).abs() < 1e-9);

    let exposure = engine.compute_exposure("R-1").unwrap();
    let inherent_tef = exposure.inherent_breakdown.threat_event_frequency.avg;
    let residual_tef = exposure.residual_breakdown.threat_event_frequency.avg;
    assert!((residual_tef / inherent_tef - 0.36).abs() < 1e-12);

    assert_eq!(composition.scores.detect, 0.0);
    assert_eq!(composition.scores.resist, 0.0);
    assert!((exposure.residual.avg - 13_500.0).abs() < 1.0);
}

#[test]
fn test_cost_aggregation_percentage_module() {
    init_logger();
    let mut repo = InMemoryRepository::new();
    // contact 1, action 1, vulnerability 0.5, magnitude 200,000 => inherent 100,000
    let inputs = FairInputs::from(
        RiskParameters::new(
            tri(1.0, 1.0, 1.0),
            tri(1.0, 1.0, 1.0),
            tri(0.5, 0.5, 0.5),
            tri(0.5, 0.5, 0.5),
            tri(200_000.0, 200_000.0, 200_000.0),
        )
        .unwrap(),
    );
    repo.add_risk(Risk::new("R-9", "Outage", inputs));
    repo.add_cost_module(CostModule::new("M-1", "Fines", "regulatory", CostType::Percentage, 0.1))
        .unwrap();
    repo.attach_cost_module("R-9", "M-1", 1.0).unwrap();

    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let breakdown = engine.cost_impact("R-9").unwrap();
    assert!((breakdown.inherent_basis - 100_000.0).abs() < 1e-6);
    assert!((breakdown.total - 10_000.0).abs() < 1e-6);
}

#[test]
fn test_suggestions_for_zero_cost_control() {
    init_logger();
    let mut repo = phishing_repo();
    repo.add_control(Control::new("C-7", "Phishing simulation", ControlType::Preventive).with_score(6.0))
        .unwrap();
    repo.add_control(
        Control::new("C-8", "Email gateway", ControlType::Preventive)
            .with_score(7.0)
            .with_cost(ControlCost::fixed(500_000.0, 50_000.0)),
    )
    .unwrap();
    repo.add_mapping(ControlRiskMapping::new("C-7", "cybercriminals", "phishing", 1.0))
        .unwrap();
    repo.add_mapping(ControlRiskMapping::new("C-8", "cybercriminals", "phishing credentials", 1.0))
        .unwrap();

    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let buckets = engine.suggest_controls("R-1").unwrap();
    assert_eq!(buckets.likelihood_controls.len(), 2);

    let free = buckets.iter().find(|s| s.control_id == "C-7").unwrap();
    assert!(free.roi.is_unbounded());
    assert_eq!(free.priority, Priority::High);

    let expensive = buckets.iter().find(|s| s.control_id == "C-8").unwrap();
    assert_eq!(expensive.priority, Priority::Low);
    assert_eq!(expensive.annualized_control_cost, 550_000.0);
}

#[test]
fn test_exceedance_curve_is_strictly_ordered() {
    init_logger();
    let repo = phishing_repo();
    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let curve = engine.loss_exceedance_curve("R-1", None).unwrap();

    assert_eq!(curve.len(), 20);
    for pair in curve.points.windows(2) {
        assert!(pair[0].probability > pair[1].probability);
        assert!(pair[0].loss_amount < pair[1].loss_amount);
    }
}

#[test]
fn test_curve_comparison_against_previous_and_benchmark() {
    init_logger();
    let repo = phishing_repo();
    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let benchmark = NamedCurve {
        name: "Industry median".to_string(),
        curve: LossExceedanceCurve::from_points(
            "Industry median",
            vec![
                ExceedancePoint::new(0.9, 1_000.0),
                ExceedancePoint::new(0.5, 20_000.0),
                ExceedancePoint::new(0.1, 90_000.0),
            ],
        )
        .unwrap(),
    };

    let previous = tri(50_000.0, 500_000.0, 5_000_000.0);
    let comparison = engine
        .compare_loss_exceedance("R-1", Some(&previous), vec![benchmark], Some(8))
        .unwrap();
    assert_eq!(comparison.current.len(), 8);
    assert_eq!(comparison.benchmarks.len(), 1);
    assert!(!comparison.deltas.is_empty());
    assert!(comparison.deltas.iter().all(|d| d.change < 0.0));
}

#[test]
fn test_non_monotone_benchmark_rejected() {
    let repo = phishing_repo();
    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let benchmark = NamedCurve {
        name: "broken".to_string(),
        curve: LossExceedanceCurve {
            points: vec![
                ExceedancePoint::new(0.5, 10_000.0),
                ExceedancePoint::new(0.9, 20_000.0),
            ],
            percentile_90: None,
        },
    };
    let err = engine
        .compare_loss_exceedance("R-1", None, vec![benchmark], None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NonMonotoneCurve { .. }));
}

#[test]
fn test_portfolio_summary_excludes_failing_risks() {
    init_logger();
    let mut repo = phishing_repo();
    let mut missing = scenario_inputs();
    missing.primary_loss_magnitude = None;
    repo.add_risk(Risk::new("R-2", "Unknown magnitude", missing));
    repo.add_risk(Risk::new("R-3", "Vendor outage", scenario_inputs()));

    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let summary = engine.portfolio_summary().unwrap();

    assert_eq!(summary.total_risks, 3);
    assert_eq!(summary.evaluated_risks, 2);
    assert_eq!(summary.excluded.len(), 1);
    assert!(summary.excluded[0].reason.contains("primaryLossMagnitude"));
    assert!((summary.total_inherent.avg - 75_000.0).abs() < 1e-6);
    assert_eq!(summary.by_category["cyber"], 1);
    assert_eq!(summary.top_risks.len(), 2);
    assert!(!summary.loss_exceedance.is_empty());
}

/// Serves risks from an inner store and fails control lookups for one risk
struct FlakyControls {
    inner: InMemoryRepository,
    failing_risk: String,
    calls: Mutex<usize>,
}

impl RiskRepository for FlakyControls {
    fn get_risk(&self, id: &str) -> Result<Risk> {
        self.inner.get_risk(id)
    }

    fn get_all_risks(&self) -> Result<Vec<Risk>> {
        self.inner.get_all_risks()
    }
}

impl ControlRepository for FlakyControls {
    fn get_controls_for_risk(&self, risk_id: &str) -> Result<Vec<Control>> {
        *self.calls.lock().unwrap() += 1;
        if risk_id == self.failing_risk {
            return Err(EngineError::Repository("control store unavailable".to_string()));
        }
        self.inner.get_controls_for_risk(risk_id)
    }

    fn get_all_controls(&self) -> Result<Vec<Control>> {
        self.inner.get_all_controls()
    }
}

impl CostModuleRepository for FlakyControls {
    fn get_cost_modules_for_risk(&self, risk_id: &str) -> Result<Vec<WeightedCostModule>> {
        self.inner.get_cost_modules_for_risk(risk_id)
    }
}

impl ControlRiskMappingRepository for FlakyControls {
    fn get_mappings_for(&self, threat: &str, vulnerability: &str) -> Result<Vec<ControlRiskMapping>> {
        self.inner.get_mappings_for(threat, vulnerability)
    }
}

#[test]
fn test_repository_failure_skips_risk_in_portfolio() {
    init_logger();
    let mut inner = phishing_repo();
    inner.add_risk(Risk::new("R-2", "Insider fraud", scenario_inputs()));
    let repo = FlakyControls {
        inner,
        failing_risk: "R-2".to_string(),
        calls: Mutex::new(0),
    };

    let engine = RiskEngine::new(&repo, EngineConfig::default());
    let summary = engine.portfolio_summary().unwrap();
    assert_eq!(summary.evaluated_risks, 1);
    assert_eq!(summary.excluded[0].risk_id, "R-2");
    assert!(summary.excluded[0].reason.contains("control store unavailable"));
    assert_eq!(*repo.calls.lock().unwrap(), 2);

    let err = engine.compute_exposure("R-2").unwrap_err();
    assert!(!err.is_validation());
}

#[test]
fn test_residual_never_exceeds_inherent_for_any_control_mix() {
    let statuses = [
        ImplementationStatus::FullyImplemented,
        ImplementationStatus::InProgress,
        ImplementationStatus::Planned,
    ];
    let types = [ControlType::Preventive, ControlType::Detective, ControlType::Corrective];

    let mut repo = phishing_repo();
    let mut n = 0;
    for status in statuses {
        for control_type in types {
            for score in [0.0, 3.0, 10.0] {
                n += 1;
                let id = format!("C-{}", n);
                repo.add_control(Control::new(&id, "grid", control_type).with_score(score).with_status(status))
                    .unwrap();
                repo.associate_control("R-1", &id).unwrap();

                let engine = RiskEngine::new(&repo, EngineConfig::default());
                let exposure = engine.compute_exposure("R-1").unwrap();
                assert!(exposure.residual.min <= exposure.inherent.min);
                assert!(exposure.residual.avg <= exposure.inherent.avg);
                assert!(exposure.residual.max <= exposure.inherent.max);
            }
        }
    }
}
