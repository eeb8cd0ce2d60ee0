pub mod report;

use anyhow::{Context, Result};
use fairq_core::dataset::load_dataset;
use fairq_core::exceedance::NamedCurve;
use fairq_core::policy::EngineConfig;
use fairq_core::repository::InMemoryRepository;
use fairq_core::types::TriangularEstimate;
use fairq_core::RiskEngine;
use serde::Serialize;
use std::path::Path;

/// A loaded dataset plus the configuration to evaluate it with
pub struct Session {
    repo: InMemoryRepository,
    config: EngineConfig,
    benchmarks: Vec<NamedCurve>,
}

impl Session {
    pub fn load(data: &Path, config: Option<&Path>) -> Result<Self> {
        let config = match config {
            Some(path) => {
                let path_str = path
                    .to_str()
                    .with_context(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
                EngineConfig::load(path_str)
                    .with_context(|| format!("Failed to load config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        let mut dataset = load_dataset(data)
            .with_context(|| format!("Failed to load dataset {}", data.display()))?;
        let benchmarks = std::mem::take(&mut dataset.benchmarks);
        let repo = dataset.into_repository().context("Dataset failed validation")?;
        log::info!(
            "[CLI] Loaded {} risks and {} controls from {}",
            repo.risk_count(),
            repo.control_count(),
            data.display()
        );

        Ok(Self {
            repo,
            config,
            benchmarks,
        })
    }

    pub fn engine(&self) -> RiskEngine<'_> {
        RiskEngine::new(&self.repo, self.config.clone())
    }

    pub fn benchmarks(&self) -> &[NamedCurve] {
        &self.benchmarks
    }
}

/// One CLI operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exposure { risk: String },
    Curve { risk: String, points: Option<usize> },
    Compare {
        risk: String,
        previous: Option<TriangularEstimate>,
        points: Option<usize>,
    },
    Costs { risk: String },
    Suggest { risk: String },
    Portfolio,
}

fn render<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text(value))
    }
}

/// Runs a command and returns its printable output
pub fn execute(session: &Session, command: &Command, json: bool) -> Result<String> {
    let engine = session.engine();
    match command {
        Command::Exposure { risk } => {
            let exposure = engine.compute_exposure(risk)?;
            render(&exposure, json, |e| report::format_exposure(risk, e))
        }
        Command::Curve { risk, points } => {
            let curve = engine.loss_exceedance_curve(risk, *points)?;
            render(&curve, json, |c| {
                report::format_curve(&format!("LOSS EXCEEDANCE: {}", risk), c)
            })
        }
        Command::Compare {
            risk,
            previous,
            points,
        } => {
            let comparison = engine.compare_loss_exceedance(
                risk,
                previous.as_ref(),
                session.benchmarks().to_vec(),
                *points,
            )?;
            render(&comparison, json, |c| report::format_comparison(risk, c))
        }
        Command::Costs { risk } => {
            let breakdown = engine.cost_impact(risk)?;
            render(&breakdown, json, report::format_cost_impact)
        }
        Command::Suggest { risk } => {
            let buckets = engine.suggest_controls(risk)?;
            render(&buckets, json, report::format_suggestions)
        }
        Command::Portfolio => {
            let summary = engine.portfolio_summary()?;
            render(&summary, json, report::format_portfolio)
        }
    }
}

/// Parses `MIN,AVG,MAX` into a triangular estimate
pub fn parse_triangle(s: &str) -> std::result::Result<TriangularEstimate, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v.trim(), e)))
        .collect::<std::result::Result<_, _>>()?;
    match values.as_slice() {
        [min, avg, max] => {
            TriangularEstimate::new("previous", *min, *avg, *max).map_err(|e| e.to_string())
        }
        _ => Err(format!("expected MIN,AVG,MAX but got {} values", values.len())),
    }
}
