/// Plain-text reports for engine results
use fairq_core::cost_impact::CostImpactBreakdown;
use fairq_core::exceedance::{CurveComparison, LossExceedanceCurve};
use fairq_core::exposure::RiskExposure;
use fairq_core::portfolio::{PortfolioSummary, Severity};
use fairq_core::suggestion::{ControlSuggestion, ControlSuggestionBuckets, Metric};
use fairq_core::types::TriangularEstimate;
use std::fmt::Write;

const RULE: &str = "══════════════════════════════════════════════════════════════";

fn header(out: &mut String, title: &str) {
    let _ = writeln!(out, "╔{}╗", RULE);
    let _ = writeln!(out, "║  {:<60}║", title);
    let _ = writeln!(out, "╠{}╣", RULE);
}

fn divider(out: &mut String) {
    let _ = writeln!(out, "╠{}╣", RULE);
}

fn footer(out: &mut String) {
    let _ = writeln!(out, "╚{}╝", RULE);
}

/// Formats an amount with thousands separators, e.g. `1,234,567.89`
pub fn money(amount: f64) -> String {
    let negative = amount < 0.0;
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, fraction)
}

fn triangle(estimate: &TriangularEstimate) -> String {
    format!(
        "{} / {} / {}",
        money(estimate.min),
        money(estimate.avg),
        money(estimate.max)
    )
}

pub fn format_exposure(risk_id: &str, exposure: &RiskExposure) -> String {
    let mut out = String::new();
    header(&mut out, &format!("RISK EXPOSURE: {}", risk_id));
    let _ = writeln!(out, "║  Inherent (min/avg/max): {}", triangle(&exposure.inherent));
    let _ = writeln!(out, "║  Residual (min/avg/max): {}", triangle(&exposure.residual));
    let _ = writeln!(
        out,
        "║  Reduction: {} ({:.1}%)",
        money(exposure.risk_reduction()),
        exposure.reduction_ratio() * 100.0
    );
    divider(&mut out);
    let e = &exposure.effectiveness;
    let _ = writeln!(
        out,
        "║  Effectiveness  avoid {:.2}  deter {:.2}  detect {:.2}  resist {:.2}",
        e.avoid, e.deter, e.detect, e.resist
    );
    let r = &exposure.residual_breakdown;
    let _ = writeln!(
        out,
        "║  Residual TEF {:.3}  vuln {:.3}  LEF {:.3}  LM {}",
        r.threat_event_frequency.avg,
        r.vulnerability.avg,
        r.loss_event_frequency.avg,
        money(r.loss_magnitude.avg)
    );
    footer(&mut out);
    out
}

pub fn format_curve(title: &str, curve: &LossExceedanceCurve) -> String {
    let mut out = String::new();
    header(&mut out, title);
    if curve.is_empty() {
        let _ = writeln!(out, "║  No material residual risk; curve is empty");
    } else {
        for point in &curve.points {
            let _ = writeln!(
                out,
                "║  P(loss > {:>18}) = {:>5.1}%",
                money(point.loss_amount),
                point.probability * 100.0
            );
        }
        if let Some(p90) = curve.percentile_90 {
            divider(&mut out);
            let _ = writeln!(out, "║  Implied 90th percentile: {}", money(p90));
        }
    }
    footer(&mut out);
    out
}

pub fn format_comparison(risk_id: &str, comparison: &CurveComparison) -> String {
    let mut out = format_curve(&format!("LOSS EXCEEDANCE: {}", risk_id), &comparison.current);
    if !comparison.deltas.is_empty() {
        out.push_str(&format!("\nChange against previous period ({} points):\n", comparison.deltas.len()));
        for delta in &comparison.deltas {
            let _ = writeln!(
                out,
                "  p={:.2}  {} -> {}  ({}{})",
                delta.probability,
                money(delta.previous_loss),
                money(delta.current_loss),
                if delta.change >= 0.0 { "+" } else { "" },
                money(delta.change)
            );
        }
    }
    for benchmark in &comparison.benchmarks {
        let _ = writeln!(out, "\nBenchmark: {}", benchmark.name);
        for point in &benchmark.curve.points {
            let _ = writeln!(
                out,
                "  P(loss > {}) = {:.1}%",
                money(point.loss_amount),
                point.probability * 100.0
            );
        }
    }
    out
}

pub fn format_cost_impact(breakdown: &CostImpactBreakdown) -> String {
    let mut out = String::new();
    header(&mut out, &format!("COST IMPACT: {}", breakdown.risk_id));
    let _ = writeln!(
        out,
        "║  Legal entity: {}",
        breakdown.legal_entity.as_deref().unwrap_or("unassigned")
    );
    let _ = writeln!(out, "║  Inherent basis: {}", money(breakdown.inherent_basis));
    let _ = writeln!(out, "║  Total impact:   {}", money(breakdown.total));
    if !breakdown.contributions.is_empty() {
        divider(&mut out);
        for c in &breakdown.contributions {
            let _ = writeln!(
                out,
                "║  {:<28} {:<11} x{:<5} {}",
                c.module_name,
                c.cost_type.as_str(),
                c.weight,
                money(c.contribution)
            );
        }
    }
    footer(&mut out);
    out
}

fn roi_text(roi: &Metric) -> String {
    match roi {
        Metric::Finite(v) => format!("{:.1}%", v),
        other => other.to_string(),
    }
}

fn payback_text(payback: &Metric) -> String {
    match payback {
        Metric::Finite(v) => format!("{:.1} months", v),
        other => other.to_string(),
    }
}

fn suggestion_line(out: &mut String, s: &ControlSuggestion) {
    let label = if s.is_associated { "in place" } else { s.priority.as_str() };
    let _ = writeln!(
        out,
        "║  [{:<8}] {} {} (match {:.0})",
        label,
        s.control_id,
        s.control_name,
        s.match_score
    );
    let _ = writeln!(
        out,
        "║             reduction {}  cost {}  ROI {}  payback {}",
        money(s.estimated_risk_reduction),
        money(s.annualized_control_cost),
        roi_text(&s.roi),
        payback_text(&s.payback_months)
    );
}

pub fn format_suggestions(buckets: &ControlSuggestionBuckets) -> String {
    let mut out = String::new();
    header(&mut out, &format!("CONTROL SUGGESTIONS: {}", buckets.risk_id));
    let _ = writeln!(out, "║  Current residual: {}", money(buckets.current_residual));
    if !buckets.associated_control_ids.is_empty() {
        let _ = writeln!(
            out,
            "║  Already associated: {}",
            buckets.associated_control_ids.join(", ")
        );
    }

    let sections = [
        ("LIKELIHOOD", &buckets.likelihood_controls),
        ("MAGNITUDE", &buckets.magnitude_controls),
        ("BOTH", &buckets.both_controls),
    ];
    for (label, suggestions) in sections {
        if suggestions.is_empty() {
            continue;
        }
        divider(&mut out);
        let _ = writeln!(out, "║  {}:", label);
        for s in suggestions {
            suggestion_line(&mut out, s);
        }
    }
    if buckets.total() == 0 {
        let _ = writeln!(out, "║  No matching controls");
    }
    if !buckets.associated_controls.is_empty() {
        divider(&mut out);
        let _ = writeln!(out, "║  ALREADY IN PLACE:");
        for s in &buckets.associated_controls {
            suggestion_line(&mut out, s);
        }
    }
    footer(&mut out);
    out
}

pub fn format_portfolio(summary: &PortfolioSummary) -> String {
    let mut out = String::new();
    header(&mut out, "PORTFOLIO RISK SUMMARY");
    let _ = writeln!(
        out,
        "║  Risks evaluated: {}/{} ({} excluded)",
        summary.evaluated_risks,
        summary.total_risks,
        summary.excluded.len()
    );
    let _ = writeln!(out, "║  Inherent: {}", triangle(&summary.total_inherent));
    let _ = writeln!(out, "║  Residual: {}", triangle(&summary.total_residual));
    let _ = writeln!(out, "║  Reduction: {:.1}%", summary.reduction_ratio * 100.0);
    let _ = writeln!(out, "║  Cost impact: {}", money(summary.cost_impact.total));
    divider(&mut out);
    let _ = writeln!(out, "║  BREAKDOWN BY SEVERITY:");
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        let _ = writeln!(
            out,
            "║  {} {:<9} {}",
            severity.color_code(),
            severity.as_str(),
            summary.severity_count(severity)
        );
    }
    if !summary.top_risks.is_empty() {
        divider(&mut out);
        let _ = writeln!(out, "║  TOP RISKS:");
        for (rank, risk) in summary.top_risks.iter().enumerate() {
            let _ = writeln!(
                out,
                "║  {}. {} {} residual {} ({})",
                rank + 1,
                risk.severity.color_code(),
                risk.risk_id,
                money(risk.residual_avg),
                risk.name
            );
        }
    }
    if !summary.excluded.is_empty() {
        divider(&mut out);
        let _ = writeln!(out, "║  EXCLUDED:");
        for excluded in &summary.excluded {
            let _ = writeln!(out, "║  {}: {}", excluded.risk_id, excluded.reason);
        }
    }
    footer(&mut out);
    out
}
