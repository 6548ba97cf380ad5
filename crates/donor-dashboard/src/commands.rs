use anyhow::{bail, Context};
use chrono::Utc;
use donor_core::{compute_alert, AlertSignals, BundleItem, Patient, PatientId};
use donor_metrics::DashboardMetrics;
use donor_registry::{AlertQueue, KeyValueStore, PatientRepository};
use donor_reports::{DashboardKpis, ImpactReport};
use serde::Serialize;
use std::io::Write;
use tracing::info;

use crate::cli::Command;
use crate::config::DashboardConfig;

/// Finds a patient by full id, unique id prefix, or medical record number.
pub fn resolve_patient<S: KeyValueStore>(
    repo: &PatientRepository<S>,
    needle: &str,
) -> anyhow::Result<PatientId> {
    let needle = needle.trim();
    if let Some(p) = repo
        .list()
        .iter()
        .find(|p| p.id.as_str() == needle || p.medical_record.eq_ignore_ascii_case(needle))
    {
        return Ok(p.id.clone());
    }

    let matches: Vec<&Patient> = repo
        .list()
        .iter()
        .filter(|p| !needle.is_empty() && p.id.as_str().starts_with(needle))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("no patient matches {needle:?}"),
        _ => bail!("{needle:?} matches {} patients, use a longer prefix", matches.len()),
    }
}

fn emit_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn fmt_hours(h: Option<f64>) -> String {
    h.map_or_else(|| "-".to_string(), |h| format!("{h:.1}h"))
}

fn fmt_pct(p: Option<u32>) -> String {
    p.map_or_else(|| "-".to_string(), |p| format!("{p}%"))
}

fn short_id(id: &PatientId) -> String {
    id.as_str().chars().take(8).collect()
}

fn patient_line(p: &Patient) -> String {
    format!(
        "{:<10} {:<8} {:<24} {:<18} {:<12} bundle {:>3}%",
        p.medical_record,
        short_id(&p.id),
        p.full_name(),
        p.status.label(),
        p.conversion_stage.label(),
        p.bundle.percent()
    )
}

pub fn run<S: KeyValueStore, W: Write>(
    repo: &mut PatientRepository<S>,
    config: &DashboardConfig,
    command: Command,
    json: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Patients { search } => {
            let query = search.unwrap_or_default();
            let shown: Vec<&Patient> = repo
                .list()
                .iter()
                .filter(|p| p.matches_search(&query))
                .collect();
            if json {
                return emit_json(out, &shown);
            }
            if shown.is_empty() {
                writeln!(out, "No patients match {query:?}.")?;
            }
            for p in shown {
                writeln!(out, "{}", patient_line(p))?;
            }
        }

        Command::Show { patient } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.get(&id).context("patient disappeared")?;
            if json {
                return emit_json(out, p);
            }

            writeln!(out, "{} - {} ({})", p.medical_record, p.full_name(), p.id)?;
            writeln!(
                out,
                "age {}  sex {}  service {}  admitted {}",
                p.age,
                p.sex,
                p.service,
                p.admitted_at.format("%Y-%m-%d %H:%M")
            )?;
            writeln!(
                out,
                "status {}  stage {}  GCS {}  pupils {}  MAP {}  lactate {}",
                p.status,
                p.conversion_stage,
                p.glasgow_coma_score,
                p.pupil_reactivity,
                p.mean_arterial_pressure,
                p.lactate
            )?;
            writeln!(
                out,
                "bundle {}/{} ({}%)",
                p.bundle.done_count(),
                BundleItem::ALL.len(),
                p.bundle.percent()
            )?;
            for (item, entry) in p.bundle.iter() {
                let state = if entry.done { "done" } else { "pending" };
                let at = entry
                    .at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "  [{}] {:<28} {:<8} {:<16} {}",
                    if entry.done { 'x' } else { ' ' },
                    item.title(),
                    state,
                    at,
                    item.hint()
                )?;
            }
        }

        Command::Alerts { limit, record } => {
            let queue = AlertQueue::build(repo.list(), Utc::now());
            let shown = queue.top(limit.unwrap_or(config.queue_limit)).to_vec();
            if record {
                for alert in &shown {
                    repo.record_alert(alert)?;
                }
                info!(alerts = shown.len(), actor = repo.actor(), "alerts recorded on audit trail");
            }
            if json {
                return emit_json(out, &shown);
            }
            if shown.is_empty() {
                writeln!(out, "No eligible patients in the queue.")?;
            }
            for alert in &shown {
                let name = repo
                    .get(&alert.patient_id)
                    .map(|p| format!("{} - {}", p.medical_record, p.full_name()))
                    .unwrap_or_default();
                let reasons: Vec<&str> = alert.reasons.iter().map(|r| r.label.as_str()).collect();
                writeln!(
                    out,
                    "{:>3}  {:<6}  {:<36}  {}",
                    alert.score,
                    alert.priority_tier.label(),
                    name,
                    reasons.join(", ")
                )?;
            }
        }

        Command::Explain { patient } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.get(&id).context("patient disappeared")?;
            let alert = compute_alert(p.view());
            let signals = AlertSignals::from_view(&p.view());

            if json {
                #[derive(Serialize)]
                struct Explanation<'a> {
                    alert: &'a donor_core::AlertItem,
                    signals: &'a AlertSignals,
                    raw_total: f64,
                }
                return emit_json(
                    out,
                    &Explanation {
                        alert: &alert,
                        signals: &signals,
                        raw_total: signals.raw_total(),
                    },
                );
            }

            writeln!(out, "{} - {}", p.medical_record, p.full_name())?;
            writeln!(
                out,
                "score {} ({}), raw {:.2}",
                alert.score,
                alert.priority_tier,
                signals.raw_total()
            )?;
            for (name, value) in [
                ("neuro", signals.neuro),
                ("pupils", signals.pupils),
                ("pressure", signals.pressure),
                ("lactate", signals.lactate),
                ("delay", signals.delay),
                ("bundle quality", signals.quality_penalty),
                ("stage bonus", signals.stage_bonus),
            ] {
                writeln!(out, "  {name:<15} {value:>6.2}")?;
            }
            writeln!(out, "reasons:")?;
            for reason in &alert.reasons {
                writeln!(out, "  {:<24} {:>6.2}", reason.label, reason.weight)?;
            }
        }

        Command::Kpis => {
            let kpis = DashboardKpis::from_patients(repo.list());
            if json {
                return emit_json(out, &kpis);
            }
            writeln!(
                out,
                "patients {}  potential {}  under evaluation {}  effective {}  validated {}  referred {}",
                kpis.total,
                kpis.potential,
                kpis.under_evaluation,
                kpis.effective_donors,
                kpis.validated,
                kpis.referred
            )?;
            writeln!(
                out,
                "process  T1 {}  T2 {}  T3 {}  SLA {}",
                fmt_hours(kpis.t1_avg_hours),
                fmt_hours(kpis.t2_avg_hours),
                fmt_hours(kpis.t3_avg_hours),
                fmt_pct(kpis.sla_pct)
            )?;
            writeln!(
                out,
                "quality  bundle {:.0}%  risk episodes/case {:.1}  Na>150 {}  P/F<300 {}",
                kpis.bundle_avg_pct,
                kpis.risk_episodes_per_case,
                fmt_pct(kpis.hypernatremia_pct),
                fmt_pct(kpis.hypoxemia_pct)
            )?;
            writeln!(
                out,
                "impact   potential->effective {}%  consented->effective {}  avoidable loss {}  traceability {}%",
                kpis.potential_to_effective_pct,
                fmt_pct(kpis.consented_to_effective_pct),
                fmt_pct(kpis.avoidable_loss_pct),
                kpis.traceability_pct
            )?;
        }

        Command::Impact => {
            let report = ImpactReport::from_patients(repo.list());
            if json {
                return emit_json(out, &report);
            }
            writeln!(
                out,
                "total {}  effective {}  validated {}  discarded {}  conversion {}%",
                report.total,
                report.effective,
                report.validated,
                report.discarded,
                report.conversion_pct
            )?;
            for point in &report.trend {
                writeln!(out, "  {:<6} {:>3}%", point.label, point.conversion_pct)?;
            }
            for stage in &report.stage_distribution {
                writeln!(out, "  {:<10} {}", stage.stage.label(), stage.count)?;
            }
            if let Some(stage) = report.bottleneck() {
                writeln!(out, "bottleneck: {stage}")?;
            }
        }

        Command::Register(args) => {
            let patient = repo.register(args.into())?;
            if json {
                return emit_json(out, patient);
            }
            writeln!(out, "registered {}", patient_line(patient))?;
        }

        Command::Bundle { patient, item } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.toggle_bundle_item(&id, item)?;
            if json {
                return emit_json(out, p);
            }
            let state = if p.bundle.is_done(item) { "done" } else { "pending" };
            writeln!(out, "{}: {} ({}% complete)", item.title(), state, p.bundle.percent())?;
        }

        Command::Validate { patient } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.mark_validated(&id)?;
            if json {
                return emit_json(out, p);
            }
            writeln!(out, "{}", patient_line(p))?;
        }

        Command::Stage { patient, stage } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.change_stage(&id, stage)?;
            if json {
                return emit_json(out, p);
            }
            writeln!(out, "{}", patient_line(p))?;
        }

        Command::Status { patient, status } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.change_status(&id, status)?;
            if json {
                return emit_json(out, p);
            }
            writeln!(out, "{}", patient_line(p))?;
        }

        Command::History { patient } => {
            let id = resolve_patient(repo, &patient)?;
            let p = repo.get(&id).context("patient disappeared")?;
            if json {
                return emit_json(out, &p.events);
            }
            for event in &p.events {
                writeln!(
                    out,
                    "{}  {:<24} {}{}",
                    event.at.format("%Y-%m-%d %H:%M"),
                    event.by,
                    event.title,
                    event
                        .detail
                        .as_deref()
                        .map(|d| format!(" ({d})"))
                        .unwrap_or_default()
                )?;
            }
        }

        Command::Metrics => {
            let metrics = DashboardMetrics::new()?;
            metrics.observe_queue(&AlertQueue::build(repo.list(), Utc::now()));
            metrics.observe_patients(repo.list());
            metrics.observe_kpis(&DashboardKpis::from_patients(repo.list()));
            write!(out, "{}", metrics.render()?)?;
        }
    }
    Ok(())
}
