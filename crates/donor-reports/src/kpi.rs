use chrono::{DateTime, Utc};
use donor_core::{ConversionStage, Patient, PatientStatus};
use serde::{Deserialize, Serialize};

/// Suspicion -> notification target.
pub const T1_STANDARD_HOURS: f64 = 1.0;
/// Notification -> protocol start target.
pub const T2_STANDARD_HOURS: f64 = 1.0;
/// Protocol start -> brain-death confirmation target.
pub const T3_STANDARD_HOURS: f64 = 6.0;

pub const SODIUM_TARGET_MAX: f64 = 150.0;
pub const PF_RATIO_TARGET_MIN: f64 = 300.0;

pub fn hours_between(later: Option<DateTime<Utc>>, earlier: Option<DateTime<Utc>>) -> Option<f64> {
    let (later, earlier) = (later?, earlier?);
    Some((later - earlier).num_milliseconds() as f64 / 3_600_000.0)
}

/// Mean of the present values, `None` when there are none.
pub fn average(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Rounded percentage; zero when the denominator is zero.
pub fn percent(num: usize, den: usize) -> u32 {
    if den == 0 {
        return 0;
    }
    (num as f64 / den as f64 * 100.0).round() as u32
}

fn percent_of_present(num: usize, den: usize) -> Option<u32> {
    (den > 0).then(|| percent(num, den))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardKpis {
    pub total: usize,
    pub potential: usize,
    pub under_evaluation: usize,
    pub effective_donors: usize,
    pub validated: usize,
    pub referred: usize,

    pub t1_avg_hours: Option<f64>,
    pub t2_avg_hours: Option<f64>,
    pub t3_avg_hours: Option<f64>,
    /// Share of fully time-stamped cases meeting all three interval targets.
    pub sla_pct: Option<u32>,

    pub bundle_avg_pct: f64,
    pub risk_episodes_per_case: f64,
    pub hypernatremia_pct: Option<u32>,
    pub hypoxemia_pct: Option<u32>,

    pub potential_to_effective_pct: u32,
    pub consented_to_effective_pct: Option<u32>,
    pub avoidable_loss_pct: Option<u32>,
    pub traceability_pct: u32,
}

impl DashboardKpis {
    pub fn from_patients(patients: &[Patient]) -> Self {
        let count = |f: fn(&Patient) -> bool| patients.iter().filter(|p| f(p)).count();

        let total = patients.len();
        let potential = count(|p| p.status == PatientStatus::Potential);
        let under_evaluation = count(|p| p.status == PatientStatus::UnderEvaluation);
        let effective_donors = count(|p| p.status == PatientStatus::EffectiveDonor);
        let validated = count(|p| p.conversion_stage == ConversionStage::Validated);
        let referred = count(|p| p.conversion_stage == ConversionStage::Referred);

        let t1 = |p: &Patient| hours_between(p.notification_at, p.suspicion_at);
        let t2 = |p: &Patient| hours_between(p.protocol_start_at, p.notification_at);
        let t3 = |p: &Patient| hours_between(p.brain_death_confirmed_at, p.protocol_start_at);

        let timed: Vec<&Patient> = patients
            .iter()
            .filter(|p| {
                p.suspicion_at.is_some()
                    && p.notification_at.is_some()
                    && p.protocol_start_at.is_some()
                    && p.brain_death_confirmed_at.is_some()
            })
            .collect();
        let within_sla = timed
            .iter()
            .filter(|p| {
                t1(p).unwrap_or(f64::MAX) <= T1_STANDARD_HOURS
                    && t2(p).unwrap_or(f64::MAX) <= T2_STANDARD_HOURS
                    && t3(p).unwrap_or(f64::MAX) <= T3_STANDARD_HOURS
            })
            .count();

        let bundle_avg_pct = average(
            patients
                .iter()
                .map(|p| Some(p.bundle.completeness() * 100.0)),
        )
        .unwrap_or(0.0);
        let risk_episodes_per_case = average(
            patients
                .iter()
                .map(|p| Some(f64::from(p.risk_episodes.total()))),
        )
        .unwrap_or(0.0);

        let with_sodium = count(|p| p.sodium.is_some());
        let hypernatremic = count(|p| p.sodium.map_or(false, |na| na > SODIUM_TARGET_MAX));
        let with_pf = count(|p| p.pf_ratio.is_some());
        let hypoxemic = count(|p| p.pf_ratio.map_or(false, |pf| pf < PF_RATIO_TARGET_MIN));

        let consented = count(|p| p.consented);
        let avoidable = count(|p| p.avoidable_loss);
        let traced = count(|p| !p.events.is_empty());

        Self {
            total,
            potential,
            under_evaluation,
            effective_donors,
            validated,
            referred,
            t1_avg_hours: average(patients.iter().map(t1)),
            t2_avg_hours: average(patients.iter().map(t2)),
            t3_avg_hours: average(patients.iter().map(t3)),
            sla_pct: percent_of_present(within_sla, timed.len()),
            bundle_avg_pct,
            risk_episodes_per_case,
            hypernatremia_pct: percent_of_present(hypernatremic, with_sodium),
            hypoxemia_pct: percent_of_present(hypoxemic, with_pf),
            potential_to_effective_pct: percent(effective_donors, potential),
            consented_to_effective_pct: percent_of_present(effective_donors, consented),
            avoidable_loss_pct: percent_of_present(avoidable, potential),
            traceability_pct: percent(traced, total),
        }
    }
}
