use donor_core::{Patient, PriorityTier};
use donor_registry::AlertQueue;
use donor_reports::DashboardKpis;
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

pub struct DashboardMetrics {
    registry: Registry,
    pub alert_score: GaugeVec,
    pub alerts_by_tier: IntGaugeVec,
    pub bundle_completeness_pct: GaugeVec,
    pub kpi: GaugeVec,
}

impl DashboardMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let alert_score = GaugeVec::new(
            Opts::new("donor_alert_score", "Priority alert score per patient"),
            &["patient_id", "tier"],
        )?;
        let alerts_by_tier = IntGaugeVec::new(
            Opts::new("donor_alerts_total", "Queued alerts per priority tier"),
            &["tier"],
        )?;
        let bundle_completeness_pct = GaugeVec::new(
            Opts::new(
                "donor_bundle_completeness_pct",
                "Bundle checklist completeness per patient",
            ),
            &["patient_id"],
        )?;
        let kpi = GaugeVec::new(
            Opts::new("donor_dashboard_kpi", "Dashboard KPI values"),
            &["name"],
        )?;

        registry.register(Box::new(alert_score.clone()))?;
        registry.register(Box::new(alerts_by_tier.clone()))?;
        registry.register(Box::new(bundle_completeness_pct.clone()))?;
        registry.register(Box::new(kpi.clone()))?;

        Ok(Self {
            registry,
            alert_score,
            alerts_by_tier,
            bundle_completeness_pct,
            kpi,
        })
    }

    /// Replaces the per-patient alert series with the current queue.
    pub fn observe_queue(&self, queue: &AlertQueue) {
        self.alert_score.reset();
        for alert in queue.items() {
            self.alert_score
                .with_label_values(&[alert.patient_id.as_str(), alert.priority_tier.label()])
                .set(f64::from(alert.score));
        }
        for tier in [PriorityTier::High, PriorityTier::Medium, PriorityTier::Low] {
            self.alerts_by_tier
                .with_label_values(&[tier.label()])
                .set(queue.tier_count(tier) as i64);
        }
    }

    pub fn observe_patients(&self, patients: &[Patient]) {
        self.bundle_completeness_pct.reset();
        for patient in patients {
            self.bundle_completeness_pct
                .with_label_values(&[patient.id.as_str()])
                .set(patient.bundle.completeness() * 100.0);
        }
    }

    /// Replaces the KPI series. Optional KPIs that are absent are not
    /// exported at all.
    pub fn observe_kpis(&self, kpis: &DashboardKpis) {
        self.kpi.reset();
        let values = [
            ("total", Some(kpis.total as f64)),
            ("potential", Some(kpis.potential as f64)),
            ("effective_donors", Some(kpis.effective_donors as f64)),
            ("t1_avg_hours", kpis.t1_avg_hours),
            ("t2_avg_hours", kpis.t2_avg_hours),
            ("t3_avg_hours", kpis.t3_avg_hours),
            ("sla_pct", kpis.sla_pct.map(f64::from)),
            ("bundle_avg_pct", Some(kpis.bundle_avg_pct)),
            ("risk_episodes_per_case", Some(kpis.risk_episodes_per_case)),
            ("hypernatremia_pct", kpis.hypernatremia_pct.map(f64::from)),
            ("hypoxemia_pct", kpis.hypoxemia_pct.map(f64::from)),
            ("potential_to_effective_pct", Some(f64::from(kpis.potential_to_effective_pct))),
            ("traceability_pct", Some(f64::from(kpis.traceability_pct))),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                self.kpi.with_label_values(&[name]).set(value);
            }
        }
    }

    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
