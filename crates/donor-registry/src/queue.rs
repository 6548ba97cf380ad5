use chrono::{DateTime, Utc};
use donor_core::{compute_alert_at, AlertItem, Patient, PatientId, PatientStatus, PriorityTier};
use serde::Serialize;
use tracing::debug;

/// Work queue of priority alerts, highest score first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertQueue {
    items: Vec<AlertItem>,
}

impl AlertQueue {
    /// Scores every patient still eligible for donation. Equal scores keep
    /// the repository order.
    pub fn build<'a>(patients: impl IntoIterator<Item = &'a Patient>, now: DateTime<Utc>) -> Self {
        let mut items: Vec<AlertItem> = patients
            .into_iter()
            .filter(|p| p.status != PatientStatus::NotEligible)
            .map(|p| compute_alert_at(p.view(), now))
            .collect();
        items.sort_by(|a, b| b.score.cmp(&a.score));

        debug!(
            alerts = items.len(),
            high = items.iter().filter(|a| a.priority_tier == PriorityTier::High).count(),
            "alert queue built"
        );
        Self { items }
    }

    pub fn items(&self) -> &[AlertItem] {
        &self.items
    }

    pub fn top(&self, n: usize) -> &[AlertItem] {
        &self.items[..n.min(self.items.len())]
    }

    pub fn for_patient(&self, id: &PatientId) -> Option<&AlertItem> {
        self.items.iter().find(|a| &a.patient_id == id)
    }

    pub fn tier_count(&self, tier: PriorityTier) -> usize {
        self.items.iter().filter(|a| a.priority_tier == tier).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
