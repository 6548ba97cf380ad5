use crate::ParseLabelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven canonical items of the donor-maintenance bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BundleItem {
    NeuroMonitoring,
    ContraindicationScreening,
    ConfirmatoryTests,
    HemodynamicStability,
    OptimizedVentilation,
    KeyLabs,
    ConsentProcess,
}

impl BundleItem {
    pub const ALL: [BundleItem; 7] = [
        BundleItem::NeuroMonitoring,
        BundleItem::ContraindicationScreening,
        BundleItem::ConfirmatoryTests,
        BundleItem::HemodynamicStability,
        BundleItem::OptimizedVentilation,
        BundleItem::KeyLabs,
        BundleItem::ConsentProcess,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BundleItem::NeuroMonitoring => "neuro_monitoring",
            BundleItem::ContraindicationScreening => "contraindication_screening",
            BundleItem::ConfirmatoryTests => "confirmatory_tests",
            BundleItem::HemodynamicStability => "hemodynamic_stability",
            BundleItem::OptimizedVentilation => "optimized_ventilation",
            BundleItem::KeyLabs => "key_labs",
            BundleItem::ConsentProcess => "consent_process",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            BundleItem::NeuroMonitoring => "Active neuro-monitoring",
            BundleItem::ContraindicationScreening => "Contraindication screening",
            BundleItem::ConfirmatoryTests => "Confirmatory tests",
            BundleItem::HemodynamicStability => "Hemodynamic stabilization",
            BundleItem::OptimizedVentilation => "Optimized ventilation",
            BundleItem::KeyLabs => "Key laboratory panel",
            BundleItem::ConsentProcess => "Consent process",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            BundleItem::NeuroMonitoring => "Systematic surveillance and charting.",
            BundleItem::ContraindicationScreening => "Checklist plus supporting evidence.",
            BundleItem::ConfirmatoryTests => "Milestone recorded and traceable.",
            BundleItem::HemodynamicStability => "Operational target per shift.",
            BundleItem::OptimizedVentilation => "Target ventilator parameters.",
            BundleItem::KeyLabs => "Ordered and tracked.",
            BundleItem::ConsentProcess => "Family conversation progress.",
        }
    }
}

impl fmt::Display for BundleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for BundleItem {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = crate::normalize_label(s);
        BundleItem::ALL
            .into_iter()
            .find(|item| crate::normalize_label(item.key()) == wanted)
            .ok_or_else(|| ParseLabelError::new("bundle item", s))
    }
}

/// State of one checklist item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BundleEntry {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl BundleEntry {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn done_at(at: DateTime<Utc>) -> Self {
        Self {
            done: true,
            at: Some(at),
            note: None,
        }
    }
}

/// Fixed-shape checklist: every patient carries exactly the seven
/// canonical items, so completeness never divides by zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BundleChecklist {
    pub neuro_monitoring: BundleEntry,
    pub contraindication_screening: BundleEntry,
    pub confirmatory_tests: BundleEntry,
    pub hemodynamic_stability: BundleEntry,
    pub optimized_ventilation: BundleEntry,
    pub key_labs: BundleEntry,
    pub consent_process: BundleEntry,
}

impl BundleChecklist {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a checklist where exactly `done` items are complete.
    pub fn with_done(done: &[BundleItem], at: DateTime<Utc>) -> Self {
        let mut checklist = Self::empty();
        for item in done {
            checklist.set(*item, true, at);
        }
        checklist
    }

    pub fn entry(&self, item: BundleItem) -> &BundleEntry {
        match item {
            BundleItem::NeuroMonitoring => &self.neuro_monitoring,
            BundleItem::ContraindicationScreening => &self.contraindication_screening,
            BundleItem::ConfirmatoryTests => &self.confirmatory_tests,
            BundleItem::HemodynamicStability => &self.hemodynamic_stability,
            BundleItem::OptimizedVentilation => &self.optimized_ventilation,
            BundleItem::KeyLabs => &self.key_labs,
            BundleItem::ConsentProcess => &self.consent_process,
        }
    }

    pub fn entry_mut(&mut self, item: BundleItem) -> &mut BundleEntry {
        match item {
            BundleItem::NeuroMonitoring => &mut self.neuro_monitoring,
            BundleItem::ContraindicationScreening => &mut self.contraindication_screening,
            BundleItem::ConfirmatoryTests => &mut self.confirmatory_tests,
            BundleItem::HemodynamicStability => &mut self.hemodynamic_stability,
            BundleItem::OptimizedVentilation => &mut self.optimized_ventilation,
            BundleItem::KeyLabs => &mut self.key_labs,
            BundleItem::ConsentProcess => &mut self.consent_process,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BundleItem, &BundleEntry)> + '_ {
        BundleItem::ALL.into_iter().map(move |item| (item, self.entry(item)))
    }

    pub fn is_done(&self, item: BundleItem) -> bool {
        self.entry(item).done
    }

    pub fn done_count(&self) -> usize {
        self.iter().filter(|(_, entry)| entry.done).count()
    }

    /// Fraction of items done, in `[0, 1]`.
    pub fn completeness(&self) -> f64 {
        self.done_count() as f64 / BundleItem::ALL.len() as f64
    }

    pub fn percent(&self) -> u8 {
        (self.completeness() * 100.0).round() as u8
    }

    /// Marks an item done (stamped with `at`) or pending (stamp cleared).
    /// The note survives either way.
    pub fn set(&mut self, item: BundleItem, done: bool, at: DateTime<Utc>) {
        let entry = self.entry_mut(item);
        entry.done = done;
        entry.at = if done { Some(at) } else { None };
    }

    /// Flips an item and returns its new state.
    pub fn toggle(&mut self, item: BundleItem, at: DateTime<Utc>) -> bool {
        let done = !self.is_done(item);
        self.set(item, done, at);
        done
    }
}
