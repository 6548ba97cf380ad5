use crate::audit::AuditEvent;
use crate::bundle::BundleChecklist;
use crate::{normalize_label, ParseLabelError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PatientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PatientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Implements `Display` and `FromStr` for a closed label enum.
macro_rules! labelled_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize_label(s);
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| {
                        normalize_label(v.label()) == wanted
                            || normalize_label(&format!("{:?}", v)) == wanted
                    })
                    .ok_or_else(|| ParseLabelError::new($what, s))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PupilReactivity {
    Reactive,
    Mixed,
    NonReactive,
}

labelled_enum!(PupilReactivity, "pupil reactivity", {
    Reactive => "Reactive",
    Mixed => "Mixed",
    NonReactive => "Non-reactive",
});

/// Donation workflow stage, in workflow order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversionStage {
    Detected,
    Maintained,
    Referred,
    Validated,
    Effective,
    Discarded,
}

labelled_enum!(ConversionStage, "conversion stage", {
    Detected => "Detected",
    Maintained => "Maintained",
    Referred => "Referred",
    Validated => "Validated",
    Effective => "Effective",
    Discarded => "Discarded",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PatientStatus {
    Potential,
    UnderEvaluation,
    EffectiveDonor,
    NotEligible,
    FollowUp,
}

labelled_enum!(PatientStatus, "patient status", {
    Potential => "Potential",
    UnderEvaluation => "Under evaluation",
    EffectiveDonor => "Effective donor",
    NotEligible => "Not eligible",
    FollowUp => "Follow-up",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    F,
    M,
}

labelled_enum!(Sex, "sex", {
    F => "F",
    M => "M",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Service {
    Icu,
    Emergency,
    Intermediate,
}

labelled_enum!(Service, "service", {
    Icu => "ICU",
    Emergency => "Emergency",
    Intermediate => "Intermediate care",
});

/// Counters of out-of-target episodes during donor maintenance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskEpisodes {
    pub map_low: u32,
    pub sodium_out: u32,
    pub temp_low: u32,
    pub pf_low: u32,
}

impl RiskEpisodes {
    pub fn total(&self) -> u32 {
        self.map_low
            .saturating_add(self.sodium_out)
            .saturating_add(self.temp_low)
            .saturating_add(self.pf_low)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: PatientId,
    pub medical_record: String,
    pub first_names: String,
    pub last_names: String,
    pub age: u16,
    pub sex: Sex,
    pub service: Service,
    pub admitted_at: DateTime<Utc>,
    pub status: PatientStatus,

    pub glasgow_coma_score: u8,
    pub pupil_reactivity: PupilReactivity,
    pub mean_arterial_pressure: f64,
    pub lactate: f64,
    pub hours_since_detection: f64,

    pub bundle: BundleChecklist,

    pub conversion_stage: ConversionStage,
    pub hours_to_validation: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicion_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brain_death_confirmed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pf_ratio: Option<f64>,
    #[serde(default)]
    pub consented: bool,
    #[serde(default)]
    pub avoidable_loss: bool,
    #[serde(default)]
    pub risk_episodes: RiskEpisodes,

    /// Audit trail, newest first.
    #[serde(default)]
    pub events: Vec<AuditEvent>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
    }

    /// Case-insensitive substring match over record number and names.
    /// A blank query matches everyone.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        format!("{} {} {}", self.medical_record, self.first_names, self.last_names)
            .to_lowercase()
            .contains(&query)
    }

    /// Borrowed projection of the fields the alert scorer consumes.
    pub fn view(&self) -> PatientView<'_> {
        PatientView {
            id: &self.id,
            glasgow_coma_score: self.glasgow_coma_score,
            pupil_reactivity: self.pupil_reactivity,
            mean_arterial_pressure: self.mean_arterial_pressure,
            lactate: self.lactate,
            hours_since_detection: self.hours_since_detection,
            bundle: &self.bundle,
            conversion_stage: self.conversion_stage,
        }
    }

    pub fn push_event(&mut self, event: AuditEvent) {
        self.events.insert(0, event);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatientView<'a> {
    pub id: &'a PatientId,
    pub glasgow_coma_score: u8,
    pub pupil_reactivity: PupilReactivity,
    pub mean_arterial_pressure: f64,
    pub lactate: f64,
    pub hours_since_detection: f64,
    pub bundle: &'a BundleChecklist,
    pub conversion_stage: ConversionStage,
}
