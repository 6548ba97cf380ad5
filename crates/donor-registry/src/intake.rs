use chrono::{DateTime, Utc};
use donor_core::{
    AuditEvent, AuditEventKind, BundleChecklist, ConversionStage, Patient, PatientId,
    PatientStatus, PupilReactivity, RiskEpisodes, Service, Sex,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SODIUM: f64 = 148.0;
pub const DEFAULT_PF_RATIO: f64 = 320.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntakeError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("age must be positive")]
    InvalidAge,
    #[error("glasgow coma score {0} outside 3-15")]
    GcsOutOfRange(u8),
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

/// Registration form for a newly flagged patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewPatient {
    pub medical_record: String,
    pub first_names: String,
    pub last_names: String,
    pub age: u16,
    pub sex: Sex,
    pub service: Service,
    pub glasgow_coma_score: u8,
    pub pupil_reactivity: PupilReactivity,
    pub mean_arterial_pressure: f64,
    pub lactate: f64,
    pub hours_since_detection: f64,
}

impl Default for NewPatient {
    fn default() -> Self {
        Self {
            medical_record: String::new(),
            first_names: String::new(),
            last_names: String::new(),
            age: 40,
            sex: Sex::M,
            service: Service::Icu,
            glasgow_coma_score: 8,
            pupil_reactivity: PupilReactivity::Reactive,
            mean_arterial_pressure: 75.0,
            lactate: 1.6,
            hours_since_detection: 2.0,
        }
    }
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), IntakeError> {
        for (field, value) in [
            ("medical record", &self.medical_record),
            ("first names", &self.first_names),
            ("last names", &self.last_names),
        ] {
            if value.trim().is_empty() {
                return Err(IntakeError::EmptyField(field));
            }
        }
        if self.age == 0 {
            return Err(IntakeError::InvalidAge);
        }
        if !(3..=15).contains(&self.glasgow_coma_score) {
            return Err(IntakeError::GcsOutOfRange(self.glasgow_coma_score));
        }
        if !self.mean_arterial_pressure.is_finite() {
            return Err(IntakeError::NotFinite("mean arterial pressure"));
        }
        for (field, value) in [
            ("lactate", self.lactate),
            ("hours since detection", self.hours_since_detection),
        ] {
            if !value.is_finite() {
                return Err(IntakeError::NotFinite(field));
            }
            if value < 0.0 {
                return Err(IntakeError::Negative { field, value });
            }
        }
        Ok(())
    }

    /// Validates the form and builds a freshly detected patient record
    /// with an empty bundle and a creation event.
    pub fn into_patient(self, actor: &str, now: DateTime<Utc>) -> Result<Patient, IntakeError> {
        self.validate()?;

        let id = PatientId::generate();
        let medical_record = self.medical_record.trim().to_string();
        let created = AuditEvent::new(
            id.clone(),
            AuditEventKind::Created,
            actor,
            "Patient registered",
            now,
        )
        .with_detail(format!("HC {} - Service {}", medical_record, self.service));

        Ok(Patient {
            id,
            medical_record,
            first_names: self.first_names.trim().to_string(),
            last_names: self.last_names.trim().to_string(),
            age: self.age,
            sex: self.sex,
            service: self.service,
            admitted_at: now,
            status: PatientStatus::Potential,
            glasgow_coma_score: self.glasgow_coma_score,
            pupil_reactivity: self.pupil_reactivity,
            mean_arterial_pressure: self.mean_arterial_pressure,
            lactate: self.lactate,
            hours_since_detection: self.hours_since_detection,
            bundle: BundleChecklist::empty(),
            conversion_stage: ConversionStage::Detected,
            hours_to_validation: 0.0,
            suspicion_at: Some(now),
            notification_at: Some(now),
            protocol_start_at: None,
            brain_death_confirmed_at: None,
            sodium: Some(DEFAULT_SODIUM),
            pf_ratio: Some(DEFAULT_PF_RATIO),
            consented: false,
            avoidable_loss: false,
            risk_episodes: RiskEpisodes::default(),
            events: vec![created],
        })
    }
}
