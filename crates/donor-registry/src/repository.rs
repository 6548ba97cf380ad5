use crate::intake::{IntakeError, NewPatient};
use crate::seed::seed_patients;
use crate::store::KeyValueStore;
use chrono::Utc;
use donor_core::{
    AlertItem, AuditEvent, AuditEventKind, BundleItem, ConversionStage, Patient, PatientId,
    PatientStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STATE_KEY: &str = "donor_watch_state_v1";
pub const DEFAULT_ACTOR: &str = "ICU user (demo)";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("patient not found: {0}")]
    PatientNotFound(PatientId),
    #[error("invalid patient intake: {0}")]
    Invalid(#[from] IntakeError),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("stored state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persisted document: the whole patient list under one key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardState {
    pub patients: Vec<Patient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOptions {
    pub state_key: String,
    pub actor: String,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            state_key: STATE_KEY.to_string(),
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

/// Owns the mutable patient list and writes it through to a
/// [`KeyValueStore`] after every change.
pub struct PatientRepository<S: KeyValueStore> {
    store: S,
    options: RepositoryOptions,
    state: DashboardState,
}

impl<S: KeyValueStore> PatientRepository<S> {
    /// Loads existing state, or seeds the demo cohort on first use.
    pub fn open(store: S, options: RepositoryOptions) -> Result<Self, RegistryError> {
        let loaded = match store.get(&options.state_key)? {
            Some(raw) => Some(serde_json::from_str::<DashboardState>(&raw)?),
            None => None,
        };

        let mut repo = match loaded {
            Some(state) => {
                debug!(patients = state.patients.len(), key = %options.state_key, "loaded state");
                Self {
                    store,
                    options,
                    state,
                }
            }
            None => {
                let patients = seed_patients(Utc::now(), &options.actor);
                info!(patients = patients.len(), key = %options.state_key, "seeding demo patients");
                Self {
                    store,
                    options,
                    state: DashboardState { patients },
                }
            }
        };
        repo.persist()?;
        Ok(repo)
    }

    pub fn actor(&self) -> &str {
        &self.options.actor
    }

    pub fn list(&self) -> &[Patient] {
        &self.state.patients
    }

    pub fn get(&self, id: &PatientId) -> Option<&Patient> {
        self.state.patients.iter().find(|p| &p.id == id)
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn register(&mut self, form: NewPatient) -> Result<&Patient, RegistryError> {
        let patient = form.into_patient(&self.options.actor, Utc::now())?;
        let (id, record) = (patient.id.clone(), patient.medical_record.clone());
        self.state.patients.insert(0, patient);
        if let Err(e) = self.persist() {
            self.state.patients.remove(0);
            return Err(e);
        }
        info!(patient_id = %id, record = %record, "patient registered");
        Ok(&self.state.patients[0])
    }

    pub fn update(&mut self, patient: Patient) -> Result<&Patient, RegistryError> {
        let idx = self.index_of(&patient.id)?;
        self.commit(idx, patient)
    }

    /// Flips one checklist item. Touching the bundle also moves a
    /// Potential patient into evaluation and a Detected case into
    /// maintenance.
    pub fn toggle_bundle_item(
        &mut self,
        id: &PatientId,
        item: BundleItem,
    ) -> Result<&Patient, RegistryError> {
        let now = Utc::now();
        let idx = self.index_of(id)?;
        let mut patient = self.state.patients[idx].clone();

        let done = patient.bundle.toggle(item, now);
        if patient.status == PatientStatus::Potential {
            patient.status = PatientStatus::UnderEvaluation;
        }
        if patient.conversion_stage == ConversionStage::Detected {
            patient.conversion_stage = ConversionStage::Maintained;
        }

        let verb = if done { "Checked" } else { "Unchecked" };
        patient.push_event(
            AuditEvent::new(
                id.clone(),
                AuditEventKind::BundleCheck,
                self.actor(),
                format!("{verb}: {}", item.title()),
                now,
            )
            .with_detail(format!("Item: {}", item.key())),
        );
        debug!(patient_id = %id, item = item.key(), done, "bundle item toggled");

        self.commit(idx, patient)
    }

    pub fn mark_validated(&mut self, id: &PatientId) -> Result<&Patient, RegistryError> {
        let now = Utc::now();
        let idx = self.index_of(id)?;
        let mut patient = self.state.patients[idx].clone();

        patient.conversion_stage = ConversionStage::Validated;
        patient.status = PatientStatus::UnderEvaluation;
        patient.hours_to_validation = (patient.hours_since_detection + 2.0).max(1.0);
        patient.push_event(
            AuditEvent::new(
                id.clone(),
                AuditEventKind::StageChange,
                self.actor(),
                "Stage change: Validated",
                now,
            )
            .with_detail("Marked from the bundle checklist"),
        );
        info!(patient_id = %id, "patient validated");

        self.commit(idx, patient)
    }

    pub fn change_stage(
        &mut self,
        id: &PatientId,
        stage: ConversionStage,
    ) -> Result<&Patient, RegistryError> {
        let now = Utc::now();
        let idx = self.index_of(id)?;
        let mut patient = self.state.patients[idx].clone();

        let previous = patient.conversion_stage;
        patient.conversion_stage = stage;
        patient.push_event(
            AuditEvent::new(
                id.clone(),
                AuditEventKind::StageChange,
                self.actor(),
                format!("Stage change: {stage}"),
                now,
            )
            .with_detail(format!("From {previous}")),
        );
        info!(patient_id = %id, from = %previous, to = %stage, "stage changed");

        self.commit(idx, patient)
    }

    pub fn change_status(
        &mut self,
        id: &PatientId,
        status: PatientStatus,
    ) -> Result<&Patient, RegistryError> {
        let now = Utc::now();
        let idx = self.index_of(id)?;
        let mut patient = self.state.patients[idx].clone();

        let previous = patient.status;
        patient.status = status;
        patient.push_event(
            AuditEvent::new(
                id.clone(),
                AuditEventKind::StatusChange,
                self.actor(),
                format!("Status change: {status}"),
                now,
            )
            .with_detail(format!("From {previous}")),
        );
        info!(patient_id = %id, from = %previous, to = %status, "status changed");

        self.commit(idx, patient)
    }

    /// Logs a generated alert on the patient's audit trail.
    pub fn record_alert(&mut self, alert: &AlertItem) -> Result<&Patient, RegistryError> {
        let idx = self.index_of(&alert.patient_id)?;
        let mut patient = self.state.patients[idx].clone();
        let reasons: Vec<&str> = alert.reasons.iter().map(|r| r.label.as_str()).collect();

        patient.push_event(
            AuditEvent::new(
                alert.patient_id.clone(),
                AuditEventKind::AlertGenerated,
                self.actor(),
                format!("Priority alert: {} ({})", alert.priority_tier, alert.score),
                alert.created_at,
            )
            .with_detail(reasons.join("; ")),
        );

        self.commit(idx, patient)
    }

    /// Swaps in the edited record and writes through. A failed write
    /// restores the previous record so memory never runs ahead of storage.
    fn commit(&mut self, idx: usize, patient: Patient) -> Result<&Patient, RegistryError> {
        let previous = std::mem::replace(&mut self.state.patients[idx], patient);
        if let Err(e) = self.persist() {
            warn!(patient_id = %previous.id, error = %e, "write failed, change rolled back");
            self.state.patients[idx] = previous;
            return Err(e);
        }
        Ok(&self.state.patients[idx])
    }

    fn index_of(&self, id: &PatientId) -> Result<usize, RegistryError> {
        self.state
            .patients
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| RegistryError::PatientNotFound(id.clone()))
    }

    fn persist(&mut self) -> Result<(), RegistryError> {
        if self.state.patients.is_empty() {
            warn!(key = %self.options.state_key, "refusing to persist an empty patient list");
            return Ok(());
        }
        let raw = serde_json::to_string(&self.state)?;
        self.store.set(&self.options.state_key, &raw)?;
        Ok(())
    }
}
