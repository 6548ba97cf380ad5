use crate::intake::{IntakeError, NewPatient};
use crate::queue::AlertQueue;
use crate::repository::{DashboardState, PatientRepository, RegistryError, RepositoryOptions, STATE_KEY};
use crate::store::{FileStore, KeyValueStore, MemoryStore};
use chrono::Utc;
use donor_core::{
    compute_alert, AuditEventKind, BundleItem, ConversionStage, PatientId, PatientStatus,
    PriorityTier,
};

fn open_memory() -> PatientRepository<MemoryStore> {
    PatientRepository::open(MemoryStore::new(), RepositoryOptions::default()).unwrap()
}

fn form() -> NewPatient {
    NewPatient {
        medical_record: "  HL-000300 ".into(),
        first_names: "Rosa".into(),
        last_names: "Huamán P.".into(),
        ..NewPatient::default()
    }
}

/// Accepts a fixed number of writes, then fails every later one.
struct FlakyStore {
    inner: MemoryStore,
    writes_left: usize,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        if self.writes_left == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        }
        self.writes_left -= 1;
        self.inner.set(key, value)
    }
}

fn stored_state(store: &MemoryStore) -> DashboardState {
    let raw = store.get(STATE_KEY).unwrap().expect("state persisted");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn first_open_seeds_and_persists() {
    let repo = open_memory();
    assert_eq!(repo.list().len(), 3);
    assert_eq!(repo.list()[0].medical_record, "HL-000231");
    assert!(repo.list().iter().all(|p| p.events.len() == 1));

    let store = repo.into_store();
    assert_eq!(stored_state(&store).patients.len(), 3);
}

#[test]
fn reopen_loads_existing_state() {
    let mut repo = open_memory();
    let id = repo.register(form()).unwrap().id.clone();
    let store = repo.into_store();

    let reopened = PatientRepository::open(store, RepositoryOptions::default()).unwrap();
    assert_eq!(reopened.list().len(), 4);
    assert!(reopened.get(&id).is_some());
}

#[test]
fn corrupt_state_is_reported() {
    let mut store = MemoryStore::new();
    store.set(STATE_KEY, "{not json").unwrap();
    let err = PatientRepository::open(store, RepositoryOptions::default()).err().unwrap();
    assert!(matches!(err, RegistryError::Corrupt(_)));
}

#[test]
fn register_prepends_a_detected_patient() {
    let mut repo = open_memory();
    let patient = repo.register(form()).unwrap().clone();

    assert_eq!(repo.list()[0].id, patient.id);
    assert_eq!(patient.medical_record, "HL-000300");
    assert_eq!(patient.status, PatientStatus::Potential);
    assert_eq!(patient.conversion_stage, ConversionStage::Detected);
    assert_eq!(patient.bundle.done_count(), 0);
    assert_eq!(patient.sodium, Some(148.0));
    assert_eq!(patient.events[0].kind, AuditEventKind::Created);
    assert!(patient.suspicion_at.is_some());
}

#[test]
fn register_rejects_bad_forms() {
    let mut repo = open_memory();

    let blank = NewPatient {
        first_names: "   ".into(),
        ..form()
    };
    assert!(matches!(
        repo.register(blank),
        Err(RegistryError::Invalid(IntakeError::EmptyField("first names")))
    ));

    let gcs = NewPatient {
        glasgow_coma_score: 2,
        ..form()
    };
    assert_eq!(gcs.validate(), Err(IntakeError::GcsOutOfRange(2)));

    let lactate = NewPatient {
        lactate: -1.0,
        ..form()
    };
    assert!(matches!(lactate.validate(), Err(IntakeError::Negative { field: "lactate", .. })));

    let map = NewPatient {
        mean_arterial_pressure: f64::NAN,
        ..form()
    };
    assert!(map.validate().is_err());
    assert_eq!(repo.list().len(), 3);
}

#[test]
fn bundle_toggle_advances_workflow_and_logs() {
    let mut repo = open_memory();
    let id = repo.register(form()).unwrap().id.clone();

    let patient = repo.toggle_bundle_item(&id, BundleItem::KeyLabs).unwrap();
    assert!(patient.bundle.is_done(BundleItem::KeyLabs));
    assert!(patient.bundle.entry(BundleItem::KeyLabs).at.is_some());
    assert_eq!(patient.status, PatientStatus::UnderEvaluation);
    assert_eq!(patient.conversion_stage, ConversionStage::Maintained);
    assert_eq!(patient.events[0].kind, AuditEventKind::BundleCheck);
    assert_eq!(patient.events[0].title, "Checked: Key laboratory panel");

    let patient = repo.toggle_bundle_item(&id, BundleItem::KeyLabs).unwrap();
    assert!(!patient.bundle.is_done(BundleItem::KeyLabs));
    assert!(patient.events[0].title.starts_with("Unchecked"));
    assert_eq!(patient.events.len(), 3);
}

#[test]
fn completing_the_bundle_lowers_the_alert() {
    let mut repo = open_memory();
    let id = repo.list()[1].id.clone();
    let before = compute_alert(repo.get(&id).unwrap().view()).score;

    let pending: Vec<_> = BundleItem::ALL
        .into_iter()
        .filter(|item| !repo.get(&id).unwrap().bundle.is_done(*item))
        .collect();
    for item in pending {
        repo.toggle_bundle_item(&id, item).unwrap();
    }

    let after = compute_alert(repo.get(&id).unwrap().view()).score;
    assert_eq!(repo.get(&id).unwrap().bundle.done_count(), 7);
    assert!(after < before);
}

#[test]
fn mark_validated_sets_stage_and_timing() {
    let mut repo = open_memory();
    let id = repo.list()[0].id.clone();

    let patient = repo.mark_validated(&id).unwrap();
    assert_eq!(patient.conversion_stage, ConversionStage::Validated);
    assert_eq!(patient.status, PatientStatus::UnderEvaluation);
    assert_eq!(patient.hours_to_validation, 11.0);
    assert_eq!(patient.events[0].kind, AuditEventKind::StageChange);
}

#[test]
fn stage_and_status_changes_are_audited() {
    let mut repo = open_memory();
    let id = repo.list()[2].id.clone();

    let patient = repo.change_stage(&id, ConversionStage::Effective).unwrap();
    assert_eq!(patient.conversion_stage, ConversionStage::Effective);
    assert_eq!(patient.events[0].detail.as_deref(), Some("From Validated"));

    let patient = repo.change_status(&id, PatientStatus::EffectiveDonor).unwrap();
    assert_eq!(patient.status, PatientStatus::EffectiveDonor);
    assert_eq!(patient.events[0].kind, AuditEventKind::StatusChange);
}

#[test]
fn unknown_patient_is_an_error() {
    let mut repo = open_memory();
    let missing = PatientId::from("nope");
    assert!(matches!(
        repo.mark_validated(&missing),
        Err(RegistryError::PatientNotFound(_))
    ));
    assert!(repo.toggle_bundle_item(&missing, BundleItem::KeyLabs).is_err());

    let mut stray = repo.list()[0].clone();
    stray.id = missing;
    assert!(repo.update(stray).is_err());
}

#[test]
fn update_replaces_record() {
    let mut repo = open_memory();
    let mut patient = repo.list()[0].clone();
    patient.lactate = 4.0;
    repo.update(patient.clone()).unwrap();
    assert_eq!(repo.get(&patient.id).unwrap().lactate, 4.0);
}

#[test]
fn queue_orders_by_score_and_skips_ineligible() {
    let mut repo = open_memory();
    let queue = AlertQueue::build(repo.list(), Utc::now());

    let scores: Vec<u8> = queue.items().iter().map(|a| a.score).collect();
    assert_eq!(scores, vec![83, 52, 25]);
    assert_eq!(queue.tier_count(PriorityTier::High), 1);
    assert_eq!(queue.tier_count(PriorityTier::Medium), 1);
    assert_eq!(queue.tier_count(PriorityTier::Low), 1);
    assert_eq!(queue.top(1)[0].patient_id, repo.list()[0].id);
    assert_eq!(queue.top(10).len(), 3);

    let id = repo.list()[1].id.clone();
    repo.change_status(&id, PatientStatus::NotEligible).unwrap();
    let queue = AlertQueue::build(repo.list(), Utc::now());
    assert_eq!(queue.len(), 2);
    assert!(queue.for_patient(&id).is_none());
}

#[test]
fn record_alert_appends_event() {
    let mut repo = open_memory();
    let queue = AlertQueue::build(repo.list(), Utc::now());
    let top = queue.top(1)[0].clone();

    let patient = repo.record_alert(&top).unwrap();
    assert_eq!(patient.events[0].kind, AuditEventKind::AlertGenerated);
    assert_eq!(patient.events[0].title, "Priority alert: High (83)");
    assert!(patient.events[0].detail.as_deref().unwrap().starts_with("GCS 5"));
}

#[test]
fn file_store_persists_between_instances() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("data"));
    assert_eq!(store.dir(), dir.path().join("data").as_path());
    assert_eq!(store.get("missing").unwrap(), None);

    store.set("a/b key", "{\"x\":1}").unwrap();
    let again = FileStore::new(dir.path().join("data"));
    assert_eq!(again.get("a/b key").unwrap().as_deref(), Some("{\"x\":1}"));

    let repo = PatientRepository::open(store, RepositoryOptions::default()).unwrap();
    assert!(dir.path().join("data").join(format!("{STATE_KEY}.json")).exists());
    assert_eq!(repo.list().len(), 3);
}

#[test]
fn failed_write_leaves_memory_unchanged() {
    let store = FlakyStore {
        inner: MemoryStore::new(),
        writes_left: 1,
    };
    let mut repo = PatientRepository::open(store, RepositoryOptions::default()).unwrap();
    let before = repo.list().to_vec();
    let id = before[1].id.clone();

    assert!(matches!(
        repo.toggle_bundle_item(&id, BundleItem::ConsentProcess),
        Err(RegistryError::Storage(_))
    ));
    assert!(repo.mark_validated(&id).is_err());
    assert!(repo.change_status(&id, PatientStatus::NotEligible).is_err());
    assert!(repo.register(form()).is_err());
    assert_eq!(repo.list(), before.as_slice());

    let store = repo.into_store();
    let raw = store.get(STATE_KEY).unwrap().unwrap();
    let persisted: DashboardState = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted.patients, before);
}

#[test]
fn events_are_signed_by_the_configured_actor() {
    let options = RepositoryOptions {
        actor: "Dr. Salas".into(),
        ..RepositoryOptions::default()
    };
    let mut repo = PatientRepository::open(MemoryStore::new(), options).unwrap();
    assert_eq!(repo.actor(), "Dr. Salas");

    let id = repo.list()[0].id.clone();
    let patient = repo.change_stage(&id, ConversionStage::Validated).unwrap();
    assert_eq!(patient.events[0].by, "Dr. Salas");
}
