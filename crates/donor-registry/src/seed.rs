use chrono::{DateTime, Duration, Utc};
use donor_core::{
    AuditEvent, AuditEventKind, BundleChecklist, BundleItem, ConversionStage, Patient, PatientId,
    PatientStatus, PupilReactivity, RiskEpisodes, Service, Sex,
};

fn hours_ago(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    now - Duration::milliseconds((hours * 3_600_000.0) as i64)
}

fn base_bundle(now: DateTime<Utc>) -> BundleChecklist {
    BundleChecklist::with_done(
        &[
            BundleItem::NeuroMonitoring,
            BundleItem::HemodynamicStability,
            BundleItem::OptimizedVentilation,
        ],
        now,
    )
}

struct SeedCase {
    medical_record: &'static str,
    first_names: &'static str,
    last_names: &'static str,
    age: u16,
    sex: Sex,
    service: Service,
    admitted_hours_ago: f64,
    status: PatientStatus,
    gcs: u8,
    pupils: PupilReactivity,
    map: f64,
    lactate: f64,
    hours_since_detection: f64,
    bundle: BundleChecklist,
    stage: ConversionStage,
    hours_to_validation: f64,
}

fn build(case: SeedCase, now: DateTime<Utc>, actor: &str) -> Patient {
    let id = PatientId::generate();
    let created = AuditEvent::new(
        id.clone(),
        AuditEventKind::Created,
        actor,
        "Initial record (seed)",
        now,
    );

    Patient {
        id,
        medical_record: case.medical_record.into(),
        first_names: case.first_names.into(),
        last_names: case.last_names.into(),
        age: case.age,
        sex: case.sex,
        service: case.service,
        admitted_at: hours_ago(now, case.admitted_hours_ago),
        status: case.status,
        glasgow_coma_score: case.gcs,
        pupil_reactivity: case.pupils,
        mean_arterial_pressure: case.map,
        lactate: case.lactate,
        hours_since_detection: case.hours_since_detection,
        bundle: case.bundle,
        conversion_stage: case.stage,
        hours_to_validation: case.hours_to_validation,
        suspicion_at: Some(hours_ago(now, 10.0)),
        notification_at: Some(hours_ago(now, 9.5)),
        protocol_start_at: Some(hours_ago(now, 8.5)),
        brain_death_confirmed_at: Some(hours_ago(now, 3.0)),
        sodium: Some(152.0),
        pf_ratio: Some(280.0),
        consented: true,
        avoidable_loss: false,
        risk_episodes: RiskEpisodes {
            map_low: 1,
            sodium_out: 1,
            temp_low: 0,
            pf_low: 1,
        },
        events: vec![created],
    }
}

/// Demo cohort loaded when the store holds no state yet.
pub fn seed_patients(now: DateTime<Utc>, actor: &str) -> Vec<Patient> {
    let mut screened = base_bundle(now);
    screened.set(BundleItem::ContraindicationScreening, true, now);

    let mut nearly_complete = BundleChecklist::with_done(&BundleItem::ALL, now);
    nearly_complete.set(BundleItem::ConsentProcess, false, now);

    let cases = [
        SeedCase {
            medical_record: "HL-000231",
            first_names: "María",
            last_names: "Quispe R.",
            age: 38,
            sex: Sex::F,
            service: Service::Icu,
            admitted_hours_ago: 14.0,
            status: PatientStatus::UnderEvaluation,
            gcs: 5,
            pupils: PupilReactivity::Mixed,
            map: 68.0,
            lactate: 2.8,
            hours_since_detection: 9.0,
            bundle: base_bundle(now),
            stage: ConversionStage::Referred,
            hours_to_validation: 10.0,
        },
        SeedCase {
            medical_record: "HL-000245",
            first_names: "José",
            last_names: "Ramos C.",
            age: 52,
            sex: Sex::M,
            service: Service::Icu,
            admitted_hours_ago: 28.0,
            status: PatientStatus::Potential,
            gcs: 6,
            pupils: PupilReactivity::Reactive,
            map: 74.0,
            lactate: 1.9,
            hours_since_detection: 6.0,
            bundle: screened,
            stage: ConversionStage::Maintained,
            hours_to_validation: 14.0,
        },
        SeedCase {
            medical_record: "HL-000199",
            first_names: "Luisa",
            last_names: "Torres V.",
            age: 44,
            sex: Sex::F,
            service: Service::Emergency,
            admitted_hours_ago: 8.0,
            status: PatientStatus::FollowUp,
            gcs: 9,
            pupils: PupilReactivity::Reactive,
            map: 78.0,
            lactate: 1.4,
            hours_since_detection: 3.0,
            bundle: nearly_complete,
            stage: ConversionStage::Validated,
            hours_to_validation: 6.0,
        },
    ];

    cases.into_iter().map(|case| build(case, now, actor)).collect()
}
