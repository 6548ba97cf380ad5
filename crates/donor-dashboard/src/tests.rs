use crate::cli::{Cli, Command};
use crate::commands::{resolve_patient, run};
use crate::config::DashboardConfig;
use crate::logging::effective_level;
use clap::Parser;
use donor_core::{BundleItem, ConversionStage, PatientId, PatientStatus};
use donor_registry::{
    seed_patients, DashboardState, KeyValueStore, MemoryStore, PatientRepository, STATE_KEY,
};
use std::io::Write;

fn demo_repo() -> PatientRepository<MemoryStore> {
    PatientRepository::open(MemoryStore::new(), DashboardConfig::default().repository_options())
        .unwrap()
}

fn run_text(repo: &mut PatientRepository<MemoryStore>, command: Command) -> String {
    let mut out = Vec::new();
    run(repo, &DashboardConfig::default(), command, false, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn run_json(repo: &mut PatientRepository<MemoryStore>, command: Command) -> serde_json::Value {
    let mut out = Vec::new();
    run(repo, &DashboardConfig::default(), command, true, &mut out).unwrap();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn config_defaults_when_no_file() {
    let config = DashboardConfig::load(None).unwrap();
    assert_eq!(config, DashboardConfig::default());
    assert_eq!(config.queue_limit, 20);
}

#[test]
fn config_file_overrides_some_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"actor": "Dr. Salas", "queue_limit": 2}}"#).unwrap();

    let config = DashboardConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.actor, "Dr. Salas");
    assert_eq!(config.queue_limit, 2);
    assert_eq!(config.log_level, "info");
}

#[test]
fn bad_config_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    let err = DashboardConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("parsing config"));
}

#[test]
fn verbosity_raises_level() {
    assert_eq!(effective_level("warn", 0), "warn");
    assert_eq!(effective_level("warn", 1), "debug");
    assert_eq!(effective_level("warn", 3), "trace");
}

#[test]
fn cli_flags_override_config() {
    let cli = Cli::try_parse_from([
        "donor-watch",
        "--data-dir",
        "/tmp/dw",
        "--json-logs",
        "-v",
        "alerts",
        "--limit",
        "1",
    ])
    .unwrap();
    let mut config = DashboardConfig::default();
    cli.apply_overrides(&mut config);

    assert_eq!(config.data_dir.to_str(), Some("/tmp/dw"));
    assert!(config.json_logs);
    assert_eq!(config.log_level, "debug");
    assert!(matches!(cli.command, Command::Alerts { limit: Some(1), record: false }));
}

#[test]
fn cli_parses_labels() {
    let cli = Cli::try_parse_from(["donor-watch", "bundle", "HL-000231", "consent_process"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Bundle { item: BundleItem::ConsentProcess, .. }
    ));

    let cli = Cli::try_parse_from(["donor-watch", "stage", "HL-000231", "referred"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Stage { stage: ConversionStage::Referred, .. }
    ));

    assert!(Cli::try_parse_from(["donor-watch", "stage", "HL-000231", "nowhere"]).is_err());
}

#[test]
fn patients_resolve_by_record_or_prefix() {
    let repo = demo_repo();
    let maria = repo.list()[0].id.clone();

    assert_eq!(resolve_patient(&repo, "hl-000231").unwrap(), maria);
    assert_eq!(resolve_patient(&repo, maria.as_str()).unwrap(), maria);
    assert_eq!(resolve_patient(&repo, &maria.as_str()[..12]).unwrap(), maria);
    assert!(resolve_patient(&repo, "HL-999999").is_err());
    assert!(resolve_patient(&repo, "").is_err());
}

#[test]
fn alerts_list_highest_first() {
    let mut repo = demo_repo();
    let text = run_text(&mut repo, Command::Alerts { limit: None, record: false });
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(" 83  High"));
    assert!(lines[0].contains("GCS 5"));
    assert!(lines[1].starts_with(" 52  Medium"));
    assert!(lines[2].starts_with(" 25  Low"));
}

#[test]
fn recorded_alerts_land_on_audit_trail() {
    let mut repo = demo_repo();
    let json = run_json(&mut repo, Command::Alerts { limit: Some(1), record: true });

    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["score"], 83);
    assert_eq!(json[0]["priority_tier"], "High");

    let history = run_json(
        &mut repo,
        Command::History {
            patient: "HL-000231".into(),
        },
    );
    assert_eq!(history[0]["kind"], "ALERT_GENERATED");
    assert_eq!(history[0]["title"], "Priority alert: High (83)");
}

#[test]
fn explain_shows_breakdown() {
    let mut repo = demo_repo();
    let text = run_text(
        &mut repo,
        Command::Explain {
            patient: "HL-000231".into(),
        },
    );
    assert!(text.contains("score 83 (High)"));
    assert!(text.contains("stage bonus"));
    assert!(text.contains("Pupils: Mixed"));

    let json = run_json(
        &mut repo,
        Command::Explain {
            patient: "HL-000231".into(),
        },
    );
    assert_eq!(json["alert"]["score"], 83);
    assert_eq!(json["signals"]["neuro"], 30.0);
}

#[test]
fn bundle_toggle_then_validate() {
    let mut repo = demo_repo();
    let text = run_text(
        &mut repo,
        Command::Bundle {
            patient: "HL-000245".into(),
            item: BundleItem::ConsentProcess,
        },
    );
    assert!(text.contains("done"));

    run_text(
        &mut repo,
        Command::Validate {
            patient: "HL-000245".into(),
        },
    );
    let id = resolve_patient(&repo, "HL-000245").unwrap();
    let patient = repo.get(&id).unwrap();
    assert_eq!(patient.conversion_stage, ConversionStage::Validated);
    assert!(patient.bundle.is_done(BundleItem::ConsentProcess));
}

#[test]
fn register_prepends_patient() {
    let mut repo = demo_repo();
    let cli = Cli::try_parse_from([
        "donor-watch",
        "register",
        "--record",
        "HL-000300",
        "--first-names",
        "Ana",
        "--last-names",
        "Ríos P.",
        "--gcs",
        "4",
    ])
    .unwrap();
    let text = run_text(&mut repo, cli.command);

    assert!(text.starts_with("registered HL-000300"));
    assert_eq!(repo.list().len(), 4);
    assert_eq!(repo.list()[0].glasgow_coma_score, 4);
}

#[test]
fn reports_render() {
    let mut repo = demo_repo();
    let kpis = run_json(&mut repo, Command::Kpis);
    assert_eq!(kpis["total"], 3);
    assert_eq!(kpis["traceability_pct"], 100);

    let impact = run_text(&mut repo, Command::Impact);
    assert!(impact.contains("total 3"));
    assert!(impact.contains("Today"));

    let metrics = run_text(&mut repo, Command::Metrics);
    assert!(metrics.contains("donor_alerts_total"));
}

#[test]
fn patients_lists_everyone_and_filters_by_search() {
    let mut repo = demo_repo();
    let all = run_text(&mut repo, Command::Patients { search: None });
    assert_eq!(all.lines().count(), 3);
    assert!(all.lines().next().unwrap().starts_with("HL-000231"));

    let by_name = run_text(
        &mut repo,
        Command::Patients {
            search: Some("RAMOS".into()),
        },
    );
    assert_eq!(by_name.lines().count(), 1);
    assert!(by_name.contains("José Ramos C."));

    let by_record = run_json(
        &mut repo,
        Command::Patients {
            search: Some("hl-000199".into()),
        },
    );
    assert_eq!(by_record.as_array().unwrap().len(), 1);
    assert_eq!(by_record[0]["first_names"], "Luisa");

    let none = run_text(
        &mut repo,
        Command::Patients {
            search: Some("nobody".into()),
        },
    );
    assert!(none.starts_with("No patients match"));
}

#[test]
fn show_lists_profile_and_checklist() {
    let mut repo = demo_repo();
    let text = run_text(
        &mut repo,
        Command::Show {
            patient: "HL-000245".into(),
        },
    );

    assert!(text.contains("age 52  sex M  service ICU"));
    assert!(text.contains("status Potential  stage Maintained"));
    assert!(text.contains("bundle 4/7 (57%)"));
    let items: Vec<&str> = text.lines().filter(|l| l.starts_with("  [")).collect();
    assert_eq!(items.len(), 7);
    for item in BundleItem::ALL {
        assert!(text.contains(item.title()));
        assert!(text.contains(item.hint()));
    }
    let consent = items.iter().find(|l| l.contains("Consent process")).unwrap();
    assert!(consent.starts_with("  [ ]"));
    assert!(consent.contains("pending"));
    let neuro = items
        .iter()
        .find(|l| l.contains("Active neuro-monitoring"))
        .unwrap();
    assert!(neuro.starts_with("  [x]"));
    assert!(neuro.contains("done"));
}

#[test]
fn non_ascii_ids_are_shortened_on_char_boundaries() {
    let mut patients = seed_patients(chrono::Utc::now(), "tester");
    patients[0].id = PatientId::from("pacieññ-001");
    let mut store = MemoryStore::new();
    store
        .set(STATE_KEY, &serde_json::to_string(&DashboardState { patients }).unwrap())
        .unwrap();
    let mut repo =
        PatientRepository::open(store, DashboardConfig::default().repository_options()).unwrap();

    let text = run_text(&mut repo, Command::Patients { search: None });
    assert!(text.lines().next().unwrap().contains("pacieññ- "));

    let text = run_text(
        &mut repo,
        Command::Stage {
            patient: "pacie".into(),
            stage: ConversionStage::Referred,
        },
    );
    assert!(text.contains("pacieñ"));
}

#[test]
fn stage_status_and_history_print_text() {
    let mut repo = demo_repo();
    let staged = run_text(
        &mut repo,
        Command::Stage {
            patient: "HL-000199".into(),
            stage: ConversionStage::Effective,
        },
    );
    assert!(staged.starts_with("HL-000199"));
    assert!(staged.contains("Effective"));

    let status = run_text(
        &mut repo,
        Command::Status {
            patient: "HL-000199".into(),
            status: PatientStatus::EffectiveDonor,
        },
    );
    assert!(status.contains("Effective donor"));

    let history = run_text(
        &mut repo,
        Command::History {
            patient: "HL-000199".into(),
        },
    );
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("Status change: Effective donor (From Follow-up)"));
    assert!(lines[1].contains("Stage change: Effective (From Validated)"));
    assert!(lines[2].contains("Initial record (seed)"));
    assert!(lines[0].contains("ICU user (demo)"));
}
