use clap::{ArgAction, Parser, Subcommand};
use donor_core::{BundleItem, ConversionStage, PatientStatus, PupilReactivity, Service, Sex};
use donor_registry::NewPatient;
use std::path::PathBuf;

use crate::config::DashboardConfig;

#[derive(Debug, Parser)]
#[command(
    name = "donor-watch",
    version,
    about = "ICU donor detection: patient registry, bundle checklist and priority alerts"
)]
pub struct Cli {
    /// JSON config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the local state store.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut DashboardConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }
        config.log_level = crate::logging::effective_level(&config.log_level, self.verbose);
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered patients.
    Patients {
        /// Case-insensitive filter on medical record and names.
        #[arg(long)]
        search: Option<String>,
    },
    /// Profile and bundle checklist for one patient.
    Show { patient: String },
    /// Show the priority alert queue, highest score first.
    Alerts {
        #[arg(long)]
        limit: Option<usize>,
        /// Log each listed alert on the patient's audit trail.
        #[arg(long)]
        record: bool,
    },
    /// Score breakdown and reasons for one patient.
    Explain { patient: String },
    /// Dashboard KPIs: process times, quality and impact.
    Kpis,
    /// Outcome view: conversion and stage distribution.
    Impact,
    /// Register a newly flagged patient.
    Register(RegisterArgs),
    /// Toggle one bundle checklist item.
    Bundle { patient: String, item: BundleItem },
    /// Mark a patient's stage as Validated.
    Validate { patient: String },
    /// Move a patient to another conversion stage.
    Stage {
        patient: String,
        stage: ConversionStage,
    },
    /// Change a patient's clinical status.
    Status {
        patient: String,
        status: PatientStatus,
    },
    /// Audit trail for one patient, newest first.
    History { patient: String },
    /// Prometheus text exposition of queue and KPI gauges.
    Metrics,
}

#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    /// Medical record (HC) number.
    #[arg(long)]
    pub record: String,
    #[arg(long)]
    pub first_names: String,
    #[arg(long)]
    pub last_names: String,
    #[arg(long, default_value_t = 40)]
    pub age: u16,
    #[arg(long, default_value = "M")]
    pub sex: Sex,
    #[arg(long, default_value = "icu")]
    pub service: Service,
    #[arg(long, default_value_t = 8)]
    pub gcs: u8,
    #[arg(long, default_value = "reactive")]
    pub pupils: PupilReactivity,
    #[arg(long, default_value_t = 75.0)]
    pub map: f64,
    #[arg(long, default_value_t = 1.6)]
    pub lactate: f64,
    #[arg(long, default_value_t = 2.0)]
    pub hours: f64,
}

impl From<RegisterArgs> for NewPatient {
    fn from(args: RegisterArgs) -> Self {
        NewPatient {
            medical_record: args.record,
            first_names: args.first_names,
            last_names: args.last_names,
            age: args.age,
            sex: args.sex,
            service: args.service,
            glasgow_coma_score: args.gcs,
            pupil_reactivity: args.pupils,
            mean_arterial_pressure: args.map,
            lactate: args.lactate,
            hours_since_detection: args.hours,
        }
    }
}
