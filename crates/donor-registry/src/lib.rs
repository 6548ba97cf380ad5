pub mod intake;
pub mod queue;
pub mod repository;
pub mod seed;
pub mod store;
#[cfg(test)]
mod tests;

pub use intake::{IntakeError, NewPatient};
pub use queue::AlertQueue;
pub use repository::{
    DashboardState, PatientRepository, RegistryError, RepositoryOptions, DEFAULT_ACTOR, STATE_KEY,
};
pub use seed::seed_patients;
pub use store::{FileStore, KeyValueStore, MemoryStore};
