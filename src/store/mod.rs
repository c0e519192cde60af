//! Persistence layer — collaborator traits plus in-memory and libSQL adapters.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryStore;
pub use traits::{
    DismissedCtaStore, InstallStore, OnboardingStore, SettingsStore, SurveyStore, UserStageStore,
};
