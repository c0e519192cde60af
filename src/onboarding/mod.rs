//! Dax onboarding — the fixed sequence of persona dialogs a new user sees.
//!
//! Progress is tracked in two places: the coarse `AppStage` persisted by the
//! stage store, and the per-CTA dismissal ledger. The tracker reads the
//! ledger to decide when the sequence is complete; the journey string keeps
//! shown telemetry from firing twice for the same dialog.

pub mod journey;
pub mod stage;
pub mod tracker;

pub use stage::AppStage;
pub use tracker::{DaxOnboardingTracker, REQUIRED_DAX_ONBOARDING_CTAS};
