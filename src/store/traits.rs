//! Collaborator store traits consumed by the CTA engine.
//!
//! Each concern is its own async trait so tests can swap any single store
//! for a fake. `InMemoryStore` and `LibSqlBackend` implement all of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::cta::model::{CtaId, DismissedCta};
use crate::cta::survey::Survey;
use crate::error::StoreError;
use crate::onboarding::AppStage;

/// Ledger of CTAs that have been shown or dismissed.
#[async_trait]
pub trait DismissedCtaStore: Send + Sync {
    /// Whether a record exists for `id`.
    async fn exists(&self, id: CtaId) -> Result<bool, StoreError>;

    /// Insert a record. Inserting an existing id is a no-op.
    async fn insert(&self, dismissed: DismissedCta) -> Result<(), StoreError>;
}

/// Surveys scheduled by the survey backend.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// The most recently scheduled survey, if any, regardless of status.
    async fn current_survey(&self) -> Result<Option<Survey>, StoreError>;

    /// Feed of the current survey, updated on every change.
    fn subscribe(&self) -> watch::Receiver<Option<Survey>>;

    /// Store a survey as the current one.
    async fn schedule(&self, survey: Survey) -> Result<(), StoreError>;

    /// Mark every scheduled survey as cancelled.
    async fn cancel_scheduled_surveys(&self) -> Result<(), StoreError>;
}

/// User settings relevant to CTAs.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn hide_tips(&self) -> Result<bool, StoreError>;

    async fn set_hide_tips(&self, hide: bool) -> Result<(), StoreError>;

    /// Global privacy protection switch.
    async fn privacy_protection_enabled(&self) -> Result<bool, StoreError>;

    async fn set_privacy_protection_enabled(&self, enabled: bool) -> Result<(), StoreError>;

    /// Whether the user disabled protection for `host`.
    async fn is_allowlisted(&self, host: &str) -> Result<bool, StoreError>;

    async fn add_to_allowlist(&self, host: &str) -> Result<(), StoreError>;
}

/// Persisted onboarding stage.
#[async_trait]
pub trait UserStageStore: Send + Sync {
    async fn user_app_stage(&self) -> Result<AppStage, StoreError>;

    /// Mark `stage` completed, advancing only if it is the current stage.
    /// Returns the resulting stage.
    async fn stage_completed(&self, stage: AppStage) -> Result<AppStage, StoreError>;
}

/// Onboarding bookkeeping that is not part of the ledger.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    async fn dialog_journey(&self) -> Result<Option<String>, StoreError>;

    async fn set_dialog_journey(&self, journey: String) -> Result<(), StoreError>;
}

/// When the app was first installed.
#[async_trait]
pub trait InstallStore: Send + Sync {
    async fn installed_at(&self) -> Result<DateTime<Utc>, StoreError>;

    /// Whole days between install and `now`.
    async fn days_installed(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let installed = self.installed_at().await?;
        Ok((now - installed).num_days().max(0))
    }
}
