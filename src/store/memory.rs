//! In-memory store — implements every collaborator trait without persistence.
//!
//! Used by tests and by the binary when no database path is configured.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tracing::debug;

use crate::cta::model::{CtaId, DismissedCta};
use crate::cta::survey::{Survey, SurveyStatus};
use crate::error::StoreError;
use crate::onboarding::AppStage;

use super::traits::{
    DismissedCtaStore, InstallStore, OnboardingStore, SettingsStore, SurveyStore, UserStageStore,
};

struct MemoryState {
    dismissed: HashSet<CtaId>,
    hide_tips: bool,
    privacy_protection_enabled: bool,
    allowlist: HashSet<String>,
    stage: AppStage,
    journey: Option<String>,
    survey: Option<Survey>,
}

pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    survey_tx: watch::Sender<Option<Survey>>,
    installed_at: DateTime<Utc>,
}

impl InMemoryStore {
    /// A freshly installed app in the Dax onboarding stage.
    pub fn new() -> Self {
        Self::with_stage(AppStage::DaxOnboarding)
    }

    pub fn with_stage(stage: AppStage) -> Self {
        let (survey_tx, _rx) = watch::channel(None);
        Self {
            state: RwLock::new(MemoryState {
                dismissed: HashSet::new(),
                hide_tips: false,
                privacy_protection_enabled: true,
                allowlist: HashSet::new(),
                stage,
                journey: None,
                survey: None,
            }),
            survey_tx,
            installed_at: Utc::now(),
        }
    }

    /// Set the install timestamp.
    pub fn with_installed_at(mut self, installed_at: DateTime<Utc>) -> Self {
        self.installed_at = installed_at;
        self
    }

    /// Snapshot of the ledger, sorted.
    pub async fn dismissed_ids(&self) -> Vec<CtaId> {
        let mut ids: Vec<CtaId> = self.state.read().await.dismissed.iter().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DismissedCtaStore for InMemoryStore {
    async fn exists(&self, id: CtaId) -> Result<bool, StoreError> {
        Ok(self.state.read().await.dismissed.contains(&id))
    }

    async fn insert(&self, dismissed: DismissedCta) -> Result<(), StoreError> {
        self.state.write().await.dismissed.insert(dismissed.cta_id);
        Ok(())
    }
}

#[async_trait]
impl SurveyStore for InMemoryStore {
    async fn current_survey(&self) -> Result<Option<Survey>, StoreError> {
        Ok(self.state.read().await.survey.clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Survey>> {
        self.survey_tx.subscribe()
    }

    async fn schedule(&self, survey: Survey) -> Result<(), StoreError> {
        debug!(survey_id = %survey.id, "Survey scheduled");
        self.state.write().await.survey = Some(survey.clone());
        self.survey_tx.send_replace(Some(survey));
        Ok(())
    }

    async fn cancel_scheduled_surveys(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(survey) = state.survey.as_mut() {
            if survey.status == SurveyStatus::Scheduled {
                survey.status = SurveyStatus::Cancelled;
            }
        }
        self.survey_tx.send_replace(state.survey.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn hide_tips(&self) -> Result<bool, StoreError> {
        Ok(self.state.read().await.hide_tips)
    }

    async fn set_hide_tips(&self, hide: bool) -> Result<(), StoreError> {
        self.state.write().await.hide_tips = hide;
        Ok(())
    }

    async fn privacy_protection_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.state.read().await.privacy_protection_enabled)
    }

    async fn set_privacy_protection_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.state.write().await.privacy_protection_enabled = enabled;
        Ok(())
    }

    async fn is_allowlisted(&self, host: &str) -> Result<bool, StoreError> {
        Ok(self.state.read().await.allowlist.contains(host))
    }

    async fn add_to_allowlist(&self, host: &str) -> Result<(), StoreError> {
        self.state.write().await.allowlist.insert(host.to_string());
        Ok(())
    }
}

#[async_trait]
impl UserStageStore for InMemoryStore {
    async fn user_app_stage(&self) -> Result<AppStage, StoreError> {
        Ok(self.state.read().await.stage)
    }

    async fn stage_completed(&self, stage: AppStage) -> Result<AppStage, StoreError> {
        let mut state = self.state.write().await;
        state.stage = state.stage.after_completing(stage);
        Ok(state.stage)
    }
}

#[async_trait]
impl OnboardingStore for InMemoryStore {
    async fn dialog_journey(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.read().await.journey.clone())
    }

    async fn set_dialog_journey(&self, journey: String) -> Result<(), StoreError> {
        self.state.write().await.journey = Some(journey);
        Ok(())
    }
}

#[async_trait]
impl InstallStore for InMemoryStore {
    async fn installed_at(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.installed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ledger_insert_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(!store.exists(CtaId::DaxIntro).await.unwrap());

        store.insert(DismissedCta::new(CtaId::DaxIntro)).await.unwrap();
        store.insert(DismissedCta::new(CtaId::DaxIntro)).await.unwrap();

        assert!(store.exists(CtaId::DaxIntro).await.unwrap());
        assert_eq!(store.dismissed_ids().await, vec![CtaId::DaxIntro]);
    }

    #[tokio::test]
    async fn survey_feed_follows_schedule_and_cancel() {
        let store = InMemoryStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_none());

        store
            .schedule(Survey::scheduled("s1", "https://survey.example.com", None))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().clone().map(|s| s.status), Some(SurveyStatus::Scheduled));

        store.cancel_scheduled_surveys().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().clone().map(|s| s.status), Some(SurveyStatus::Cancelled));
        assert_eq!(
            store.current_survey().await.unwrap().map(|s| s.status),
            Some(SurveyStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn stage_only_moves_forward() {
        let store = InMemoryStore::with_stage(AppStage::New);
        assert_eq!(
            store.stage_completed(AppStage::DaxOnboarding).await.unwrap(),
            AppStage::New
        );
        assert_eq!(store.stage_completed(AppStage::New).await.unwrap(), AppStage::DaxOnboarding);
        assert_eq!(
            store.stage_completed(AppStage::DaxOnboarding).await.unwrap(),
            AppStage::Established
        );
    }

    #[tokio::test]
    async fn days_installed_counts_whole_days() {
        let now = Utc::now();
        let store = InMemoryStore::new().with_installed_at(now - chrono::Duration::hours(49));
        assert_eq!(store.days_installed(now).await.unwrap(), 2);

        let future = InMemoryStore::new().with_installed_at(now + chrono::Duration::days(1));
        assert_eq!(future.days_installed(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settings_defaults() {
        let store = InMemoryStore::new();
        assert!(!store.hide_tips().await.unwrap());
        assert!(store.privacy_protection_enabled().await.unwrap());
        assert!(!store.is_allowlisted("example.com").await.unwrap());

        store.add_to_allowlist("example.com").await.unwrap();
        assert!(store.is_allowlisted("example.com").await.unwrap());
    }
}
