//! CTA lifecycle — what happens after a CTA has been handed to the UI.
//!
//! Each event performs at most one ledger insert plus one completion check.
//! Pixels are fire-and-forget; only persistence failures reach the caller.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;
use crate::onboarding::{AppStage, journey};

use super::engine::CtaEngine;
use super::model::{Cta, DismissedCta};
use super::pixel::{PARAM_CTA, PixelEvent, PixelName};

impl CtaEngine {
    /// Fire the shown pixel. Dax CTAs fire once per journey marker; the
    /// extended journey is persisted and sent as the `cta` parameter.
    pub async fn on_cta_shown(&self, cta: &Cta) -> Result<()> {
        let Some(name) = cta.shown_pixel() else {
            return Ok(());
        };

        let Some(marker) = cta.journey_marker() else {
            self.fire(name, cta);
            return Ok(());
        };

        let journey = self.deps.onboarding.dialog_journey().await?;
        if !journey::can_send_shown_pixel(journey.as_deref(), marker) {
            debug!(cta = %cta.id(), marker, "Dax CTA already recorded in journey");
            return Ok(());
        }

        let days = self.deps.install.days_installed(Utc::now()).await?;
        let journey = journey::append(
            journey.as_deref(),
            marker,
            days,
            self.config.journey_max_days,
        );
        self.deps.onboarding.set_dialog_journey(journey.clone()).await?;
        self.deps
            .pixel
            .fire(PixelEvent::new(name).with_param(PARAM_CTA, journey));
        Ok(())
    }

    /// Fire the launch pixel. Returns the survey url to open for survey CTAs.
    pub fn on_user_click_cta_ok_button(&self, cta: &Cta) -> Option<String> {
        if let Some(name) = cta.ok_pixel() {
            self.fire(name, cta);
        }
        cta.survey().and_then(|survey| survey.url.clone())
    }

    pub fn on_user_click_cta_secondary_button(&self, cta: &Cta) {
        if let Some(name) = cta.secondary_button_pixel() {
            self.fire(name, cta);
        }
    }

    /// Surveys cancel every scheduled survey and stay out of the ledger.
    /// Everything else is recorded, which may complete Dax onboarding.
    pub async fn on_user_dismissed_cta(&self, cta: &Cta) -> Result<()> {
        if let Some(name) = cta.cancel_pixel() {
            self.fire(name, cta);
        }

        if let Some(survey) = cta.survey() {
            info!(survey_id = %survey.id, "Survey dismissed, cancelling scheduled surveys");
            self.deps.surveys.cancel_scheduled_surveys().await?;
            return Ok(());
        }

        self.record_dismissal(cta).await
    }

    /// A Dax bubble advanced on its own. Other CTAs are ignored.
    pub async fn register_dax_bubble_cta_dismissed(&self, cta: &Cta) -> Result<()> {
        if !matches!(cta, Cta::DaxBubble(_)) {
            debug!(cta = %cta.id(), "Ignoring bubble dismissal for non-bubble CTA");
            return Ok(());
        }
        self.record_dismissal(cta).await
    }

    /// Silence every tip and end Dax onboarding regardless of the ledger.
    pub async fn hide_tips_forever(&self, cta: &Cta) -> Result<()> {
        self.fire(PixelName::DaxAllCtaHidden, cta);
        self.deps.settings.set_hide_tips(true).await?;
        let stage = self
            .deps
            .stages
            .stage_completed(AppStage::DaxOnboarding)
            .await?;
        info!(cta = %cta.id(), stage = %stage, "Tips hidden forever");
        Ok(())
    }

    async fn record_dismissal(&self, cta: &Cta) -> Result<()> {
        let id = cta.id();
        self.deps.dismissed.insert(DismissedCta::new(id)).await?;
        info!(cta = %id, "CTA recorded in dismissal ledger");
        self.complete_stage_if_dax_onboarding_completed().await?;
        Ok(())
    }

    /// Returns whether the stage was marked completed.
    async fn complete_stage_if_dax_onboarding_completed(&self) -> Result<bool> {
        if !self
            .tracker
            .has_shown_all_required_dax_onboarding_ctas()
            .await?
        {
            return Ok(false);
        }
        let stage = self
            .deps
            .stages
            .stage_completed(AppStage::DaxOnboarding)
            .await?;
        info!(stage = %stage, "Dax onboarding completed");
        Ok(true)
    }

    fn fire(&self, name: PixelName, cta: &Cta) {
        let mut event = PixelEvent::new(name);
        event.parameters = cta.pixel_parameters();
        self.deps.pixel.fire(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::config::CtaConfig;
    use crate::cta::engine::testing::{Harness, harness};
    use crate::cta::model::{CtaId, DaxBubbleCta, DaxDialogCta, HomePanelCta, HomeTopPanelCta};
    use crate::cta::survey::{Survey, SurveyStatus};
    use crate::cta::widget::WidgetCapabilities;
    use crate::error::{Error, StoreError};
    use crate::onboarding::REQUIRED_DAX_ONBOARDING_CTAS;
    use crate::store::{
        DismissedCtaStore, InMemoryStore, OnboardingStore, SettingsStore, SurveyStore,
        UserStageStore,
    };

    fn setup() -> Harness {
        harness(
            InMemoryStore::new().with_installed_at(Utc::now() - Duration::days(1)),
            WidgetCapabilities::default(),
        )
    }

    fn cta_for(id: CtaId) -> Cta {
        match id {
            CtaId::DaxIntro => Cta::DaxBubble(DaxBubbleCta::DaxIntro),
            CtaId::DaxEnd => Cta::DaxBubble(DaxBubbleCta::DaxEnd),
            CtaId::DaxDialogSerp => Cta::DaxDialog(DaxDialogCta::Serp),
            CtaId::DaxDialogOther => Cta::DaxDialog(DaxDialogCta::NoSerp),
            CtaId::DaxDialogNetwork => Cta::DaxDialog(DaxDialogCta::MainNetwork {
                network: "Facebook".into(),
                host: "facebook.com".into(),
            }),
            CtaId::DaxDialogTrackersFound => Cta::DaxDialog(DaxDialogCta::TrackersBlocked {
                trackers: vec!["Google".into()],
                host: "example.com".into(),
            }),
            CtaId::AddWidget => Cta::HomePanel(HomePanelCta::AddWidgetInstructions),
            CtaId::Survey => Cta::HomePanel(HomePanelCta::Survey(survey())),
            CtaId::Covid => Cta::HomeTopPanel(HomeTopPanelCta::Covid),
        }
    }

    fn survey() -> Survey {
        Survey::scheduled("s1", "https://survey.example.com", Some(1))
    }

    #[tokio::test]
    async fn dismissing_survey_cancels_and_skips_ledger() {
        let h = setup();
        h.store.schedule(survey()).await.unwrap();

        h.engine
            .on_user_dismissed_cta(&cta_for(CtaId::Survey))
            .await
            .unwrap();

        assert!(h.store.dismissed_ids().await.is_empty());
        assert_eq!(
            h.store.current_survey().await.unwrap().map(|s| s.status),
            Some(SurveyStatus::Cancelled)
        );
        assert_eq!(h.pixel.names(), vec![PixelName::SurveyCtaDismissed]);
    }

    #[tokio::test]
    async fn dismissing_non_survey_inserts_its_id() {
        for id in CtaId::ALL.into_iter().filter(|id| *id != CtaId::Survey) {
            let h = setup();
            h.engine.on_user_dismissed_cta(&cta_for(id)).await.unwrap();
            assert_eq!(h.store.dismissed_ids().await, vec![id], "{id}");
        }
    }

    #[tokio::test]
    async fn dismissal_completes_stage_once_sequence_is_complete() {
        let h = setup();
        let (last, rest) = REQUIRED_DAX_ONBOARDING_CTAS.split_last().unwrap();
        for id in rest {
            h.engine.on_user_dismissed_cta(&cta_for(*id)).await.unwrap();
            assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::DaxOnboarding);
        }

        h.engine.on_user_dismissed_cta(&cta_for(*last)).await.unwrap();
        assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::Established);
    }

    #[tokio::test]
    async fn other_dialog_does_not_count_toward_completion() {
        let h = setup();
        for id in [
            CtaId::DaxIntro,
            CtaId::DaxDialogSerp,
            CtaId::DaxDialogTrackersFound,
            CtaId::DaxDialogOther,
            CtaId::DaxEnd,
        ] {
            h.engine.on_user_dismissed_cta(&cta_for(id)).await.unwrap();
        }
        assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::DaxOnboarding);
    }

    #[tokio::test]
    async fn bubble_registration_records_without_pixel() {
        let h = setup();
        h.engine
            .register_dax_bubble_cta_dismissed(&cta_for(CtaId::DaxIntro))
            .await
            .unwrap();
        assert_eq!(h.store.dismissed_ids().await, vec![CtaId::DaxIntro]);
        assert!(h.pixel.events().is_empty());
    }

    #[tokio::test]
    async fn bubble_registration_ignores_other_ctas() {
        let h = setup();
        h.engine
            .register_dax_bubble_cta_dismissed(&cta_for(CtaId::DaxDialogSerp))
            .await
            .unwrap();
        assert!(h.store.dismissed_ids().await.is_empty());
    }

    #[tokio::test]
    async fn bubble_registration_can_complete_stage() {
        let h = setup();
        for id in [
            CtaId::DaxIntro,
            CtaId::DaxDialogSerp,
            CtaId::DaxDialogTrackersFound,
            CtaId::DaxDialogNetwork,
        ] {
            h.store.insert(DismissedCta::new(id)).await.unwrap();
        }
        h.engine
            .register_dax_bubble_cta_dismissed(&cta_for(CtaId::DaxEnd))
            .await
            .unwrap();
        assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::Established);
    }

    #[tokio::test]
    async fn hide_tips_forever_overrides_ledger() {
        let h = setup();
        let cta = cta_for(CtaId::DaxDialogSerp);
        h.engine.hide_tips_forever(&cta).await.unwrap();

        assert!(h.store.hide_tips().await.unwrap());
        assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::Established);
        assert!(h.store.dismissed_ids().await.is_empty());

        let events = h.pixel.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, PixelName::DaxAllCtaHidden);
        assert_eq!(events[0].parameters.get(PARAM_CTA).map(String::as_str), Some("s"));
    }

    #[tokio::test]
    async fn shown_pixel_fires_once_per_dax_marker() {
        let h = setup();
        let intro = cta_for(CtaId::DaxIntro);
        h.engine.on_cta_shown(&intro).await.unwrap();
        h.engine.on_cta_shown(&intro).await.unwrap();
        h.engine.on_cta_shown(&cta_for(CtaId::DaxDialogSerp)).await.unwrap();

        let events = h.pixel.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].parameters.get(PARAM_CTA).map(String::as_str), Some("i:1"));
        assert_eq!(
            events[1].parameters.get(PARAM_CTA).map(String::as_str),
            Some("i:1-s:1")
        );
        assert_eq!(
            h.store.dialog_journey().await.unwrap().as_deref(),
            Some("i:1-s:1")
        );
    }

    #[tokio::test]
    async fn shown_pixel_for_home_panel_always_fires() {
        let h = setup();
        let widget = cta_for(CtaId::AddWidget);
        h.engine.on_cta_shown(&widget).await.unwrap();
        h.engine.on_cta_shown(&widget).await.unwrap();
        assert_eq!(
            h.pixel.names(),
            vec![PixelName::WidgetLegacyCtaShown, PixelName::WidgetLegacyCtaShown]
        );
        assert_eq!(h.store.dialog_journey().await.unwrap(), None);
    }

    #[tokio::test]
    async fn shown_with_negative_day_cap_records_day_zero() {
        let h = setup();
        let config = CtaConfig {
            journey_max_days: -1,
            ..CtaConfig::default()
        };
        let engine = CtaEngine::new(h.engine.deps().clone(), config);

        engine.on_cta_shown(&cta_for(CtaId::DaxIntro)).await.unwrap();
        assert_eq!(h.store.dialog_journey().await.unwrap().as_deref(), Some("i:0"));
        assert_eq!(h.pixel.names(), vec![PixelName::DaxCtaShown]);
    }

    #[tokio::test]
    async fn ok_button_returns_survey_url() {
        let h = setup();
        let url = h.engine.on_user_click_cta_ok_button(&cta_for(CtaId::Survey));
        assert_eq!(url.as_deref(), Some("https://survey.example.com"));
        assert_eq!(h.pixel.names(), vec![PixelName::SurveyCtaLaunched]);

        assert_eq!(h.engine.on_user_click_cta_ok_button(&cta_for(CtaId::DaxIntro)), None);
        assert_eq!(h.pixel.names().len(), 1);
    }

    #[tokio::test]
    async fn secondary_button_only_for_dialogs() {
        let h = setup();
        h.engine.on_user_click_cta_secondary_button(&cta_for(CtaId::DaxDialogNetwork));
        h.engine.on_user_click_cta_secondary_button(&cta_for(CtaId::Covid));

        let events = h.pixel.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, PixelName::DaxCtaHideButton);
        assert_eq!(events[0].parameters.get(PARAM_CTA).map(String::as_str), Some("n"));
    }

    struct ReadOnlyLedger(Arc<InMemoryStore>);

    #[async_trait]
    impl DismissedCtaStore for ReadOnlyLedger {
        async fn exists(&self, id: CtaId) -> std::result::Result<bool, StoreError> {
            self.0.exists(id).await
        }
        async fn insert(&self, _dismissed: DismissedCta) -> std::result::Result<(), StoreError> {
            Err(StoreError::Query("disk full".into()))
        }
    }

    #[tokio::test]
    async fn ledger_failure_propagates_and_skips_completion() {
        let h = setup();
        let mut deps = h.engine.deps().clone();
        deps.dismissed = Arc::new(ReadOnlyLedger(h.store.clone()));
        let engine = CtaEngine::new(deps, CtaConfig::default());

        let err = engine
            .on_user_dismissed_cta(&cta_for(CtaId::DaxEnd))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Query(_))));
        assert_eq!(h.store.user_app_stage().await.unwrap(), AppStage::DaxOnboarding);
        assert!(h.pixel.events().is_empty());
    }
}
