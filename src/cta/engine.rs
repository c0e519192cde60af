//! CtaEngine — gathers a snapshot from the stores and runs the selector.
//!
//! Lifecycle events (shown, ok, dismiss, hide forever) live in
//! `lifecycle.rs` as a second `impl` block on the same type.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::CtaConfig;
use crate::error::StoreError;
use crate::onboarding::DaxOnboardingTracker;
use crate::store::{
    DismissedCtaStore, InstallStore, OnboardingStore, SettingsStore, SurveyStore, UserStageStore,
};

use super::model::{Cta, CtaId};
use super::pixel::Pixel;
use super::selector::{CtaSelector, CtaSnapshot};
use super::site::Site;
use super::survey::{Survey, SurveyGate};
use super::widget::WidgetCapabilityProbe;

/// Collaborators injected into the engine.
#[derive(Clone)]
pub struct CtaDeps {
    pub dismissed: Arc<dyn DismissedCtaStore>,
    pub surveys: Arc<dyn SurveyStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub stages: Arc<dyn UserStageStore>,
    pub onboarding: Arc<dyn OnboardingStore>,
    pub install: Arc<dyn InstallStore>,
    pub widgets: Arc<dyn WidgetCapabilityProbe>,
    pub pixel: Arc<dyn Pixel>,
}

impl CtaDeps {
    /// Use one store for every persistence concern.
    pub fn from_store<S>(
        store: Arc<S>,
        widgets: Arc<dyn WidgetCapabilityProbe>,
        pixel: Arc<dyn Pixel>,
    ) -> Self
    where
        S: DismissedCtaStore
            + SurveyStore
            + SettingsStore
            + UserStageStore
            + OnboardingStore
            + InstallStore
            + 'static,
    {
        Self {
            dismissed: store.clone(),
            surveys: store.clone(),
            settings: store.clone(),
            stages: store.clone(),
            onboarding: store.clone(),
            install: store,
            widgets,
            pixel,
        }
    }
}

pub struct CtaEngine {
    pub(super) deps: CtaDeps,
    pub(super) config: CtaConfig,
    pub(super) tracker: DaxOnboardingTracker,
    selector: CtaSelector,
    gate: SurveyGate,
}

impl CtaEngine {
    pub fn new(deps: CtaDeps, config: CtaConfig) -> Arc<Self> {
        let tracker = DaxOnboardingTracker::new(deps.dismissed.clone(), deps.stages.clone());
        let selector = CtaSelector::new(config.serp_domain.clone());
        Arc::new(Self {
            deps,
            config,
            tracker,
            selector,
            gate: SurveyGate,
        })
    }

    pub fn deps(&self) -> &CtaDeps {
        &self.deps
    }

    pub fn tracker(&self) -> &DaxOnboardingTracker {
        &self.tracker
    }

    /// Select the CTA to show now, running the store reads on `executor`.
    ///
    /// Returns `None` when nothing should be shown, when a store read fails,
    /// or when the task is cancelled.
    pub async fn refresh_cta(
        self: &Arc<Self>,
        executor: &Handle,
        is_browser_showing: bool,
        site: Option<Site>,
    ) -> Option<Cta> {
        let engine = Arc::clone(self);
        let task = executor.spawn(async move {
            engine.refresh_now(is_browser_showing, site.as_ref()).await
        });
        match task.await {
            Ok(cta) => cta,
            Err(e) => {
                warn!(error = %e, "CTA refresh task did not complete");
                None
            }
        }
    }

    /// Same as `refresh_cta`, on the current task.
    pub async fn refresh_now(&self, is_browser_showing: bool, site: Option<&Site>) -> Option<Cta> {
        match self.snapshot(site).await {
            Ok(snapshot) => self.selector.select(&snapshot, is_browser_showing, site),
            Err(e) => {
                warn!(error = %e, "Failed to read CTA state");
                None
            }
        }
    }

    /// Read everything the selector needs. Each ledger lookup is independent.
    pub async fn snapshot(&self, site: Option<&Site>) -> Result<CtaSnapshot, StoreError> {
        let host = site.and_then(Site::host);
        let settings = &self.deps.settings;

        let allowlisted = async {
            match host.as_deref() {
                Some(host) => settings.is_allowlisted(host).await,
                None => Ok(false),
            }
        };
        let ledger = try_join_all(CtaId::ALL.into_iter().map(|id| async move {
            let shown = self.deps.dismissed.exists(id).await?;
            Ok::<_, StoreError>((id, shown))
        }));

        let (stage, hide_tips, privacy_protection_enabled, site_allowlisted, survey, ledger) =
            tokio::try_join!(
                self.deps.stages.user_app_stage(),
                settings.hide_tips(),
                settings.privacy_protection_enabled(),
                allowlisted,
                self.eligible_survey(),
                ledger,
            )?;

        Ok(CtaSnapshot {
            stage,
            hide_tips,
            privacy_protection_enabled,
            site_allowlisted,
            survey,
            widgets: self.deps.widgets.capabilities(),
            dismissed: ledger
                .into_iter()
                .filter_map(|(id, shown)| shown.then_some(id))
                .collect(),
        })
    }

    /// Current survey if it is scheduled and the install is old enough.
    async fn eligible_survey(&self) -> Result<Option<Survey>, StoreError> {
        let survey = self
            .deps
            .surveys
            .current_survey()
            .await?
            .filter(Survey::is_scheduled);

        let survey = match survey {
            Some(survey) => {
                let days = self.deps.install.days_installed(Utc::now()).await?;
                if days >= self.config.survey_min_days_installed {
                    Some(survey)
                } else {
                    debug!(survey_id = %survey.id, days, "Survey not yet eligible");
                    None
                }
            }
            None => None,
        };
        Ok(self.gate.on_survey_changed(survey))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cta::pixel::testing::RecordingPixel;
    use crate::cta::widget::{StaticWidgetCapabilities, WidgetCapabilities};
    use crate::store::InMemoryStore;

    pub struct Harness {
        pub engine: Arc<CtaEngine>,
        pub store: Arc<InMemoryStore>,
        pub pixel: Arc<RecordingPixel>,
    }

    pub fn harness(store: InMemoryStore, widgets: WidgetCapabilities) -> Harness {
        let store = Arc::new(store);
        let pixel = Arc::new(RecordingPixel::default());
        let deps = CtaDeps::from_store(
            store.clone(),
            Arc::new(StaticWidgetCapabilities(widgets)),
            pixel.clone(),
        );
        Harness {
            engine: CtaEngine::new(deps, CtaConfig::default()),
            store,
            pixel,
        }
    }
}
