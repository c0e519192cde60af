//! Dax onboarding tracker — read-only view over the dismissal ledger.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::cta::model::CtaId;
use crate::error::StoreError;
use crate::store::{DismissedCtaStore, UserStageStore};

use super::stage::AppStage;

/// CTAs that must all be in the ledger before Dax onboarding is complete.
pub const REQUIRED_DAX_ONBOARDING_CTAS: [CtaId; 5] = [
    CtaId::DaxIntro,
    CtaId::DaxDialogSerp,
    CtaId::DaxDialogTrackersFound,
    CtaId::DaxDialogNetwork,
    CtaId::DaxEnd,
];

/// Whether every required id is present according to `shown`.
pub fn all_required_shown(shown: impl Fn(CtaId) -> bool) -> bool {
    REQUIRED_DAX_ONBOARDING_CTAS.into_iter().all(shown)
}

#[derive(Clone)]
pub struct DaxOnboardingTracker {
    dismissed: Arc<dyn DismissedCtaStore>,
    stages: Arc<dyn UserStageStore>,
}

impl DaxOnboardingTracker {
    pub fn new(dismissed: Arc<dyn DismissedCtaStore>, stages: Arc<dyn UserStageStore>) -> Self {
        Self { dismissed, stages }
    }

    pub async fn has_shown_all_required_dax_onboarding_ctas(&self) -> Result<bool, StoreError> {
        let lookups = REQUIRED_DAX_ONBOARDING_CTAS
            .into_iter()
            .map(|id| self.dismissed.exists(id));
        let present = try_join_all(lookups).await?;
        Ok(present.into_iter().all(|shown| shown))
    }

    pub async fn is_active_stage(&self) -> Result<bool, StoreError> {
        Ok(self.stages.user_app_stage().await? == AppStage::DaxOnboarding)
    }
}
