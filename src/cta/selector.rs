//! CTA selection — a pure, priority-ordered decision over a resolved
//! snapshot of application state.
//!
//! The first matching branch wins. Selection never fails: missing or
//! inconsistent input simply yields no CTA.

use std::collections::HashSet;

use tracing::debug;

use crate::onboarding::AppStage;
use crate::onboarding::tracker::all_required_shown;

use super::model::{Cta, CtaId, DaxBubbleCta, DaxDialogCta, HomePanelCta, HomeTopPanelCta};
use super::site::{Site, SiteSignals};
use super::survey::Survey;
use super::widget::WidgetCapabilities;

/// Everything the selector needs, already read from the stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CtaSnapshot {
    pub stage: AppStage,
    pub hide_tips: bool,
    pub privacy_protection_enabled: bool,
    /// The browsed site's host is on the user's allowlist.
    pub site_allowlisted: bool,
    /// Survey that passed the gate, if any.
    pub survey: Option<Survey>,
    pub widgets: WidgetCapabilities,
    /// Ids present in the dismissal ledger.
    pub dismissed: HashSet<CtaId>,
}

impl CtaSnapshot {
    pub fn shown(&self, id: CtaId) -> bool {
        self.dismissed.contains(&id)
    }

    fn any_dax_dialog_shown(&self) -> bool {
        CtaId::DAX_DIALOGS.into_iter().any(|id| self.shown(id))
    }

    /// Intro and end bubbles have both been shown.
    fn dax_bubbles_finished(&self) -> bool {
        self.shown(CtaId::DaxIntro) && self.shown(CtaId::DaxEnd)
    }
}

#[derive(Debug, Clone)]
pub struct CtaSelector {
    serp_domain: String,
}

impl CtaSelector {
    pub fn new(serp_domain: impl Into<String>) -> Self {
        Self {
            serp_domain: serp_domain.into(),
        }
    }

    pub fn select(
        &self,
        snapshot: &CtaSnapshot,
        is_browser_showing: bool,
        site: Option<&Site>,
    ) -> Option<Cta> {
        let ended_early = snapshot.stage.is_past_dax_onboarding()
            && !all_required_shown(|id| snapshot.shown(id));
        if ended_early {
            debug!(stage = %snapshot.stage, "Onboarding ended before all Dax CTAs were shown");
            return None;
        }

        let cta = if is_browser_showing {
            self.browser_cta(snapshot, site)
        } else {
            self.home_cta(snapshot)
        };
        debug!(
            is_browser_showing,
            cta = ?cta.as_ref().map(Cta::id),
            "CTA selected"
        );
        cta
    }

    fn browser_cta(&self, snapshot: &CtaSnapshot, site: Option<&Site>) -> Option<Cta> {
        if !snapshot.privacy_protection_enabled || snapshot.site_allowlisted {
            return None;
        }
        let site = site?;
        if snapshot.hide_tips || snapshot.stage != AppStage::DaxOnboarding {
            return None;
        }

        let signals = SiteSignals::extract(site, &self.serp_domain);
        let host = signals.host.clone()?;

        let dialog = if signals.is_serp() {
            DaxDialogCta::Serp
        } else if signals.has_tracking_events && signals.major_network_count > 0 {
            DaxDialogCta::MainNetwork {
                network: signals.major_network.unwrap_or_default(),
                host,
            }
        } else if signals.has_tracking_events {
            DaxDialogCta::TrackersBlocked {
                trackers: signals.blocked_trackers,
                host,
            }
        } else {
            DaxDialogCta::NoSerp
        };
        Some(Cta::DaxDialog(dialog))
    }

    fn home_cta(&self, snapshot: &CtaSnapshot) -> Option<Cta> {
        if let Some(survey) = &snapshot.survey {
            return Some(Cta::HomePanel(HomePanelCta::Survey(survey.clone())));
        }

        if snapshot.hide_tips {
            return widget_cta(snapshot);
        }

        if snapshot.stage == AppStage::DaxOnboarding && !snapshot.dax_bubbles_finished() {
            if !snapshot.shown(CtaId::DaxIntro) {
                return Some(Cta::DaxBubble(DaxBubbleCta::DaxIntro));
            }
            if snapshot.any_dax_dialog_shown() {
                return Some(Cta::DaxBubble(DaxBubbleCta::DaxEnd));
            }
            return None;
        }

        if snapshot.dax_bubbles_finished() {
            return widget_cta(snapshot);
        }

        None
    }
}

/// Widget prompt matching the launcher's capabilities, falling back to the
/// informational panel.
fn widget_cta(snapshot: &CtaSnapshot) -> Option<Cta> {
    let widgets = snapshot.widgets;
    if !widgets.supports_standard_widget_add || snapshot.shown(CtaId::AddWidget) {
        return fallback_cta(snapshot);
    }
    // Offered even when a widget is already installed.
    if widgets.supports_automatic_widget_add {
        Some(Cta::HomePanel(HomePanelCta::AddWidgetAuto))
    } else {
        Some(Cta::HomePanel(HomePanelCta::AddWidgetInstructions))
    }
}

fn fallback_cta(snapshot: &CtaSnapshot) -> Option<Cta> {
    if snapshot.shown(CtaId::Covid) {
        None
    } else {
        Some(Cta::HomeTopPanel(HomeTopPanelCta::Covid))
    }
}
