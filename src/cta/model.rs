//! CTA data model — identifiers, variants, and dismissal records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pixel::{PARAM_CTA, PixelName};
use super::survey::Survey;

/// Stable identifier of a CTA, used by the dismissal ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtaId {
    DaxIntro,
    DaxDialogSerp,
    DaxDialogTrackersFound,
    DaxDialogNetwork,
    DaxDialogOther,
    DaxEnd,
    AddWidget,
    Survey,
    Covid,
}

impl CtaId {
    /// Every identifier, in declaration order.
    pub const ALL: [CtaId; 9] = [
        CtaId::DaxIntro,
        CtaId::DaxDialogSerp,
        CtaId::DaxDialogTrackersFound,
        CtaId::DaxDialogNetwork,
        CtaId::DaxDialogOther,
        CtaId::DaxEnd,
        CtaId::AddWidget,
        CtaId::Survey,
        CtaId::Covid,
    ];

    /// Identifiers of the in-browser Dax dialogs.
    pub const DAX_DIALOGS: [CtaId; 4] = [
        CtaId::DaxDialogSerp,
        CtaId::DaxDialogTrackersFound,
        CtaId::DaxDialogNetwork,
        CtaId::DaxDialogOther,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DaxIntro => "DAX_INTRO",
            Self::DaxDialogSerp => "DAX_DIALOG_SERP",
            Self::DaxDialogTrackersFound => "DAX_DIALOG_TRACKERS_FOUND",
            Self::DaxDialogNetwork => "DAX_DIALOG_NETWORK",
            Self::DaxDialogOther => "DAX_DIALOG_OTHER",
            Self::DaxEnd => "DAX_END",
            Self::AddWidget => "ADD_WIDGET",
            Self::Survey => "SURVEY",
            Self::Covid => "COVID",
        }
    }
}

impl std::fmt::Display for CtaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CtaId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CtaId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown CTA id: {}", s))
    }
}

/// Ledger record: the CTA has been shown or dismissed at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DismissedCta {
    pub cta_id: CtaId,
}

impl DismissedCta {
    pub fn new(cta_id: CtaId) -> Self {
        Self { cta_id }
    }
}

/// Full-screen Dax bubbles shown on the home tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaxBubbleCta {
    DaxIntro,
    DaxEnd,
}

/// Dax dialogs shown over a browsed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaxDialogCta {
    Serp,
    NoSerp,
    MainNetwork { network: String, host: String },
    TrackersBlocked { trackers: Vec<String>, host: String },
}

impl DaxDialogCta {
    /// Dialog text built from the parameters the dialog carries.
    pub fn message(&self) -> String {
        match self {
            Self::Serp => "Your searches here are private. Nobody gets to follow you around \
                           with ads based on what you look for."
                .to_string(),
            Self::NoSerp => "As you tap and scroll, I'll block pesky trackers and upgrade \
                             connections to a secure version where I can."
                .to_string(),
            Self::MainNetwork { network, host } => format!(
                "Heads up! {network} runs one of the largest tracker networks on the web, \
                 and it can see what you do on {host}."
            ),
            Self::TrackersBlocked { trackers, host } => match trackers.as_slice() {
                [] => format!("I blocked trackers that were trying to follow you on {host}."),
                [only] => format!("{only} was trying to track you on {host}. I blocked it!"),
                [first, second] => format!(
                    "{first} and {second} were trying to track you on {host}. I blocked them!"
                ),
                [first, second, rest @ ..] => format!(
                    "{first}, {second} and {} more were trying to track you on {host}. \
                     I blocked them!",
                    rest.len()
                ),
            },
        }
    }
}

/// Panels shown at the bottom of the home tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HomePanelCta {
    AddWidgetAuto,
    AddWidgetInstructions,
    Survey(Survey),
}

/// Informational panels shown at the top of the home tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HomeTopPanelCta {
    Covid,
}

/// A selected call-to-action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "cta", rename_all = "snake_case")]
pub enum Cta {
    DaxBubble(DaxBubbleCta),
    DaxDialog(DaxDialogCta),
    HomePanel(HomePanelCta),
    HomeTopPanel(HomeTopPanelCta),
}

impl Cta {
    pub fn id(&self) -> CtaId {
        match self {
            Self::DaxBubble(DaxBubbleCta::DaxIntro) => CtaId::DaxIntro,
            Self::DaxBubble(DaxBubbleCta::DaxEnd) => CtaId::DaxEnd,
            Self::DaxDialog(DaxDialogCta::Serp) => CtaId::DaxDialogSerp,
            Self::DaxDialog(DaxDialogCta::NoSerp) => CtaId::DaxDialogOther,
            Self::DaxDialog(DaxDialogCta::MainNetwork { .. }) => CtaId::DaxDialogNetwork,
            Self::DaxDialog(DaxDialogCta::TrackersBlocked { .. }) => {
                CtaId::DaxDialogTrackersFound
            }
            Self::HomePanel(HomePanelCta::AddWidgetAuto)
            | Self::HomePanel(HomePanelCta::AddWidgetInstructions) => CtaId::AddWidget,
            Self::HomePanel(HomePanelCta::Survey(_)) => CtaId::Survey,
            Self::HomeTopPanel(HomeTopPanelCta::Covid) => CtaId::Covid,
        }
    }

    pub fn survey(&self) -> Option<&Survey> {
        match self {
            Self::HomePanel(HomePanelCta::Survey(survey)) => Some(survey),
            _ => None,
        }
    }

    /// Short marker recorded in the onboarding journey for Dax CTAs.
    pub fn journey_marker(&self) -> Option<&'static str> {
        match self {
            Self::DaxBubble(DaxBubbleCta::DaxIntro) => Some("i"),
            Self::DaxBubble(DaxBubbleCta::DaxEnd) => Some("e"),
            Self::DaxDialog(DaxDialogCta::Serp) => Some("s"),
            Self::DaxDialog(DaxDialogCta::NoSerp) => Some("o"),
            Self::DaxDialog(DaxDialogCta::MainNetwork { .. }) => Some("n"),
            Self::DaxDialog(DaxDialogCta::TrackersBlocked { .. }) => Some("t"),
            _ => None,
        }
    }

    pub fn shown_pixel(&self) -> Option<PixelName> {
        Some(match self {
            Self::DaxBubble(_) | Self::DaxDialog(_) => PixelName::DaxCtaShown,
            Self::HomePanel(HomePanelCta::AddWidgetAuto) => PixelName::WidgetCtaShown,
            Self::HomePanel(HomePanelCta::AddWidgetInstructions) => PixelName::WidgetLegacyCtaShown,
            Self::HomePanel(HomePanelCta::Survey(_)) => PixelName::SurveyCtaShown,
            Self::HomeTopPanel(HomeTopPanelCta::Covid) => PixelName::CovidCtaShown,
        })
    }

    pub fn ok_pixel(&self) -> Option<PixelName> {
        match self {
            Self::DaxBubble(_) => None,
            Self::DaxDialog(_) => Some(PixelName::DaxCtaOkButton),
            Self::HomePanel(HomePanelCta::AddWidgetAuto) => Some(PixelName::WidgetCtaLaunched),
            Self::HomePanel(HomePanelCta::AddWidgetInstructions) => {
                Some(PixelName::WidgetLegacyCtaLaunched)
            }
            Self::HomePanel(HomePanelCta::Survey(_)) => Some(PixelName::SurveyCtaLaunched),
            Self::HomeTopPanel(HomeTopPanelCta::Covid) => Some(PixelName::CovidCtaLaunched),
        }
    }

    pub fn cancel_pixel(&self) -> Option<PixelName> {
        match self {
            Self::DaxBubble(_) | Self::DaxDialog(_) => None,
            Self::HomePanel(HomePanelCta::AddWidgetAuto) => Some(PixelName::WidgetCtaDismissed),
            Self::HomePanel(HomePanelCta::AddWidgetInstructions) => {
                Some(PixelName::WidgetLegacyCtaDismissed)
            }
            Self::HomePanel(HomePanelCta::Survey(_)) => Some(PixelName::SurveyCtaDismissed),
            Self::HomeTopPanel(HomeTopPanelCta::Covid) => Some(PixelName::CovidCtaDismissed),
        }
    }

    /// Pixel for the secondary button, present only on CTAs that have one.
    pub fn secondary_button_pixel(&self) -> Option<PixelName> {
        match self {
            Self::DaxDialog(_) => Some(PixelName::DaxCtaHideButton),
            _ => None,
        }
    }

    /// Parameters sent with ok, cancel, and secondary pixels.
    pub fn pixel_parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(marker) = self.journey_marker() {
            params.insert(PARAM_CTA.to_string(), marker.to_string());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ctas() -> Vec<Cta> {
        vec![
            Cta::DaxBubble(DaxBubbleCta::DaxIntro),
            Cta::DaxBubble(DaxBubbleCta::DaxEnd),
            Cta::DaxDialog(DaxDialogCta::Serp),
            Cta::DaxDialog(DaxDialogCta::NoSerp),
            Cta::DaxDialog(DaxDialogCta::MainNetwork {
                network: "Facebook".into(),
                host: "facebook.com".into(),
            }),
            Cta::DaxDialog(DaxDialogCta::TrackersBlocked {
                trackers: vec!["Minor".into()],
                host: "example.com".into(),
            }),
            Cta::HomePanel(HomePanelCta::AddWidgetAuto),
            Cta::HomePanel(HomePanelCta::AddWidgetInstructions),
            Cta::HomePanel(HomePanelCta::Survey(Survey::scheduled(
                "s1",
                "https://survey.example.com",
                None,
            ))),
            Cta::HomeTopPanel(HomeTopPanelCta::Covid),
        ]
    }

    #[test]
    fn cta_id_str_round_trip() {
        for id in CtaId::ALL {
            assert_eq!(id.as_str().parse::<CtaId>().unwrap(), id);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
        assert!("DAX_OUTRO".parse::<CtaId>().is_err());
    }

    #[test]
    fn dax_ctas_have_markers_and_others_do_not() {
        for cta in all_ctas() {
            let is_dax = matches!(cta, Cta::DaxBubble(_) | Cta::DaxDialog(_));
            assert_eq!(is_dax, cta.journey_marker().is_some(), "{cta:?}");
        }
    }

    #[test]
    fn only_dax_dialogs_have_secondary_button() {
        for cta in all_ctas() {
            let expected = matches!(cta, Cta::DaxDialog(_));
            assert_eq!(cta.secondary_button_pixel().is_some(), expected, "{cta:?}");
        }
    }

    #[test]
    fn every_cta_has_a_shown_pixel() {
        assert!(all_ctas().iter().all(|c| c.shown_pixel().is_some()));
    }

    #[test]
    fn widget_variants_share_an_id() {
        assert_eq!(Cta::HomePanel(HomePanelCta::AddWidgetAuto).id(), CtaId::AddWidget);
        assert_eq!(
            Cta::HomePanel(HomePanelCta::AddWidgetInstructions).id(),
            CtaId::AddWidget
        );
    }

    #[test]
    fn cta_json_shape() {
        let cta = Cta::DaxDialog(DaxDialogCta::MainNetwork {
            network: "Google".into(),
            host: "example.com".into(),
        });
        let json = serde_json::to_value(&cta).unwrap();
        assert_eq!(json["category"], "dax_dialog");
        assert_eq!(json["cta"]["type"], "main_network");
        assert_eq!(json["cta"]["network"], "Google");

        let parsed: Cta = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, cta);
    }

    #[test]
    fn survey_cta_json_carries_survey() {
        let json = serde_json::json!({
            "category": "home_panel",
            "cta": {"type": "survey", "id": "s9", "status": "SCHEDULED"}
        });
        let cta: Cta = serde_json::from_value(json).unwrap();
        assert_eq!(cta.survey().map(|s| s.id.as_str()), Some("s9"));
        assert_eq!(cta.id(), CtaId::Survey);
    }

    #[test]
    fn trackers_blocked_message_variants() {
        let msg = |trackers: &[&str]| {
            DaxDialogCta::TrackersBlocked {
                trackers: trackers.iter().map(|t| t.to_string()).collect(),
                host: "example.com".into(),
            }
            .message()
        };
        assert!(msg(&[]).contains("example.com"));
        assert!(msg(&["Google"]).starts_with("Google was"));
        assert!(msg(&["Google", "Amazon"]).starts_with("Google and Amazon were"));
        assert!(msg(&["Google", "Amazon", "A", "B"]).contains("and 2 more"));
    }

    #[test]
    fn main_network_message_names_network_and_host() {
        let text = DaxDialogCta::MainNetwork {
            network: "Facebook".into(),
            host: "news.example.com".into(),
        }
        .message();
        assert!(text.contains("Facebook"));
        assert!(text.contains("news.example.com"));
    }

    #[test]
    fn dax_pixel_parameters_carry_marker() {
        let params = Cta::DaxDialog(DaxDialogCta::Serp).pixel_parameters();
        assert_eq!(params.get(PARAM_CTA).map(String::as_str), Some("s"));
        assert!(Cta::HomeTopPanel(HomeTopPanelCta::Covid).pixel_parameters().is_empty());
    }
}
