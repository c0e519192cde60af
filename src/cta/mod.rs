//! CTA engine — picks the one onboarding or engagement prompt to show and
//! records what the user did with it.

pub mod engine;
pub mod lifecycle;
pub mod model;
pub mod pixel;
pub mod routes;
pub mod selector;
pub mod site;
pub mod survey;
pub mod widget;

pub use engine::{CtaDeps, CtaEngine};
pub use model::{
    Cta, CtaId, DaxBubbleCta, DaxDialogCta, DismissedCta, HomePanelCta, HomeTopPanelCta,
};
pub use pixel::{ChannelPixel, Pixel, PixelEvent, PixelName, TracingPixel};
pub use routes::{CtaRouteState, cta_routes};
pub use selector::{CtaSelector, CtaSnapshot};
pub use site::{Site, SiteSignals};
pub use survey::{Survey, SurveyGate, SurveyStatus};
pub use widget::{StaticWidgetCapabilities, WidgetCapabilities, WidgetCapabilityProbe};
