//! Analytics pixels — event names, payloads, and fire-and-forget sinks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Parameter key carrying the CTA marker or onboarding journey.
pub const PARAM_CTA: &str = "cta";

/// Analytics events fired by the CTA lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelName {
    DaxCtaShown,
    DaxCtaOkButton,
    DaxCtaHideButton,
    DaxAllCtaHidden,
    SurveyCtaShown,
    SurveyCtaLaunched,
    SurveyCtaDismissed,
    WidgetCtaShown,
    WidgetCtaLaunched,
    WidgetCtaDismissed,
    WidgetLegacyCtaShown,
    WidgetLegacyCtaLaunched,
    WidgetLegacyCtaDismissed,
    CovidCtaShown,
    CovidCtaLaunched,
    CovidCtaDismissed,
}

impl PixelName {
    /// Stable wire name of the pixel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DaxCtaShown => "m_odc_s",
            Self::DaxCtaOkButton => "m_odc_ok",
            Self::DaxCtaHideButton => "m_odc_hb",
            Self::DaxAllCtaHidden => "m_odc_h",
            Self::SurveyCtaShown => "mus_cs",
            Self::SurveyCtaLaunched => "mus_cl",
            Self::SurveyCtaDismissed => "mus_cd",
            Self::WidgetCtaShown => "mwc_s",
            Self::WidgetCtaLaunched => "mwc_l",
            Self::WidgetCtaDismissed => "mwc_d",
            Self::WidgetLegacyCtaShown => "mwlc_s",
            Self::WidgetLegacyCtaLaunched => "mwlc_l",
            Self::WidgetLegacyCtaDismissed => "mwlc_d",
            Self::CovidCtaShown => "m_cc_s",
            Self::CovidCtaLaunched => "m_cc_l",
            Self::CovidCtaDismissed => "m_cc_d",
        }
    }
}

impl std::fmt::Display for PixelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelEvent {
    pub name: PixelName,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl PixelEvent {
    pub fn new(name: PixelName) -> Self {
        Self {
            name,
            parameters: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Analytics sink.
///
/// Firing never blocks and never reports failure to the caller; sinks log
/// and drop events they cannot deliver.
pub trait Pixel: Send + Sync {
    fn fire(&self, event: PixelEvent);
}

/// Sink that records every event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPixel;

impl Pixel for TracingPixel {
    fn fire(&self, event: PixelEvent) {
        info!(
            pixel = %event.name,
            parameters = ?event.parameters,
            "Pixel fired"
        );
    }
}

/// Sink that hands events to a bounded channel for an external transport.
#[derive(Debug, Clone)]
pub struct ChannelPixel {
    tx: mpsc::Sender<PixelEvent>,
}

impl ChannelPixel {
    /// Create the sink and the receiving half the transport drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PixelEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Pixel for ChannelPixel {
    fn fire(&self, event: PixelEvent) {
        let name = event.name;
        if let Err(e) = self.tx.try_send(event) {
            warn!(pixel = %name, error = %e, "Dropping pixel");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Pixel sink that keeps every fired event for assertions.
    #[derive(Default)]
    pub struct RecordingPixel {
        events: Mutex<Vec<PixelEvent>>,
    }

    impl RecordingPixel {
        pub fn events(&self) -> Vec<PixelEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn names(&self) -> Vec<PixelName> {
            self.events().into_iter().map(|e| e.name).collect()
        }
    }

    impl Pixel for RecordingPixel {
        fn fire(&self, event: PixelEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
