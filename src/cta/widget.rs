//! Home-screen widget capabilities.

use serde::{Deserialize, Serialize};

/// What the launcher allows for adding the search widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WidgetCapabilities {
    pub supports_standard_widget_add: bool,
    pub supports_automatic_widget_add: bool,
    pub has_installed_widgets: bool,
}

/// Read-only probe of the widget-hosting platform.
pub trait WidgetCapabilityProbe: Send + Sync {
    fn capabilities(&self) -> WidgetCapabilities;
}

/// Probe returning fixed capabilities, configured at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticWidgetCapabilities(pub WidgetCapabilities);

impl WidgetCapabilityProbe for StaticWidgetCapabilities {
    fn capabilities(&self) -> WidgetCapabilities {
        self.0
    }
}
