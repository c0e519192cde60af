//! Configuration types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::cta::widget::WidgetCapabilities;
use crate::error::ConfigError;

/// Decision-engine tunables.
#[derive(Debug, Clone)]
pub struct CtaConfig {
    /// Host of the search results page; subdomains match too.
    pub serp_domain: String,
    /// Minimum whole days since install before a survey is offered.
    pub survey_min_days_installed: i64,
    /// Cap on the install-day number recorded in the onboarding journey.
    pub journey_max_days: i64,
}

impl Default for CtaConfig {
    fn default() -> Self {
        Self {
            serp_domain: "duckduckgo.com".to_string(),
            survey_min_days_installed: 0,
            journey_max_days: 3,
        }
    }
}

impl CtaConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let survey_min_days_installed = parse_or(
            &lookup,
            "CTA_SURVEY_MIN_DAYS_INSTALLED",
            defaults.survey_min_days_installed,
        )?;
        let journey_max_days =
            parse_or(&lookup, "CTA_JOURNEY_MAX_DAYS", defaults.journey_max_days)?;
        if journey_max_days < 0 {
            return Err(ConfigError::InvalidValue {
                key: "CTA_JOURNEY_MAX_DAYS".to_string(),
                message: format!("must not be negative, got {journey_max_days}"),
            });
        }

        Ok(Self {
            serp_domain: lookup("CTA_SERP_DOMAIN")
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.serp_domain),
            survey_min_days_installed,
            journey_max_days,
        })
    }
}

/// Settings for the `cta-engine` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// libSQL database file; in-memory stores are used when unset.
    pub db_path: Option<PathBuf>,
    pub port: u16,
    /// Install timestamp recorded on first start when the database has none.
    pub installed_at: Option<DateTime<Utc>>,
    pub widgets: WidgetCapabilities,
    /// Pixels buffered for the transport before new ones are dropped.
    pub pixel_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            port: 8080,
            installed_at: None,
            widgets: WidgetCapabilities::default(),
            pixel_buffer: 256,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let installed_at = match lookup("CTA_INSTALLED_AT") {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "CTA_INSTALLED_AT".to_string(),
                        message: e.to_string(),
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let pixel_buffer = parse_or(&lookup, "CTA_PIXEL_BUFFER", defaults.pixel_buffer)?;
        if pixel_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CTA_PIXEL_BUFFER".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            db_path: lookup("CTA_DB_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            port: parse_or(&lookup, "CTA_PORT", defaults.port)?,
            installed_at,
            widgets: WidgetCapabilities {
                supports_standard_widget_add: parse_or(&lookup, "CTA_WIDGET_STANDARD", false)?,
                supports_automatic_widget_add: parse_or(&lookup, "CTA_WIDGET_AUTOMATIC", false)?,
                has_installed_widgets: parse_or(&lookup, "CTA_WIDGET_INSTALLED", false)?,
            },
            pixel_buffer,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
