//! Browsed-site description and the privacy signals derived from it.

use serde::{Deserialize, Serialize};
use url::Url;

/// Entities with a prevalence above this are major tracker networks.
pub const MAJOR_NETWORK_PREVALENCE: f64 = 7.0;

/// Connection security of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpsStatus {
    None,
    Mixed,
    #[default]
    Secure,
}

/// Summary of the site's published privacy practices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyPractices {
    Good,
    #[default]
    Unknown,
    Mixed,
    Poor,
}

/// Company owning a site or tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub display_name: String,
    pub prevalence: f64,
}

impl Entity {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, prevalence: f64) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            prevalence,
        }
    }

    pub fn is_major(&self) -> bool {
        self.prevalence > MAJOR_NETWORK_PREVALENCE
    }
}

/// A tracker request observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub tracker_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    pub blocked: bool,
}

impl TrackingEvent {
    fn is_major(&self) -> bool {
        self.entity.as_ref().is_some_and(Entity::is_major)
    }
}

/// Read-only view of the page currently shown in the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub url: String,
    #[serde(default)]
    pub https: HttpsStatus,
    /// Trackers detected by the content blocker, whether or not individual
    /// events were recorded for them.
    #[serde(default)]
    pub tracker_count: u32,
    #[serde(default)]
    pub tracking_events: Vec<TrackingEvent>,
    #[serde(default)]
    pub all_trackers_blocked: bool,
    #[serde(default)]
    pub privacy_practices: PrivacyPractices,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
}

impl Site {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            https: HttpsStatus::default(),
            tracker_count: 0,
            tracking_events: Vec::new(),
            all_trackers_blocked: true,
            privacy_practices: PrivacyPractices::default(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_tracker_count(mut self, count: u32) -> Self {
        self.tracker_count = count;
        self
    }

    /// Record a tracking event; also bumps the tracker count.
    pub fn with_tracking_event(mut self, event: TrackingEvent) -> Self {
        if !event.blocked {
            self.all_trackers_blocked = false;
        }
        self.tracking_events.push(event);
        self.tracker_count += 1;
        self
    }

    pub fn with_https(mut self, https: HttpsStatus) -> Self {
        self.https = https;
        self
    }

    pub fn with_privacy_practices(mut self, practices: PrivacyPractices) -> Self {
        self.privacy_practices = practices;
        self
    }

    /// Host of the site url without a leading `www.`.
    pub fn host(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
    }
}

/// What kind of page the host is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// The search engine results page.
    Serp,
    Other,
    /// The url has no host.
    None,
}

/// Letter grade summarizing the privacy of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrivacyGrade {
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl PrivacyGrade {
    fn from_score(score: u32) -> Self {
        match score {
            0..=1 => Self::A,
            2..=3 => Self::BPlus,
            4..=9 => Self::B,
            10..=13 => Self::CPlus,
            14..=19 => Self::C,
            _ => Self::D,
        }
    }
}

impl std::fmt::Display for PrivacyGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(s)
    }
}

/// Grade as the page stands, and with protections blocking its trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradePair {
    pub current: PrivacyGrade,
    pub improved: PrivacyGrade,
}

impl GradePair {
    fn calculate(site: &Site) -> Self {
        let https_score = match site.https {
            HttpsStatus::Secure => 0,
            HttpsStatus::Mixed => 1,
            HttpsStatus::None => 3,
        };
        let practices_score = match site.privacy_practices {
            PrivacyPractices::Good => 0,
            PrivacyPractices::Unknown => 2,
            PrivacyPractices::Mixed => 3,
            PrivacyPractices::Poor => 5,
        };
        let entity_score = site
            .entity
            .as_ref()
            .map(|e| (e.prevalence.clamp(0.0, 100.0) / 10.0).ceil() as u32)
            .unwrap_or(0);
        let base = https_score + practices_score + entity_score;
        let all = tracker_score(site.tracking_events.iter());
        let unblocked = tracker_score(site.tracking_events.iter().filter(|e| !e.blocked));

        Self {
            current: PrivacyGrade::from_score(base.saturating_add(all)),
            improved: PrivacyGrade::from_score(base.saturating_add(unblocked)),
        }
    }
}

/// Compact privacy summary of a page, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSignals {
    pub host: Option<String>,
    pub kind: SiteKind,
    pub https: HttpsStatus,
    pub tracker_count: u32,
    pub has_tracking_events: bool,
    pub all_trackers_blocked: bool,
    pub major_network_count: usize,
    /// Display name of the first major network seen tracking on the page.
    pub major_network: Option<String>,
    /// Blocked tracker entities, most prevalent first.
    pub blocked_trackers: Vec<String>,
    pub privacy_practices: PrivacyPractices,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    pub grades: GradePair,
}

impl SiteSignals {
    pub fn extract(site: &Site, serp_domain: &str) -> Self {
        let host = site.host();
        let kind = match host.as_deref() {
            None => SiteKind::None,
            Some(h) if is_same_or_subdomain(h, serp_domain) => SiteKind::Serp,
            Some(_) => SiteKind::Other,
        };

        let majors: Vec<&Entity> = site
            .tracking_events
            .iter()
            .filter(|e| e.is_major())
            .filter_map(|e| e.entity.as_ref())
            .collect();

        let mut blocked: Vec<&Entity> = Vec::new();
        for entity in site
            .tracking_events
            .iter()
            .filter(|e| e.blocked)
            .filter_map(|e| e.entity.as_ref())
        {
            if !blocked.iter().any(|b| b.display_name == entity.display_name) {
                blocked.push(entity);
            }
        }
        // Stable sort keeps first-seen order between equal prevalences.
        blocked.sort_by(|a, b| b.prevalence.total_cmp(&a.prevalence));

        Self {
            host,
            kind,
            https: site.https,
            tracker_count: site.tracker_count,
            has_tracking_events: !site.tracking_events.is_empty(),
            all_trackers_blocked: site.all_trackers_blocked,
            major_network_count: majors.len(),
            major_network: majors.first().map(|e| e.display_name.clone()),
            blocked_trackers: blocked.into_iter().map(|e| e.display_name.clone()).collect(),
            privacy_practices: site.privacy_practices,
            entity: site.entity.clone(),
            grades: GradePair::calculate(site),
        }
    }

    pub fn is_serp(&self) -> bool {
        self.kind == SiteKind::Serp
    }
}

fn tracker_score<'a>(events: impl Iterator<Item = &'a TrackingEvent>) -> u32 {
    events.fold(0u32, |score, e| {
        score.saturating_add(if e.is_major() { 10 } else { 1 })
    })
}

fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches("www.");
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
