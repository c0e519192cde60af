//! Surveys offered as home-panel CTAs, and the gate deciding eligibility.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

/// Lifecycle of a survey in the survey store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    Scheduled,
    Cancelled,
    Done,
}

impl std::fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

impl std::str::FromStr for SurveyStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(Self::Scheduled),
            "CANCELLED" => Ok(Self::Cancelled),
            "DONE" => Ok(Self::Done),
            _ => Err(format!("Unknown survey status: {}", s)),
        }
    }
}

/// A survey the backend has made available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_installation: Option<u32>,
    pub status: SurveyStatus,
}

impl Survey {
    /// Create a scheduled survey.
    pub fn scheduled(id: impl Into<String>, url: impl Into<String>, day: Option<u32>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            day_of_installation: day,
            status: SurveyStatus::Scheduled,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == SurveyStatus::Scheduled
    }
}

/// Passes the current survey through to the selector.
///
/// Status and install-age checks happen before a survey reaches the gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurveyGate;

impl SurveyGate {
    pub fn on_survey_changed(&self, survey: Option<Survey>) -> Option<Survey> {
        survey
    }

    /// Adapt a survey store feed into a stream of gated values.
    pub fn watch(
        self,
        feed: watch::Receiver<Option<Survey>>,
    ) -> impl Stream<Item = Option<Survey>> {
        WatchStream::new(feed).map(move |survey| self.on_survey_changed(survey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> Survey {
        Survey::scheduled("abc", "https://survey.example.com/abc", Some(7))
    }

    #[test]
    fn passes_survey_through() {
        let gate = SurveyGate;
        assert_eq!(gate.on_survey_changed(Some(survey())), Some(survey()));
    }

    #[test]
    fn passes_absence_through() {
        assert_eq!(SurveyGate.on_survey_changed(None), None);
    }

    #[test]
    fn gate_does_not_filter_on_status() {
        let done = Survey {
            status: SurveyStatus::Done,
            ..survey()
        };
        assert_eq!(SurveyGate.on_survey_changed(Some(done.clone())), Some(done));
    }

    #[tokio::test]
    async fn watch_yields_current_and_updates() {
        let (tx, rx) = watch::channel(None);
        let stream = SurveyGate.watch(rx);
        tokio::pin!(stream);

        assert_eq!(stream.next().await, Some(None));

        tx.send(Some(survey())).unwrap();
        assert_eq!(stream.next().await, Some(Some(survey())));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [SurveyStatus::Scheduled, SurveyStatus::Cancelled, SurveyStatus::Done] {
            assert_eq!(status.to_string().parse::<SurveyStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<SurveyStatus>().is_err());
    }
}
