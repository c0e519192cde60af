//! App stage state machine — coarse onboarding progress.

use serde::{Deserialize, Serialize};

/// The stages a user moves through.
///
/// Progresses linearly: New → DaxOnboarding → Established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStage {
    New,
    DaxOnboarding,
    Established,
}

impl AppStage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: AppStage) -> bool {
        use AppStage::*;
        matches!(
            (self, target),
            (New, DaxOnboarding) | (DaxOnboarding, Established)
        )
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<AppStage> {
        use AppStage::*;
        match self {
            New => Some(DaxOnboarding),
            DaxOnboarding => Some(Established),
            Established => None,
        }
    }

    /// Whether this stage comes after Dax onboarding.
    pub fn is_past_dax_onboarding(&self) -> bool {
        matches!(self, Self::Established)
    }

    /// Stage that results from completing `completed` while in `self`.
    ///
    /// Completing a stage other than the current one is a no-op, so repeated
    /// completion calls never skip ahead or regress.
    pub fn after_completing(self, completed: AppStage) -> AppStage {
        if self != completed {
            return self;
        }
        match self.next() {
            Some(next) if self.can_transition_to(next) => next,
            _ => self,
        }
    }
}

impl Default for AppStage {
    fn default() -> Self {
        Self::New
    }
}

impl std::fmt::Display for AppStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::DaxOnboarding => "DAX_ONBOARDING",
            Self::Established => "ESTABLISHED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AppStage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "DAX_ONBOARDING" => Ok(Self::DaxOnboarding),
            "ESTABLISHED" => Ok(Self::Established),
            _ => Err(format!("Unknown app stage: {}", s)),
        }
    }
}
