//! Onboarding dialog journey — a compact history of which Dax CTAs fired
//! their shown pixel, and on which install day.
//!
//! Format: `marker:days` pairs joined by `-`, e.g. `i:0-s:1-t:1`.

/// Whether the shown pixel for `marker` has not been sent yet.
pub fn can_send_shown_pixel(journey: Option<&str>, marker: &str) -> bool {
    !entries(journey).any(|entry| entry.split(':').next().unwrap_or_default() == marker)
}

/// Journey with `marker` appended, days capped at `max_days`.
pub fn append(journey: Option<&str>, marker: &str, days_installed: i64, max_days: i64) -> String {
    let days = days_installed.min(max_days).max(0);
    let mut parts: Vec<String> = entries(journey).map(str::to_string).collect();
    parts.push(format!("{marker}:{days}"));
    parts.join("-")
}

fn entries(journey: Option<&str>) -> impl Iterator<Item = &str> {
    journey
        .unwrap_or_default()
        .split('-')
        .filter(|entry| !entry.is_empty())
}
