//! CTA engine — selects the onboarding prompt to show and tracks its lifecycle.

pub mod config;
pub mod cta;
pub mod error;
pub mod onboarding;
pub mod store;
