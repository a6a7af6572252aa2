//! # Country Resolver
//!
//! Derives the visitor's country from a layered precedence of sources.
//!
//! ## Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Session selection  ──► set by an explicit country pick              │
//! │           │ (absent)                                                    │
//! │           ▼                                                             │
//! │  2. Cookie             ──► same pick, survives ~7 days                  │
//! │           │ (absent)                                                    │
//! │           ▼                                                             │
//! │  3. Geolocation        ──► opaque host source, may return nothing       │
//! │           │ (absent / blank)                                            │
//! │           ▼                                                             │
//! │  4. Store base country                                                  │
//! │           │ (unset)                                                     │
//! │           ▼                                                             │
//! │  5. "US"                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution is a pure read. Writing the session and cookie happens in
//! [`crate::selection`].

use crate::types::CountryCode;

/// Country used when every other source is empty.
pub const FALLBACK_COUNTRY: &str = "US";

/// Session and cookie key holding the visitor's manual selection.
pub const SELECTED_COUNTRY_KEY: &str = "selected_country";

// =============================================================================
// Sources
// =============================================================================

/// IP geolocation source supplied by the host.
///
/// Returning `None` (or a blank code) moves resolution to the next source.
pub trait Geolocator {
    fn locate(&self) -> Option<CountryCode>;
}

/// A geolocator that never knows the country.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

impl Geolocator for NoGeolocation {
    fn locate(&self) -> Option<CountryCode> {
        None
    }
}

impl<F> Geolocator for F
where
    F: Fn() -> Option<CountryCode>,
{
    fn locate(&self) -> Option<CountryCode> {
        self()
    }
}

/// Raw values the host read from the visitor's session and cookies.
#[derive(Debug, Clone, Default)]
pub struct VisitorSignals {
    pub session_country: Option<String>,
    pub cookie_country: Option<String>,
}

impl VisitorSignals {
    /// Signals for a visitor with no stored selection.
    pub fn anonymous() -> Self {
        VisitorSignals::default()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves a visitor's country.
#[derive(Debug, Clone)]
pub struct CountryResolver {
    base_country: Option<CountryCode>,
}

impl CountryResolver {
    /// Creates a resolver for a store. A blank base country is treated as unset.
    pub fn new(base_country: &CountryCode) -> Self {
        CountryResolver {
            base_country: CountryCode::non_empty(base_country.as_str()),
        }
    }

    /// Resolves the visitor's country. Never fails.
    pub fn resolve(&self, signals: &VisitorSignals, geo: &dyn Geolocator) -> CountryCode {
        signals
            .session_country
            .as_deref()
            .and_then(CountryCode::non_empty)
            .or_else(|| {
                signals
                    .cookie_country
                    .as_deref()
                    .and_then(CountryCode::non_empty)
            })
            .or_else(|| {
                geo.locate()
                    .and_then(|code| CountryCode::non_empty(code.as_str()))
            })
            .or_else(|| self.base_country.clone())
            .unwrap_or_else(|| CountryCode::new(FALLBACK_COUNTRY))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
