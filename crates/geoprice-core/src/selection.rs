//! # Country Selection
//!
//! Handles a visitor explicitly picking a country from the storefront switcher.
//!
//! ## Flow
//! ```text
//!   form {country, token}
//!        │
//!        ▼
//!   TokenVerifier::verify ──fail──► None (no state change, no redirect)
//!        │ ok
//!        ▼
//!   SelectionOutcome
//!     ├── session["selected_country"] = CODE
//!     ├── cookie  selected_country=CODE; Max-Age=7d; HttpOnly; [Secure]
//!     └── redirect → referer | request URI | home
//!                    minus "v" and "utm_*" query parameters
//! ```
//!
//! The host performs the actual session write, `Set-Cookie` and redirect.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::resolver::SELECTED_COUNTRY_KEY;
use crate::types::CountryCode;

/// Cookie lifetime for a selection.
pub const SELECTION_COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// Action name the anti-forgery token is bound to.
pub const SELECTION_TOKEN_ACTION: &str = "select_country";

/// Verifies anti-forgery tokens. Supplied by the host.
pub trait TokenVerifier {
    fn verify(&self, token: &str, action: &str) -> bool;
}

impl<F> TokenVerifier for F
where
    F: Fn(&str, &str) -> bool,
{
    fn verify(&self, token: &str, action: &str) -> bool {
        self(token, action)
    }
}

/// Submitted switcher form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionForm {
    pub country: String,
    pub token: String,
}

/// Request facts the redirect depends on.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub secure: bool,
    pub referer: Option<String>,
    pub request_uri: Option<String>,
}

/// Cookie to set on the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
}

impl CookieSpec {
    /// Renders a `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut header = format!(
            "{}={}; Max-Age={}; Path={}",
            self.name, self.value, self.max_age_secs, self.path
        );
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// What the host must do after a verified selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub country: CountryCode,
    pub session_key: String,
    pub cookie: CookieSpec,
    pub redirect_to: String,
}

/// Turns switcher submissions into session/cookie writes and a redirect.
#[derive(Debug, Clone)]
pub struct CountrySelection {
    home: Url,
}

impl CountrySelection {
    pub fn new(home: Url) -> Self {
        CountrySelection { home }
    }

    /// Handles one submission. `None` means "ignore the request".
    pub fn handle(
        &self,
        form: &SelectionForm,
        verifier: &dyn TokenVerifier,
        request: &SelectionRequest,
    ) -> Option<SelectionOutcome> {
        if form.token.is_empty() || !verifier.verify(&form.token, SELECTION_TOKEN_ACTION) {
            return None;
        }
        let country = CountryCode::non_empty(&form.country)?;

        Some(SelectionOutcome {
            session_key: SELECTED_COUNTRY_KEY.to_string(),
            cookie: CookieSpec {
                name: SELECTED_COUNTRY_KEY.to_string(),
                value: country.to_string(),
                max_age_secs: SELECTION_COOKIE_MAX_AGE_SECS,
                path: "/".to_string(),
                http_only: true,
                secure: request.secure,
            },
            redirect_to: self.redirect_target(request),
            country,
        })
    }

    /// Picks where to send the visitor back to.
    ///
    /// Targets on a different host than the store fall back to home.
    pub fn redirect_target(&self, request: &SelectionRequest) -> String {
        let candidate = request
            .referer
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| request.request_uri.as_deref().filter(|r| !r.trim().is_empty()))
            .and_then(|raw| self.home.join(raw.trim()).ok())
            .filter(|url| url.host_str() == self.home.host_str())
            .unwrap_or_else(|| self.home.clone());

        strip_tracking_params(candidate).to_string()
    }
}

/// Removes cache-busting `v` and `utm_*` query parameters.
pub fn strip_tracking_params(mut url: Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "v" && !key.starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> CountrySelection {
        CountrySelection::new(Url::parse("https://shop.example/").unwrap())
    }

    fn form(country: &str, token: &str) -> SelectionForm {
        SelectionForm {
            country: country.to_string(),
            token: token.to_string(),
        }
    }

    fn accept_good(token: &str, action: &str) -> bool {
        token == "good" && action == SELECTION_TOKEN_ACTION
    }

    #[test]
    fn test_bad_token_ignored() {
        let outcome = selection().handle(&form("DE", "bad"), &accept_good, &SelectionRequest::default());
        assert!(outcome.is_none());

        let outcome = selection().handle(&form("DE", ""), &accept_good, &SelectionRequest::default());
        assert!(outcome.is_none());
    }

    #[test]
    fn test_selection_outcome() {
        let request = SelectionRequest {
            secure: true,
            referer: Some("https://shop.example/product/mug?v=abc123&color=red&utm_source=x".into()),
            request_uri: None,
        };
        let outcome = selection()
            .handle(&form(" de ", "good"), &accept_good, &request)
            .unwrap();

        assert_eq!(outcome.country.as_str(), "DE");
        assert_eq!(outcome.session_key, "selected_country");
        assert_eq!(outcome.cookie.value, "DE");
        assert_eq!(outcome.cookie.max_age_secs, 604_800);
        assert!(outcome.cookie.http_only);
        assert!(outcome.cookie.secure);
        assert_eq!(outcome.redirect_to, "https://shop.example/product/mug?color=red");
    }

    #[test]
    fn test_redirect_falls_back_to_request_uri_then_home() {
        let s = selection();
        let request = SelectionRequest {
            request_uri: Some("/cart?v=9".into()),
            ..SelectionRequest::default()
        };
        assert_eq!(s.redirect_target(&request), "https://shop.example/cart");
        assert_eq!(s.redirect_target(&SelectionRequest::default()), "https://shop.example/");
    }

    #[test]
    fn test_foreign_referer_goes_home() {
        let request = SelectionRequest {
            referer: Some("https://evil.example/phish".into()),
            ..SelectionRequest::default()
        };
        assert_eq!(selection().redirect_target(&request), "https://shop.example/");
    }

    #[test]
    fn test_cookie_header() {
        let outcome = selection()
            .handle(&form("fr", "good"), &accept_good, &SelectionRequest::default())
            .unwrap();
        assert_eq!(
            outcome.cookie.header_value(),
            "selected_country=FR; Max-Age=604800; Path=/; HttpOnly"
        );
    }
}
