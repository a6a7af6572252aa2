//! # Storefront Service
//!
//! Visitor-facing operations: quoting a product in the visitor's currency,
//! the country switcher and checkout gateway filtering.
//!
//! ## Quote Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  session / cookie / geo ──► CountryResolver ──► country                 │
//! │                                                   │                     │
//! │                                  CurrencyRegistry ▼                     │
//! │                                               currency                  │
//! │                                                   │                     │
//! │  product_meta ──► ProductPrices ──► PriceResolver ▼                     │
//! │                                               ResolvedPrice             │
//! │                                                   │                     │
//! │                                   DiscountEngine  ▼                     │
//! │                                               Quote                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here converts currencies. Views only read what the batch job or
//! an admin stored.

use tracing::{debug, warn};
use url::Url;

use geoprice_core::selection::{SelectionForm, SelectionOutcome, SelectionRequest};
use geoprice_core::{
    CountryCode, CountryOption, CountrySelection, CurrencyCode, GatewayFilter, Geolocator,
    PricingEngine, Quote, TokenVerifier, VisitorSignals,
};

use crate::config::GeoPriceConfig;
use crate::context::PricingContext;
use crate::error::{ServiceError, ServiceResult};

/// Storefront pricing for one store.
#[derive(Debug, Clone)]
pub struct Storefront {
    ctx: PricingContext,
    selection: CountrySelection,
    gateways: GatewayFilter,
}

impl Storefront {
    pub fn new(ctx: PricingContext, home: Url, gateways: GatewayFilter) -> Self {
        Storefront {
            ctx,
            selection: CountrySelection::new(home),
            gateways,
        }
    }

    pub fn from_config(ctx: PricingContext, config: &GeoPriceConfig) -> ServiceResult<Self> {
        Ok(Storefront::new(ctx, config.home_url()?, config.gateway_filter()))
    }

    /// Engine built from the current settings.
    ///
    /// Hosts pricing many products in one request should build it once and
    /// use [`PricingEngine::visitor`] directly.
    pub async fn engine(&self) -> ServiceResult<PricingEngine> {
        self.ctx.engine().await
    }

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Quotes a product for a visitor in a known country.
    pub async fn quote(
        &self,
        product_id: &str,
        country: &CountryCode,
        host_purchasable: bool,
    ) -> ServiceResult<Quote> {
        let engine = self.ctx.engine().await?;
        let product = self
            .ctx
            .db()
            .products()
            .load_prices(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.to_string()))?;

        let quote = engine.quote(&product, country, host_purchasable);
        debug!(
            product_id,
            country = %quote.country,
            currency = %quote.currency,
            purchasable = quote.purchasable,
            "Quoted product"
        );
        Ok(quote)
    }

    /// Resolves the visitor's country, then quotes.
    pub async fn quote_for_visitor(
        &self,
        product_id: &str,
        signals: &VisitorSignals,
        geo: &(dyn Geolocator + Sync),
        host_purchasable: bool,
    ) -> ServiceResult<Quote> {
        let country = self.ctx.engine().await?.visitor_country(signals, geo);
        self.quote(product_id, &country, host_purchasable).await
    }

    /// Countries offered by the switcher.
    pub async fn countries(&self) -> ServiceResult<Vec<CountryOption>> {
        Ok(self.ctx.engine().await?.supported_countries())
    }

    // =========================================================================
    // Country Switcher
    // =========================================================================

    /// Handles a switcher submission.
    ///
    /// `None` means the token was rejected or the country was blank; the
    /// host must then leave session, cookie and response untouched.
    pub fn select_country(
        &self,
        form: &SelectionForm,
        verifier: &dyn TokenVerifier,
        request: &SelectionRequest,
    ) -> Option<SelectionOutcome> {
        let outcome = self.selection.handle(form, verifier, request);
        match &outcome {
            Some(o) => debug!(country = %o.country, redirect = %o.redirect_to, "Country selected"),
            None => warn!("Country selection ignored: bad token or blank country"),
        }
        outcome
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Filters the host's gateway list for a visitor.
    pub fn available_gateways<'a, I>(
        &self,
        gateway_ids: I,
        country: &CountryCode,
        currency: &CurrencyCode,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.gateways.filter(gateway_ids, country, currency)
    }
}

// =============================================================================
// Tests
// =============================================================================
