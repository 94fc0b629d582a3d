//! Stock probing

use crate::config::Timing;
use crate::error::Result;
use crate::human;
use crate::model::{Item, UnknownCause, Verdict};
use crate::session::BrowserSession;
use crate::site::SiteProfile;

/// Classifies one product page at a time
pub struct StockProber<'a> {
    session: &'a dyn BrowserSession,
    site: &'a SiteProfile,
    timing: &'a Timing,
}

impl<'a> StockProber<'a> {
    pub fn new(session: &'a dyn BrowserSession, site: &'a SiteProfile, timing: &'a Timing) -> Self {
        Self {
            session,
            site,
            timing,
        }
    }

    /// Load the item's page and classify it. Never fails: anything that goes
    /// wrong becomes [`Verdict::Unknown`].
    pub async fn probe(&self, item: &Item) -> Verdict {
        let verdict = match self.classify(item).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(item = %item, error = %e, "stock check failed");
                Verdict::Unknown(UnknownCause::Lookup(e.to_string()))
            }
        };

        match verdict {
            Verdict::InStock => tracing::info!(item = %item, "IN STOCK"),
            ref other => tracing::info!(item = %item, verdict = %other, "not available"),
        }
        verdict
    }

    async fn classify(&self, item: &Item) -> Result<Verdict> {
        tracing::debug!(item = %item, url = %item.url, "checking stock");
        self.session.navigate(&item.url).await?;

        match self
            .session
            .wait_for_presence(&self.site.page_ready, self.timing.page_load)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_timeout() => {
                tracing::warn!(item = %item, "page did not load in {:?}", self.timing.page_load);
                return Ok(Verdict::Unknown(UnknownCause::PageLoadTimeout));
            }
            Err(e) => return Err(e),
        }

        human::pause(self.timing.probe_pause.clone()).await;

        // Out-of-stock wins over a visible add-to-cart button
        if !self.session.find_all(&self.site.out_of_stock).await?.is_empty() {
            return Ok(Verdict::OutOfStock);
        }

        match self
            .session
            .wait_for_presence(&self.site.add_to_cart, self.timing.stock_marker)
            .await
        {
            Ok(_) => Ok(Verdict::InStock),
            Err(e) if e.is_timeout() => Ok(Verdict::Unknown(UnknownCause::NoMarker)),
            Err(e) => Err(e),
        }
    }
}
