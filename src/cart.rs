//! Adding an in-stock item to the cart

use crate::config::Timing;
use crate::error::StepError;
use crate::model::Item;
use crate::session::BrowserSession;
use crate::site::SiteProfile;

/// Which signal confirmed the add
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartConfirmation {
    /// The "added to cart" banner appeared
    Banner,
    /// No banner, but the cart badge shows this many items
    CartCount(u32),
}

pub struct CartComposer<'a> {
    session: &'a dyn BrowserSession,
    site: &'a SiteProfile,
    timing: &'a Timing,
}

impl<'a> CartComposer<'a> {
    pub fn new(session: &'a dyn BrowserSession, site: &'a SiteProfile, timing: &'a Timing) -> Self {
        Self {
            session,
            site,
            timing,
        }
    }

    /// Click add-to-cart on `item`'s page. Only call this right after the
    /// item probed in stock.
    pub async fn add_to_cart(&self, item: &Item) -> Result<CartConfirmation, StepError> {
        let t = self.timing;
        tracing::info!(item = %item, "Adding to cart");

        let current = self
            .session
            .current_url()
            .await
            .map_err(StepError::browser("reading the current URL"))?;
        if !current.contains(&item.url) {
            self.session
                .navigate(&item.url)
                .await
                .map_err(StepError::browser("opening the product page"))?;
            self.session
                .wait_for_presence(&self.site.page_ready, t.page_load)
                .await
                .map_err(StepError::waiting("product page", t.page_load))?;
        }

        let button = self
            .session
            .wait_for_clickable(&self.site.add_to_cart, t.add_to_cart)
            .await
            .map_err(StepError::waiting("add-to-cart button", t.add_to_cart))?;
        self.session
            .click(button)
            .await
            .map_err(StepError::browser("clicking add to cart"))?;

        match self
            .session
            .wait_for_presence(&self.site.added_to_cart, t.cart_banner)
            .await
        {
            Ok(_) => {
                tracing::info!(item = %item, "Added to cart");
                return Ok(CartConfirmation::Banner);
            }
            Err(e) => tracing::debug!(error = %e, "no added-to-cart banner, checking cart badge"),
        }

        if let Some(count) = self.cart_count().await {
            tracing::info!(item = %item, count, "Added to cart (cart badge)");
            return Ok(CartConfirmation::CartCount(count));
        }

        tracing::error!(item = %item, "could not confirm the item was added to the cart");
        Err(StepError::Unconfirmed("the item was added to the cart"))
    }

    /// Best-effort read of the cart badge. `None` covers both "no badge" and
    /// "badge says zero".
    async fn cart_count(&self) -> Option<u32> {
        let nodes = self
            .session
            .wait_for_presence(&self.site.cart_count, self.timing.cart_count)
            .await
            .ok()?;
        let text = self.session.text(*nodes.first()?).await.ok()?;
        parse_count(&text).filter(|&n| n > 0)
    }
}

/// Digits of a badge label such as "3" or "3 items"
fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
