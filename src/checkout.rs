//! Driving the cart to the order review screen
//!
//! The flow stops at "Place order". That button is waited for so we know the
//! review screen is up, and nothing here ever clicks it. Submitting the order
//! is left to the person at the keyboard.

use tokio::time::sleep;

use crate::config::Timing;
use crate::error::StepError;
use crate::session::BrowserSession;
use crate::site::SiteProfile;

/// Checkout reached order review; the order has not been placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewReached;

pub struct CheckoutDriver<'a> {
    session: &'a dyn BrowserSession,
    site: &'a SiteProfile,
    timing: &'a Timing,
}

impl<'a> CheckoutDriver<'a> {
    pub fn new(session: &'a dyn BrowserSession, site: &'a SiteProfile, timing: &'a Timing) -> Self {
        Self {
            session,
            site,
            timing,
        }
    }

    /// Go from the cart to order review, then hold the window for a human
    pub async fn checkout(&self) -> Result<ReviewReached, StepError> {
        let t = self.timing;
        tracing::info!("Proceeding to checkout");

        self.session
            .navigate(&self.site.cart_url)
            .await
            .map_err(StepError::browser("opening the cart"))?;
        self.session
            .wait_for_presence(&self.site.cart_ready, t.cart_page)
            .await
            .map_err(StepError::waiting("cart page", t.cart_page))?;

        let checkout = self
            .session
            .wait_for_clickable(&self.site.checkout_button, t.checkout_button)
            .await
            .map_err(StepError::waiting("check-out button", t.checkout_button))?;
        self.session
            .click(checkout)
            .await
            .map_err(StepError::browser("clicking check out"))?;

        self.session
            .wait_for_presence(&self.site.checkout_page, t.checkout_page)
            .await
            .map_err(StepError::waiting("shipping page", t.checkout_page))?;

        // Located only. Never clicked.
        let _place_order = self
            .session
            .wait_for_clickable(&self.site.place_order, t.place_order)
            .await
            .map_err(StepError::waiting("place-order button", t.place_order))?;

        tracing::warn!(
            "Order review reached. The order has NOT been placed; review it and click \"Place order\" yourself"
        );
        tracing::info!("Holding the window for {}s", t.review_hold.as_secs());
        sleep(t.review_hold).await;

        Ok(ReviewReached)
    }
}
