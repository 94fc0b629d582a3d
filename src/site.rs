//! Where things are on the retailer's site
//!
//! All URLs, selectors and marker texts the flow depends on. These track a
//! live site that changes without notice; when a step starts timing out, this
//! is the first place to look.

use crate::selector::Selector;

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub account_url: String,
    pub cart_url: String,

    /// Present once the base page structure has loaded
    pub page_ready: Selector,
    pub out_of_stock: Selector,
    pub add_to_cart: Selector,

    pub username_field: Selector,
    pub password_field: Selector,
    pub login_button: Selector,
    /// "Set up a passcode?" interstitial shown after some logins
    pub passcode_skip: Selector,
    /// Only rendered for a signed-in account
    pub account_marker: Selector,
    pub account_name: Selector,
    pub login_error: Selector,

    pub added_to_cart: Selector,
    pub cart_count: Selector,

    pub cart_ready: Selector,
    pub checkout_button: Selector,
    pub checkout_page: Selector,
    /// Located at order review but never clicked
    pub place_order: Selector,
}

impl SiteProfile {
    /// Target.com as of this writing
    pub fn target() -> Self {
        Self {
            account_url: "https://www.target.com/account".to_string(),
            cart_url: "https://www.target.com/co-cart".to_string(),

            page_ready: Selector::tag("body"),
            out_of_stock: Selector::text_any(&["Out of stock", "Sold out", "Currently unavailable"]),
            add_to_cart: Selector::button("Add to cart"),

            username_field: Selector::id("username"),
            password_field: Selector::id("password"),
            login_button: Selector::id("login"),
            passcode_skip: Selector::any_of(vec![
                Selector::buttons(&["Maybe later", "maybe later"]),
                Selector::attr_contains("button", "data-test", "maybe-later"),
            ]),
            account_marker: Selector::attr_contains("a", "data-test", "account"),
            account_name: Selector::attr_contains("span", "data-test", "accountName"),
            login_error: Selector::attr_contains("div", "class", "error"),

            added_to_cart: Selector::text_any(&["Added to cart", "Item added to cart"]),
            cart_count: Selector::css(r#"a[data-test="@web/CartLink"] [data-test*="cartItem"]"#),

            cart_ready: Selector::text_any(&["Cart"]),
            checkout_button: Selector::button("Check out"),
            checkout_page: Selector::text_any(&["Shipping", "Delivery"]),
            place_order: Selector::button("Place order"),
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_prompt_is_found_by_label_or_test_id() {
        let site = SiteProfile::target();
        let Selector::AnyOf(parts) = &site.passcode_skip else {
            panic!("expected a union, got {}", site.passcode_skip);
        };
        assert!(parts.contains(&Selector::buttons(&["Maybe later", "maybe later"])));
        assert!(parts.contains(&Selector::attr_contains("button", "data-test", "maybe-later")));
    }
}
