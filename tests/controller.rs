//! End-to-end runs of the restock loop against the scripted browser

mod common;

use std::time::Duration;

use common::*;
use restock::{
    AbortReason, Config, Credentials, Disposition, Item, RestockController, RetentionPolicy,
    SiteProfile, State,
};

fn config(items: Vec<Item>) -> Config {
    Config {
        credentials: Some(Credentials::new("ash@example.com", "pikachu")),
        items,
        ..Config::default()
    }
}

#[tokio::test(start_paused = true)]
async fn acts_on_the_first_in_stock_item_only() {
    let site = SiteProfile::target();
    let (a, b, c) = (item(1), item(2), item(3));
    let session = store(&site)
        .page(&a.url, out_of_stock_page(&site))
        .page(&b.url, in_stock_page(&site))
        .page(&c.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![a.clone(), b.clone(), c.clone()]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Done);
    assert_eq!(report.passes, 1);
    assert!(!report.interrupted);

    let visited = session.navigations();
    assert!(visited.contains(&a.url));
    assert!(visited.contains(&b.url));
    assert!(!visited.contains(&c.url), "C must not be probed once B is in stock");

    assert_eq!(session.clicks_on(&site.add_to_cart), vec![b.url.clone()]);
    assert_eq!(
        notifier.subjects(),
        vec![
            "In stock: Item 2".to_string(),
            "Ready to place order: Item 2".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn place_order_is_never_clicked() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Done);
    assert_eq!(session.clicks_on(&site.checkout_button).len(), 1);
    assert!(session.clicks_on(&site.place_order).is_empty());
}

#[tokio::test(start_paused = true)]
async fn finished_run_closes_the_browser_once() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.disposition, Disposition::Close);
    assert_eq!(session.close_count(), 1);
    assert!(!session.left_open());
}

#[tokio::test(start_paused = true)]
async fn review_hold_runs_before_the_run_finishes() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target]);

    let started = tokio::time::Instant::now();
    RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert!(started.elapsed() >= config.timing.review_hold);
}

#[tokio::test(start_paused = true)]
async fn never_carts_without_an_in_stock_verdict() {
    let site = SiteProfile::target();
    let (a, b) = (item(1), item(2));
    // B reads as unknown, unknown, then out of stock despite a live button,
    // and is only really in stock on the fourth visit
    let session = store(&site)
        .page(&a.url, out_of_stock_page(&site))
        .pages(
            &b.url,
            vec![
                FakePage::new(),
                FakePage::blank(),
                out_of_stock_page(&site).with(El::new(&site.add_to_cart)),
                in_stock_page(&site),
            ],
        );
    let notifier = RecordingNotifier::default();
    let config = config(vec![a, b.clone()]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Done);
    assert_eq!(report.passes, 4);
    assert_eq!(session.clicks_on(&site.add_to_cart), vec![b.url.clone()]);

    // The single cart click follows the fourth probe of B
    let log = session.log();
    let click_at = log
        .iter()
        .position(|a| matches!(a, Action::Click { selector, .. } if *selector == site.add_to_cart))
        .unwrap();
    let last_nav_before = log[..click_at]
        .iter()
        .rev()
        .find_map(|a| match a {
            Action::Navigate(url) => Some(url.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_nav_before, b.url);
    assert_eq!(
        session.navigations().iter().filter(|u| **u == b.url).count(),
        4
    );
}

#[tokio::test(start_paused = true)]
async fn retries_reset_after_an_empty_pass_and_abort_exactly_at_max() {
    let site = SiteProfile::target();
    let target = item(1);
    let broken = broken_cart_page(&site);
    let session = store(&site).pages(
        &target.url,
        vec![
            broken.clone(),
            broken.clone(),
            out_of_stock_page(&site),
            broken.clone(),
            broken.clone(),
            broken,
        ],
    );
    let notifier = RecordingNotifier::default();
    let config = Config {
        max_retries: 3,
        ..config(vec![target.clone()])
    };

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Aborted(AbortReason::RetriesExhausted));
    assert_eq!(report.retry_count, 3);
    assert_eq!(report.passes, 6);
    assert_eq!(session.clicks_on(&site.add_to_cart).len(), 5);

    let failures = notifier
        .subjects()
        .into_iter()
        .filter(|s| s.starts_with("Add to cart failed"))
        .count();
    assert_eq!(failures, 5);
    assert_eq!(report.disposition, Disposition::Close);
    assert_eq!(session.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn checkout_failure_counts_as_a_retry() {
    let site = SiteProfile::target();
    let target = item(1);
    // Cart page without a check-out button
    let session = store(&site)
        .page(&site.cart_url, FakePage::new().with(El::new(&site.cart_ready)))
        .page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = Config {
        max_retries: 2,
        ..config(vec![target])
    };

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Aborted(AbortReason::RetriesExhausted));
    assert_eq!(report.retry_count, 2);
    assert_eq!(
        notifier
            .subjects()
            .iter()
            .filter(|s| s.starts_with("Checkout failed"))
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn login_failure_aborts_before_polling() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = FakeSession::new()
        .page(&site.account_url, rejecting_login_page(&site))
        .page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target.clone()]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Aborted(AbortReason::LoginFailed));
    assert_eq!(report.passes, 0);
    assert!(!session.navigations().contains(&target.url));
    assert!(notifier.subjects().is_empty());
    assert_eq!(session.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_abort_as_login_failure() {
    let site = SiteProfile::target();
    let session = store(&site);
    let notifier = RecordingNotifier::default();
    let config = Config {
        credentials: None,
        ..config(vec![item(1)])
    };

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Aborted(AbortReason::LoginFailed));
    assert!(session.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_item_list_aborts_without_touching_the_browser() {
    let site = SiteProfile::target();
    let session = store(&site);
    let notifier = RecordingNotifier::default();
    let config = config(Vec::new());

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run()
        .await;

    assert_eq!(report.state, State::Aborted(AbortReason::NoItems));
    assert!(session.navigations().is_empty());
    assert_eq!(session.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupt_while_polling_releases_the_browser_once() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, out_of_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run_until(tokio::time::sleep(Duration::from_secs(150)))
        .await;

    assert!(report.interrupted);
    assert_eq!(report.state, State::Polling);
    assert!(report.passes >= 2);
    assert_eq!(report.disposition, Disposition::Close);
    assert_eq!(session.close_count(), 1);
    assert!(!session.left_open());
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_review_hold_leaves_the_window_open() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = config(vec![target.clone()]);

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run_until(tokio::time::sleep(Duration::from_secs(300)))
        .await;

    assert!(report.interrupted);
    assert_eq!(report.state, State::Acting(target));
    assert_eq!(report.disposition, Disposition::KeepOpen);
    assert!(session.left_open());
    assert_eq!(session.close_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn always_close_policy_closes_even_mid_purchase() {
    let site = SiteProfile::target();
    let target = item(1);
    let session = store(&site).page(&target.url, in_stock_page(&site));
    let notifier = RecordingNotifier::default();
    let config = Config {
        retention: RetentionPolicy::AlwaysClose,
        ..config(vec![target])
    };

    let report = RestockController::new(&config, &site, &session, &notifier)
        .run_until(tokio::time::sleep(Duration::from_secs(300)))
        .await;

    assert!(report.interrupted);
    assert_eq!(report.disposition, Disposition::Close);
    assert!(!session.left_open());
    assert_eq!(session.close_count(), 1);
}
