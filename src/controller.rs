//! The restock loop
//!
//! [`Machine`] is the bookkeeping: states, the retry counter and what to do
//! with the browser at the end. It does no I/O. [`RestockController`] runs the
//! probes and purchase steps and feeds their outcomes to the machine.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::auth::{Authenticator, LoginReport};
use crate::cart::CartComposer;
use crate::checkout::CheckoutDriver;
use crate::config::{Config, Credentials, RetentionPolicy};
use crate::error::StepError;
use crate::model::{Item, Notification, Verdict};
use crate::notify::Notify;
use crate::probe::StockProber;
use crate::session::BrowserSession;
use crate::site::SiteProfile;

/// Why a run gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoItems,
    LoginFailed,
    RetriesExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Init,
    Authenticating,
    Polling,
    /// Buying this item
    Acting(Item),
    Done,
    Aborted(AbortReason),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Aborted(_))
    }
}

/// Per-run bookkeeping; starts fresh every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub retry_count: u32,
    pub authenticated: bool,
    pub active_item: Option<Item>,
}

/// Outcomes the controller reports to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started { item_count: usize },
    LoginFinished { ok: bool },
    /// A polling pass ended; carries the first in-stock item, if any
    PassFinished(Option<Item>),
    /// Add-to-cart or checkout failed for the active item
    ActionFailed,
    CheckoutSucceeded,
}

/// What happens to the browser when the run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Close,
    /// Left running so a human can pick up where the run stopped
    KeepOpen,
}

#[derive(Debug, Clone)]
pub struct Machine {
    state: State,
    session: SessionState,
    max_retries: u32,
}

impl Machine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: State::Init,
            session: SessionState::default(),
            max_retries,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Advance on `event`. Events that make no sense in the current state
    /// leave it unchanged.
    pub fn apply(&mut self, event: Event) -> &State {
        let next = match (&self.state, event) {
            (State::Init, Event::Started { item_count }) => {
                self.session = SessionState::default();
                if item_count == 0 {
                    State::Aborted(AbortReason::NoItems)
                } else {
                    State::Authenticating
                }
            }

            (State::Authenticating, Event::LoginFinished { ok: true }) => {
                self.session.authenticated = true;
                State::Polling
            }
            (State::Authenticating, Event::LoginFinished { ok: false }) => {
                State::Aborted(AbortReason::LoginFailed)
            }

            (State::Polling, Event::PassFinished(None)) => {
                self.session.retry_count = 0;
                State::Polling
            }
            (State::Polling, Event::PassFinished(Some(item))) => {
                self.session.active_item = Some(item.clone());
                State::Acting(item)
            }

            (State::Acting(_), Event::ActionFailed) => {
                self.session.retry_count += 1;
                self.session.active_item = None;
                if self.session.retry_count >= self.max_retries {
                    State::Aborted(AbortReason::RetriesExhausted)
                } else {
                    State::Polling
                }
            }
            (State::Acting(_), Event::CheckoutSucceeded) => State::Done,

            (state, event) => {
                tracing::warn!(?state, ?event, "ignoring event");
                state.clone()
            }
        };

        self.state = next;
        &self.state
    }

    /// Keep the browser only if the run stopped mid-purchase with retries left
    pub fn disposition(&self, policy: RetentionPolicy) -> Disposition {
        match (policy, &self.state) {
            (RetentionPolicy::KeepOpenWhenReviewPending, State::Acting(_))
                if self.session.retry_count < self.max_retries =>
            {
                Disposition::KeepOpen
            }
            _ => Disposition::Close,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub state: State,
    pub retry_count: u32,
    /// Polling passes started
    pub passes: u32,
    /// Stopped by the shutdown signal rather than reaching a terminal state
    pub interrupted: bool,
    pub disposition: Disposition,
}

/// Watches the configured items and buys the first one that comes back
pub struct RestockController<'a> {
    config: &'a Config,
    site: &'a SiteProfile,
    session: &'a dyn BrowserSession,
    notifier: &'a dyn Notify,
    machine: Machine,
    passes: u32,
}

impl<'a> RestockController<'a> {
    pub fn new(
        config: &'a Config,
        site: &'a SiteProfile,
        session: &'a dyn BrowserSession,
        notifier: &'a dyn Notify,
    ) -> Self {
        Self {
            config,
            site,
            session,
            notifier,
            machine: Machine::new(config.max_retries),
            passes: 0,
        }
    }

    /// Run until a terminal state or until `shutdown` resolves, then release
    /// the browser according to the retention policy
    pub async fn run_until<F>(mut self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let interrupted = tokio::select! {
            _ = self.drive() => false,
            _ = shutdown => true,
        };
        if interrupted {
            tracing::warn!(state = ?self.machine.state(), "Interrupted, stopping");
        }
        self.finish(interrupted).await
    }

    /// Run to a terminal state
    pub async fn run(self) -> RunReport {
        self.run_until(std::future::pending()).await
    }

    async fn drive(&mut self) {
        let item_count = self.config.items.len();
        if let State::Aborted(_) = self.apply(Event::Started { item_count }) {
            tracing::error!("No items configured, nothing to watch");
            return;
        }

        let ok = self.authenticate().await;
        if let State::Aborted(_) = self.apply(Event::LoginFinished { ok }) {
            tracing::error!("Login failed, cannot purchase without an account");
            return;
        }

        tracing::info!(
            items = item_count,
            interval = self.config.check_interval.as_secs(),
            "Watching for restocks"
        );

        loop {
            match self.machine.state().clone() {
                State::Polling => {
                    let hit = self.poll_pass().await;
                    let found = hit.is_some();
                    self.apply(Event::PassFinished(hit));
                    if !found {
                        let wait = jittered(self.config.check_interval, self.config.timing.interval_jitter);
                        tracing::info!("Nothing in stock, next check in {}s", wait.as_secs());
                        sleep(wait).await;
                    }
                }
                State::Acting(item) => {
                    let event = self.act(&item).await;
                    self.apply(event);
                }
                _ => return,
            }
        }
    }

    fn apply(&mut self, event: Event) -> &State {
        let state = self.machine.apply(event);
        tracing::debug!(?state, "state");
        state
    }

    async fn authenticate(&self) -> bool {
        let Some(credentials) = self.config.credentials.as_ref() else {
            tracing::error!("TARGET_EMAIL and TARGET_PASSWORD are not set");
            return false;
        };
        Authenticator::new(self.session, self.site, &self.config.timing)
            .login(credentials)
            .await
            .is_ok()
    }

    /// Probe every item in order; stop at the first one in stock
    async fn poll_pass(&mut self) -> Option<Item> {
        self.passes += 1;
        tracing::debug!(pass = self.passes, "polling pass");

        let prober = StockProber::new(self.session, self.site, &self.config.timing);
        for item in &self.config.items {
            if prober.probe(item).await.is_actionable() {
                return Some(item.clone());
            }
        }
        None
    }

    async fn act(&self, item: &Item) -> Event {
        let timing = &self.config.timing;
        let max_retries = self.config.max_retries;
        let attempt = self.machine.session().retry_count + 1;

        self.notifier.notify_event(&Notification::in_stock(item)).await;

        let cart = CartComposer::new(self.session, self.site, timing);
        if let Err(e) = cart.add_to_cart(item).await {
            tracing::error!(item = %item, retry_count = attempt, max_retries, error = %e, "add to cart failed");
            self.notifier
                .notify_event(&Notification::cart_failed(item, &e.to_string(), attempt, max_retries))
                .await;
            return Event::ActionFailed;
        }

        let checkout = CheckoutDriver::new(self.session, self.site, timing);
        if let Err(e) = checkout.checkout().await {
            tracing::error!(item = %item, retry_count = attempt, max_retries, error = %e, "checkout failed");
            self.notifier
                .notify_event(&Notification::checkout_failed(item, &e.to_string(), attempt, max_retries))
                .await;
            return Event::ActionFailed;
        }

        self.notifier.notify_event(&Notification::review_ready(item)).await;
        tracing::info!(item = %item, "Checkout reached order review");
        Event::CheckoutSucceeded
    }

    async fn finish(self, interrupted: bool) -> RunReport {
        let disposition = self.machine.disposition(self.config.retention);
        match disposition {
            Disposition::KeepOpen => {
                tracing::warn!("Stopped mid-purchase; leaving the browser open for manual review");
                self.session.leave_open();
            }
            Disposition::Close => {
                if let Err(e) = self.session.close().await {
                    tracing::error!(error = %e, "failed to close the browser");
                }
            }
        }

        let state = self.machine.state().clone();
        match &state {
            State::Done => tracing::info!("Run finished: order is at review"),
            State::Aborted(reason) => tracing::error!(?reason, "Run aborted"),
            other => tracing::info!(state = ?other, "Run stopped"),
        }

        RunReport {
            state,
            retry_count: self.machine.session().retry_count,
            passes: self.passes,
            interrupted,
            disposition,
        }
    }
}

/// `interval` shifted by a uniform offset in `[-jitter, +jitter]`, never negative
pub fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let j = jitter.as_secs_f64();
    let offset = if j > 0.0 {
        rand::thread_rng().gen_range(-j..=j)
    } else {
        0.0
    };
    Duration::from_secs_f64((interval.as_secs_f64() + offset).max(0.0))
}

/// Probe every item once, pausing between items. No login, no purchase.
pub async fn check_once(
    session: &dyn BrowserSession,
    site: &SiteProfile,
    config: &Config,
) -> Vec<(Item, Verdict)> {
    let prober = StockProber::new(session, site, &config.timing);
    let mut results = Vec::with_capacity(config.items.len());

    for (i, item) in config.items.iter().enumerate() {
        if i > 0 {
            sleep(config.timing.check_gap).await;
        }
        let verdict = prober.probe(item).await;
        results.push((item.clone(), verdict));
    }
    results
}

/// How long the login dry run leaves the window up afterwards
pub const LOGIN_HOLD_OK: Duration = Duration::from_secs(10);
pub const LOGIN_HOLD_FAILED: Duration = Duration::from_secs(30);

/// Log in once and keep the window up briefly so the result can be seen
pub async fn login_dry_run(
    session: &dyn BrowserSession,
    site: &SiteProfile,
    config: &Config,
    credentials: &Credentials,
) -> Result<LoginReport, StepError> {
    let result = Authenticator::new(session, site, &config.timing)
        .login(credentials)
        .await;

    let hold = if result.is_ok() {
        LOGIN_HOLD_OK
    } else {
        LOGIN_HOLD_FAILED
    };
    tracing::info!("Keeping the window open for {}s", hold.as_secs());
    sleep(hold).await;

    result
}
