//! Account login

use crate::config::{Credentials, Timing};
use crate::error::StepError;
use crate::human;
use crate::selector::Selector;
use crate::session::{BrowserSession, NodeId};
use crate::site::SiteProfile;

/// What a successful login learned about the account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginReport {
    /// Name shown in the account menu, when the site renders one
    pub account_name: Option<String>,
}

pub struct Authenticator<'a> {
    session: &'a dyn BrowserSession,
    site: &'a SiteProfile,
    timing: &'a Timing,
}

impl<'a> Authenticator<'a> {
    pub fn new(session: &'a dyn BrowserSession, site: &'a SiteProfile, timing: &'a Timing) -> Self {
        Self {
            session,
            site,
            timing,
        }
    }

    /// Sign in and confirm it worked
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginReport, StepError> {
        tracing::info!(email = %credentials.masked_email(), "Logging in");

        match self.submit(credentials).await {
            Ok(report) => {
                match &report.account_name {
                    Some(name) => tracing::info!(account = %name, "Login successful"),
                    None => tracing::info!("Login successful"),
                }
                Ok(report)
            }
            Err(e) => {
                match self.error_text().await {
                    Some(detail) => tracing::error!(error = %e, page_error = %detail, "Login failed"),
                    None => tracing::error!(error = %e, "Login failed"),
                }
                Err(e)
            }
        }
    }

    async fn submit(&self, credentials: &Credentials) -> Result<LoginReport, StepError> {
        let t = self.timing;

        self.session
            .navigate(&self.site.account_url)
            .await
            .map_err(StepError::browser("opening the login page"))?;

        let username = self.field(&self.site.username_field, "login form").await?;
        self.session
            .type_text(username, &credentials.email)
            .await
            .map_err(StepError::browser("entering the email"))?;

        let password = self.field(&self.site.password_field, "password field").await?;
        self.session
            .type_text(password, &credentials.password)
            .await
            .map_err(StepError::browser("entering the password"))?;

        human::pause(t.typing_pause.clone()).await;

        let submit = self
            .session
            .wait_for_clickable(&self.site.login_button, t.login_form)
            .await
            .map_err(StepError::waiting("sign-in button", t.login_form))?;
        self.session
            .click(submit)
            .await
            .map_err(StepError::browser("submitting the login form"))?;

        self.skip_passcode_prompt().await;

        self.session
            .wait_for_presence(&self.site.account_marker, t.login_confirm)
            .await
            .map_err(StepError::waiting("signed-in account marker", t.login_confirm))?;

        Ok(LoginReport {
            account_name: self.first_text(&self.site.account_name).await,
        })
    }

    async fn field(&self, selector: &Selector, what: &'static str) -> Result<NodeId, StepError> {
        let after = self.timing.login_form;
        let nodes = self
            .session
            .wait_for_presence(selector, after)
            .await
            .map_err(StepError::waiting(what, after))?;
        nodes.first().copied().ok_or(StepError::Timeout { what, after })
    }

    /// Dismiss the "set up a passcode" interstitial if it shows up
    async fn skip_passcode_prompt(&self) {
        let prompt = self
            .session
            .wait_for_clickable(&self.site.passcode_skip, self.timing.passcode_prompt)
            .await;
        match prompt {
            Ok(node) => {
                tracing::info!("Skipping passcode setup prompt");
                if let Err(e) = self.session.click(node).await {
                    tracing::warn!(error = %e, "could not dismiss passcode prompt");
                }
            }
            Err(_) => tracing::debug!("no passcode prompt"),
        }
    }

    async fn error_text(&self) -> Option<String> {
        self.first_text(&self.site.login_error).await
    }

    async fn first_text(&self, selector: &Selector) -> Option<String> {
        let nodes = self.session.find_all(selector).await.ok()?;
        let text = self.session.text(*nodes.first()?).await.ok()?;
        Some(text).filter(|t| !t.is_empty())
    }
}
