//! The Login stage: everything between a cold page load and the "Advanced"
//! configuration area.
//!
//! A factory-fresh router walks through several screens here (create
//! password, region, quick-setup wizard); an already configured one just
//! asks for the password. Each pass of the engine classifies the current
//! screen and handles exactly one of them.

use std::time::Duration;

use super::Workflow;
use super::widgets::{self, OverlayPolling};
use crate::error::ProvisionError;
use crate::session::{Session, SessionError};

pub const REGION: &str = "United States";
pub const TIMEZONE: &str = "-07:00";
/// Label of the confirmation dialog that asks to take over another admin's
/// login.
pub const CONFIRM_LOGIN_LABEL: &str = "Log in";

const AFTER_SUBMIT_DELAY: Duration = Duration::from_millis(250);
const AFTER_ADVANCED_DELAY: Duration = Duration::from_millis(500);

/// Screens recognised while logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPage {
    CreatePassword,
    EnterPassword,
    Region,
    QuickSetup,
    Advanced,
}

/// Marker selectors in priority order; the first visible one decides.
pub const LOGIN_MARKERS: [(&str, LoginPage); 5] = [
    ("#pc-setPwd-new", LoginPage::CreatePassword),
    ("#pc-login-password", LoginPage::EnterPassword),
    ("#t_regionNote", LoginPage::Region),
    ("#wan_next", LoginPage::QuickSetup),
    ("#advanced", LoginPage::Advanced),
];

/// Classify the current screen, or `None` if no marker is visible.
pub async fn classify<S: Session>(session: &S) -> Result<Option<LoginPage>, SessionError> {
    for (marker, page) in LOGIN_MARKERS {
        if session.is_visible(marker).await? {
            return Ok(Some(page));
        }
    }
    Ok(None)
}

impl<S: Session> Workflow<'_, S> {
    pub(super) async fn login(&self) -> Result<bool, ProvisionError> {
        let page = classify(self.session)
            .await?
            .ok_or(ProvisionError::UnrecognizedPage)?;
        tracing::debug!(?page, "login screen");
        match page {
            LoginPage::CreatePassword => self.create_password().await,
            LoginPage::EnterPassword => self.enter_password().await,
            LoginPage::Region => self.set_region().await,
            LoginPage::QuickSetup => self.skip_quick_setup().await,
            LoginPage::Advanced => self.open_advanced().await,
        }
    }

    async fn create_password(&self) -> Result<bool, ProvisionError> {
        self.status.progress("Create password", 5);
        let password = &self.credentials.password;
        self.session.fill("#pc-setPwd-new", password).await?;
        self.session.fill("#pc-setPwd-confirm", password).await?;
        self.session.click("#pc-setPwd-btn").await?;
        tracing::info!("admin password created");
        self.status.step("Password created");
        Ok(false)
    }

    async fn enter_password(&self) -> Result<bool, ProvisionError> {
        self.status.progress("Log in", 10);
        for (index, candidate) in self.credentials.candidates().enumerate() {
            self.session.fill("#pc-login-password", candidate).await?;
            self.session.click("#pc-login-btn").await?;
            self.pacer.settle(self.session).await?;
            self.pacer.sleep(AFTER_SUBMIT_DELAY).await?;

            if self.session.is_visible("#confirm-yes").await?
                && self.session.text_content("#confirm-yes").await?.as_deref()
                    == Some(CONFIRM_LOGIN_LABEL)
            {
                self.session.click("#confirm-yes").await?;
                self.pacer.settle(self.session).await?;
                self.pacer.sleep(AFTER_SUBMIT_DELAY).await?;
            }

            if self.session.is_visible("#pc-login-password").await? {
                tracing::warn!(candidate = index, "password rejected");
            } else {
                tracing::info!(candidate = index, "logged in");
                self.status.step("Logged in");
                return Ok(false);
            }
        }
        Err(ProvisionError::Authentication)
    }

    async fn set_region(&self) -> Result<bool, ProvisionError> {
        self.status.progress("Set region", 15);
        widgets::select_by_text(self.session, self.pacer, "_region", REGION).await?;
        widgets::select_by_value(self.session, self.pacer, "_timezone", TIMEZONE).await?;
        self.session.click("#next").await?;
        widgets::wait_for_overlay(self.session, self.pacer, self.overlay()).await?;
        self.status.step("Region set");
        Ok(false)
    }

    async fn skip_quick_setup(&self) -> Result<bool, ProvisionError> {
        let overlay: OverlayPolling = self.overlay();
        self.status.progress("Skip quick setup", 20);
        self.session.click("#wan_next").await?;
        widgets::wait_for_overlay(self.session, self.pacer, overlay).await?;

        let mut percent = 21;
        while self.session.is_hidden("#advanced").await? {
            self.status.progress("Skip quick setup", percent.min(29));
            percent += 1;
            self.session.click("#next").await?;
            widgets::wait_for_overlay(self.session, self.pacer, overlay).await?;
        }
        tracing::info!("quick setup skipped");
        self.status.progress("Quick setup successful", 30);
        self.session.click("#advanced").await?;
        self.pacer.sleep(AFTER_ADVANCED_DELAY).await?;
        Ok(true)
    }

    async fn open_advanced(&self) -> Result<bool, ProvisionError> {
        self.status.progress("Click advanced", 30);
        self.session.click("#advanced").await?;
        self.pacer.sleep(AFTER_ADVANCED_DELAY).await?;
        Ok(true)
    }
}
