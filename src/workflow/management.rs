use std::time::Duration;

use super::Workflow;
use super::widgets;
use crate::error::ProvisionError;
use crate::session::Session;

const AFTER_SAVE_DELAY: Duration = Duration::from_secs(1);
const CONFIRM_DELAY: Duration = Duration::from_millis(250);

impl<S: Session> Workflow<'_, S> {
    /// Turn on remote web management and remote ping. Leaves switches that
    /// are already on alone.
    pub(super) async fn set_admin(&self) -> Result<bool, ProvisionError> {
        let overlay = self.overlay();
        self.status.progress("Go to admin", 80);
        widgets::open_page(self.session, self.pacer, "time.htm", "manageCtrl.htm").await?;

        self.status.progress("Set remote access", 90);
        if !self.session.is_checked("#remoteHttpEn").await? {
            tracing::info!("enabling remote HTTP access");
            self.session.click("label[for=remoteHttpEn]").await?;
            self.session.click("#t_save3").await?;
            widgets::wait_for_overlay(self.session, self.pacer, overlay).await?;
            self.pacer.sleep(AFTER_SAVE_DELAY).await?;
        }

        self.status.progress("Set remote ping", 95);
        if !self.session.is_checked("#pingRemote").await? {
            tracing::info!("enabling remote ping");
            self.session.click("label[for=pingRemote]").await?;
            self.session.click("#t_save4").await?;
            widgets::wait_for_overlay(self.session, self.pacer, overlay).await?;
        }
        self.status.step("Admin set");
        Ok(true)
    }

    pub(super) async fn factory_reset(&self) -> Result<bool, ProvisionError> {
        self.status.progress("Go to backup", 85);
        widgets::open_page(self.session, self.pacer, "time.htm", "backNRestore.htm").await?;

        self.status.progress("Factory reset", 95);
        self.session.click("button#resetBtn").await?;
        self.pacer.sleep(CONFIRM_DELAY).await?;
        self.session.click_role("button", "Yes").await?;
        self.pacer.sleep(AFTER_SAVE_DELAY).await?;
        tracing::warn!("factory reset triggered");
        Ok(true)
    }
}
