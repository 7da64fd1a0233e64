use std::time::Duration;

use super::Workflow;
use super::widgets;
use crate::error::ProvisionError;
use crate::session::Session;
use crate::state_machine::Stage;

pub const SECURITY_MODE: &str = "WPA-PSK[TKIP]+WPA2-PSK[AES]";
pub const NARROW_WIDTH: &str = "20MHz";
pub const WIDE_WIDTH: &str = "40MHz";
/// Hardware revisions whose 5 GHz radio gets the wide channel.
pub const WIDE_5G_MARKER: &str = "HX510";

const AFTER_SAVE_DELAY: Duration = Duration::from_secs(1);

/// 5 GHz channel width for the given hardware-version text.
pub fn channel_width_5g(hardware_version: Option<&str>) -> &'static str {
    match hardware_version {
        Some(version) if version.contains(WIDE_5G_MARKER) => WIDE_WIDTH,
        _ => NARROW_WIDTH,
    }
}

impl<S: Session> Workflow<'_, S> {
    pub(super) async fn set_hostname(&self) -> Result<bool, ProvisionError> {
        let request = self
            .request
            .ok_or(ProvisionError::MissingSettings(Stage::Hostname))?;

        self.status.progress("Go to WAN page", 35);
        self.session.click(".ml1 > a[url='ethWan.htm']").await?;
        self.session.click(".ml2 > a[url='ethWan.htm']").await?;
        self.pacer.sleep(AFTER_SAVE_DELAY).await?;

        self.status.progress("Set hostname", 40);
        self.session
            .click("#multiWanBody span.edit-modify-icon")
            .await?;
        self.session.click("#multiWanEdit span.advanced-icon").await?;
        self.session.fill("#hostname", &request.hostname).await?;
        self.session.click("#saveConnBtn").await?;
        widgets::wait_for_overlay(self.session, self.pacer, self.overlay()).await?;
        self.pacer.sleep(AFTER_SAVE_DELAY).await?;

        tracing::info!(hostname = %request.hostname, "hostname set");
        self.status.step("Hostname set");
        Ok(true)
    }

    pub(super) async fn set_wifi(&self) -> Result<bool, ProvisionError> {
        let request = self
            .request
            .ok_or(ProvisionError::MissingSettings(Stage::WiFi))?;
        let overlay = self.overlay();

        self.status.progress("Go to wireless page", 45);
        widgets::open_page(
            self.session,
            self.pacer,
            "wirelessSettings.htm",
            "wirelessSettings.htm",
        )
        .await?;

        if self.session.is_visible("#enableOfdma").await? {
            self.status.progress("Enable OFDMA", 50);
            if widgets::set_switch(self.session, self.pacer, overlay, "enableOfdma", true).await? {
                tracing::info!("OFDMA enabled");
            }
        }
        if self.session.is_visible("#enableTwt").await? {
            self.status.progress("Enable TWT", 60);
            if widgets::set_switch(self.session, self.pacer, overlay, "enableTwt", true).await? {
                tracing::info!("TWT enabled");
            }
        }

        self.status.progress("Set SSID & PSK", 70);
        self.session.fill("#ssid", &request.ssid).await?;
        widgets::select_by_text(self.session, self.pacer, "_sec", SECURITY_MODE).await?;
        self.session.fill("#wpa2PersonalPwd", &request.psk).await?;

        self.status.progress("Set channel width", 75);
        let hardware = self.session.text_content("#bot_hver").await?;
        let width_5g = channel_width_5g(hardware.as_deref());
        tracing::info!(hardware = ?hardware, width_5g, "setting channel width");
        self.session.click("#dynAdvClick").await?;
        widgets::select_by_value(self.session, self.pacer, "_chnwidth_adv_2g", NARROW_WIDTH)
            .await?;
        widgets::select_by_value(self.session, self.pacer, "_chnwidth_adv_5g", width_5g).await?;

        self.session.click("#save").await?;
        widgets::wait_for_overlay(self.session, self.pacer, overlay).await?;
        tracing::info!(ssid = %request.ssid, "wireless configured");
        self.status.step("Wireless set");
        Ok(true)
    }
}
