//! Interaction helpers for the router's custom widgets: the busy overlay,
//! `tp-select` dropdowns, on/off switches and the two-level side menu.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::cancel::Pacer;
use crate::config::Timings;
use crate::error::ProvisionError;
use crate::session::Session;

/// The busy overlay the UI shows while it applies settings.
pub const MASK: &str = "div#mask";

pub const SCROLL_XPATH_INTO_VIEW: &str = "document.evaluate(arguments[0], document, null, \
     XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue.scrollIntoView()";
pub const SCROLL_SELECTOR_INTO_VIEW: &str =
    "document.querySelector(arguments[0]).scrollIntoView()";
pub const SWITCH_IS_ON: &str =
    "return document.getElementById(arguments[0]).classList.contains('on')";

const DROPDOWN_OPEN_DELAY: Duration = Duration::from_millis(250);
const DROPDOWN_CLOSE_DELAY: Duration = Duration::from_millis(500);
const MENU_EXPAND_DELAY: Duration = Duration::from_millis(500);
const PAGE_SWITCH_DELAY: Duration = Duration::from_secs(1);

/// Polling schedule for [`wait_for_overlay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPolling {
    pub interval: Duration,
    /// How long to look for the overlay before assuming it was missed.
    pub appear_window: Duration,
    /// Consecutive clear samples required.
    pub clear_checks: u32,
    pub deadline: Duration,
}

impl From<&Timings> for OverlayPolling {
    fn from(timings: &Timings) -> Self {
        Self {
            interval: timings.overlay_poll(),
            appear_window: timings.overlay_appear(),
            clear_checks: timings.overlay_clear_checks,
            deadline: timings.overlay_deadline(),
        }
    }
}

/// Wait for the busy overlay to come and go.
///
/// First waits (up to `appear_window`) for the overlay to show, then until it
/// has been absent for `clear_checks` samples in a row. The whole wait is
/// bounded by `deadline`.
pub async fn wait_for_overlay<S: Session>(
    session: &S,
    pacer: &Pacer,
    polling: OverlayPolling,
) -> Result<(), ProvisionError> {
    let wait = async {
        let appear_by = Instant::now() + polling.appear_window;
        while !session.is_visible(MASK).await? {
            if Instant::now() >= appear_by {
                tracing::trace!("busy overlay never appeared");
                break;
            }
            pacer.sleep(polling.interval).await?;
        }

        let mut clear = 0;
        while clear < polling.clear_checks {
            pacer.sleep(polling.interval).await?;
            if session.is_visible(MASK).await? {
                clear = 0;
            } else {
                clear += 1;
            }
        }
        Ok(())
    };

    match tokio::time::timeout(polling.deadline, wait).await {
        Ok(result) => result,
        Err(_) => Err(ProvisionError::OverlayTimeout {
            waited_ms: u64::try_from(polling.deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Quote `text` as an XPath string literal.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

pub fn dropdown_toggle(id: &str) -> String {
    format!("#{id} > .tp-select")
}

pub fn option_by_text(id: &str, text: &str) -> String {
    format!("//*[@id='{id}']//li[text()={}]", xpath_literal(text))
}

pub fn option_by_value(id: &str, value: &str) -> String {
    format!("#{id} li[data-val='{}']", value.replace('\'', "\\'"))
}

/// Pick the option of dropdown `id` whose visible text is `text`.
pub async fn select_by_text<S: Session>(
    session: &S,
    pacer: &Pacer,
    id: &str,
    text: &str,
) -> Result<(), ProvisionError> {
    let option = option_by_text(id, text);
    pick_option(session, pacer, id, &option, SCROLL_XPATH_INTO_VIEW).await
}

/// Pick the option of dropdown `id` whose `data-val` is `value`.
pub async fn select_by_value<S: Session>(
    session: &S,
    pacer: &Pacer,
    id: &str,
    value: &str,
) -> Result<(), ProvisionError> {
    let option = option_by_value(id, value);
    pick_option(session, pacer, id, &option, SCROLL_SELECTOR_INTO_VIEW).await
}

async fn pick_option<S: Session>(
    session: &S,
    pacer: &Pacer,
    id: &str,
    option: &str,
    scroll_script: &str,
) -> Result<(), ProvisionError> {
    session.click(&dropdown_toggle(id)).await?;
    session
        .evaluate(scroll_script, vec![Value::from(option)])
        .await?;
    pacer.sleep(DROPDOWN_OPEN_DELAY).await?;
    session.click(option).await?;
    pacer.sleep(DROPDOWN_CLOSE_DELAY).await
}

/// Flip switch `id` to `on` if it is not already there. Returns whether it
/// was flipped.
pub async fn set_switch<S: Session>(
    session: &S,
    pacer: &Pacer,
    polling: OverlayPolling,
    id: &str,
    on: bool,
) -> Result<bool, ProvisionError> {
    let current = session
        .evaluate(SWITCH_IS_ON, vec![Value::from(id)])
        .await?
        .as_bool()
        .unwrap_or(false);
    if current == on {
        return Ok(false);
    }
    session
        .click(&format!("#{id} div.button-group-wrap"))
        .await?;
    wait_for_overlay(session, pacer, polling).await?;
    Ok(true)
}

/// Open a page of the side menu. `section` is the first-level entry that
/// reveals `page` when it is collapsed.
pub async fn open_page<S: Session>(
    session: &S,
    pacer: &Pacer,
    section: &str,
    page: &str,
) -> Result<(), ProvisionError> {
    let entry = format!(".ml2 > a[url='{page}']");
    if session.is_hidden(&entry).await? {
        session
            .click(&format!(".ml1 > a[url='{section}']"))
            .await?;
        pacer.sleep(MENU_EXPAND_DELAY).await?;
    }
    session.click(&entry).await?;
    pacer.sleep(PAGE_SWITCH_DELAY).await
}
