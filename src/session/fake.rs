//! In-memory router UI used by the tests.
//!
//! [`FakeRouter`] models the screens of the router's web UI closely enough
//! for the workflow to run against it: the first-run wizard, the login
//! screen (with wrong passwords and the takeover dialog), the busy overlay,
//! dropdowns, switches and checkboxes. Every click, fill and navigation is
//! recorded for assertions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use super::{Session, SessionError, SessionProvider};
use crate::workflow::widgets::{MASK, SCROLL_SELECTOR_INTO_VIEW, SCROLL_XPATH_INTO_VIEW, SWITCH_IS_ON};

const QUICK_SETUP_PAGES: u32 = 3;
const OVERLAY_SAMPLES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakePage {
    CreatePassword,
    Login,
    Region,
    QuickSetup,
    /// Wizard pages left before "Advanced" shows up.
    Wizard(u32),
    Home,
    Advanced,
    Blank,
}

#[derive(Debug)]
struct State {
    page: FakePage,
    device_password: Option<String>,
    require_confirmation: bool,
    confirm_pending: bool,
    hardware_version: String,
    radio_features: bool,
    fields: HashMap<String, String>,
    on: HashSet<String>,
    selected: HashMap<String, String>,
    forced_visible: HashSet<String>,
    mask_remaining: u32,
    reset_dialog: bool,
    reset: bool,
    navigation_failures: VecDeque<SessionError>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    login_attempts: Vec<String>,
    closed: u32,
}

/// Cloning shares the same simulated device.
#[derive(Debug, Clone)]
pub struct FakeRouter {
    state: Arc<Mutex<State>>,
}

impl FakeRouter {
    /// A router straight out of the box: no admin password yet.
    pub fn factory_fresh() -> Self {
        Self::with(FakePage::CreatePassword, None)
    }

    /// A router that was set up before with `password`.
    pub fn configured(password: &str) -> Self {
        Self::with(FakePage::Login, Some(password.to_string()))
    }

    fn with(page: FakePage, device_password: Option<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                page,
                device_password,
                require_confirmation: false,
                confirm_pending: false,
                hardware_version: "EX220 v1.0".to_string(),
                radio_features: true,
                fields: HashMap::new(),
                on: HashSet::new(),
                selected: HashMap::new(),
                forced_visible: HashSet::new(),
                mask_remaining: 0,
                reset_dialog: false,
                reset: false,
                navigation_failures: VecDeque::new(),
                navigations: Vec::new(),
                clicks: Vec::new(),
                login_attempts: Vec::new(),
                closed: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_page(&self, page: FakePage) {
        self.lock().page = page;
    }

    pub fn page(&self) -> FakePage {
        self.lock().page
    }

    pub fn set_hardware_version(&self, version: &str) {
        self.lock().hardware_version = version.to_string();
    }

    pub fn set_on(&self, id: &str) {
        self.lock().on.insert(id.to_string());
    }

    pub fn is_on(&self, id: &str) -> bool {
        self.lock().on.contains(id)
    }

    pub fn force_visible(&self, selector: &str) {
        self.lock().forced_visible.insert(selector.to_string());
    }

    pub fn require_login_confirmation(&self) {
        self.lock().require_confirmation = true;
    }

    /// Show the busy overlay for the next `samples` visibility checks.
    pub fn show_mask(&self, samples: u32) {
        self.lock().mask_remaining = samples;
    }

    pub fn mask_visible(&self) -> bool {
        self.lock().mask_remaining > 0
    }

    /// Fail the next navigations with `errors`, in order.
    pub fn fail_navigations(&self, errors: impl IntoIterator<Item = SessionError>) {
        self.lock().navigation_failures.extend(errors);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn login_attempts(&self) -> Vec<String> {
        self.lock().login_attempts.clone()
    }

    pub fn field(&self, selector: &str) -> Option<String> {
        self.lock().fields.get(selector).cloned()
    }

    pub fn selected(&self, dropdown: &str) -> Option<String> {
        self.lock().selected.get(dropdown).cloned()
    }

    pub fn device_password(&self) -> Option<String> {
        self.lock().device_password.clone()
    }

    pub fn set_device_password(&self, password: &str) {
        self.lock().device_password = Some(password.to_string());
    }

    pub fn was_reset(&self) -> bool {
        self.lock().reset
    }

    pub fn close_count(&self) -> u32 {
        self.lock().closed
    }

    fn visible(state: &mut State, selector: &str) -> bool {
        if state.forced_visible.contains(selector) {
            return true;
        }
        if selector == MASK {
            if state.mask_remaining > 0 {
                state.mask_remaining -= 1;
                return true;
            }
            return false;
        }
        let in_settings = matches!(state.page, FakePage::Advanced);
        match selector {
            "#pc-setPwd-new" => state.page == FakePage::CreatePassword,
            "#pc-login-password" => state.page == FakePage::Login,
            "#confirm-yes" => state.confirm_pending,
            "#t_regionNote" => state.page == FakePage::Region,
            "#wan_next" => state.page == FakePage::QuickSetup,
            "#advanced" => matches!(state.page, FakePage::Home | FakePage::Advanced),
            "#enableOfdma" | "#enableTwt" => in_settings && state.radio_features,
            s if s.starts_with(".ml2 ") => in_settings,
            _ => false,
        }
    }

    fn press(state: &mut State, selector: &str) {
        state.clicks.push(selector.to_string());
        match selector {
            "#pc-setPwd-btn" => {
                let new = state.fields.get("#pc-setPwd-new");
                if new.is_some() && new == state.fields.get("#pc-setPwd-confirm") {
                    state.device_password = new.cloned();
                    state.page = FakePage::Region;
                }
            }
            "#pc-login-btn" => {
                let attempt = state
                    .fields
                    .get("#pc-login-password")
                    .cloned()
                    .unwrap_or_default();
                let accepted = state.device_password.as_deref() == Some(attempt.as_str());
                state.login_attempts.push(attempt);
                if accepted {
                    if state.require_confirmation {
                        state.confirm_pending = true;
                    } else {
                        state.page = FakePage::Home;
                    }
                }
            }
            "#confirm-yes" => {
                state.confirm_pending = false;
                state.page = FakePage::Home;
            }
            "#next" => match state.page {
                FakePage::Region => {
                    state.page = FakePage::QuickSetup;
                    state.mask_remaining = OVERLAY_SAMPLES;
                }
                FakePage::Wizard(left) => {
                    state.page = if left <= 1 {
                        FakePage::Home
                    } else {
                        FakePage::Wizard(left - 1)
                    };
                    state.mask_remaining = OVERLAY_SAMPLES;
                }
                _ => {}
            },
            "#wan_next" => {
                state.page = FakePage::Wizard(QUICK_SETUP_PAGES);
                state.mask_remaining = OVERLAY_SAMPLES;
            }
            "#advanced" => state.page = FakePage::Advanced,
            "#saveConnBtn" | "#save" | "#t_save3" | "#t_save4" => {
                state.mask_remaining = OVERLAY_SAMPLES;
            }
            "button#resetBtn" => state.reset_dialog = true,
            s if s.starts_with("label[for=") => {
                let id = s.trim_start_matches("label[for=").trim_end_matches(']');
                if !state.on.remove(id) {
                    state.on.insert(id.to_string());
                }
            }
            s if s.ends_with(" div.button-group-wrap") => {
                let id = s.trim_start_matches('#').trim_end_matches(" div.button-group-wrap");
                if !state.on.remove(id) {
                    state.on.insert(id.to_string());
                }
                state.mask_remaining = OVERLAY_SAMPLES;
            }
            s => {
                if let Some((dropdown, value)) = parse_option(s) {
                    state.selected.insert(dropdown, value);
                }
            }
        }
    }
}

/// Recover `(dropdown id, option)` from an option selector built by the
/// dropdown helpers.
fn parse_option(selector: &str) -> Option<(String, String)> {
    if let Some(rest) = selector.strip_prefix("//*[@id='") {
        let (id, rest) = rest.split_once("']//li[text()=")?;
        let text = rest.strip_suffix(']')?.trim_matches(|c| c == '\'' || c == '"');
        return Some((id.to_string(), text.to_string()));
    }
    let rest = selector.strip_prefix('#')?;
    let (id, rest) = rest.split_once(" li[data-val='")?;
    let value = rest.strip_suffix("']")?;
    Some((id.to_string(), value.to_string()))
}

impl Session for FakeRouter {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), SessionError> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        match state.navigation_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
        Ok(Self::visible(&mut self.lock(), selector))
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, SessionError> {
        Ok(self.lock().on.contains(selector.trim_start_matches('#')))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SessionError> {
        self.lock()
            .fields
            .insert(selector.to_string(), text.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        Self::press(&mut self.lock(), selector);
        Ok(())
    }

    async fn click_role(&self, role: &str, name: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        state.clicks.push(format!("role={role}[name={name}]"));
        if role == "button" && name == "Yes" && state.reset_dialog {
            state.reset_dialog = false;
            state.reset = true;
            state.page = FakePage::Blank;
            return Ok(());
        }
        Err(SessionError::NoSuchElement(format!("{role} {name}")))
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        let arg = args.first().and_then(Value::as_str).unwrap_or_default();
        match script {
            SWITCH_IS_ON => Ok(Value::Bool(self.lock().on.contains(arg))),
            SCROLL_XPATH_INTO_VIEW | SCROLL_SELECTOR_INTO_VIEW => Ok(Value::Null),
            other => Err(SessionError::Command {
                code: "javascript error".to_string(),
                message: format!("unexpected script: {other}"),
            }),
        }
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, SessionError> {
        let state = self.lock();
        Ok(match selector {
            "#confirm-yes" if state.confirm_pending => Some("Log in".to_string()),
            "#bot_hver" => Some(state.hardware_version.clone()),
            _ => None,
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn wait_for_load(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn wait_for_idle(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.lock().closed += 1;
        Ok(())
    }
}

/// Hands out the same [`FakeRouter`] for every job.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    pub router: FakeRouter,
    pub fail_open: bool,
}

impl FakeProvider {
    pub fn new(router: FakeRouter) -> Self {
        Self {
            router,
            fail_open: false,
        }
    }
}

impl SessionProvider for FakeProvider {
    type Session = FakeRouter;

    async fn open(&self) -> Result<FakeRouter, SessionError> {
        if self.fail_open {
            return Err(SessionError::Backend("connection refused".to_string()));
        }
        Ok(self.router.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_selectors_round_trip_through_the_parser() {
        assert_eq!(
            parse_option("//*[@id='_region']//li[text()='United States']"),
            Some(("_region".to_string(), "United States".to_string()))
        );
        assert_eq!(
            parse_option("#_timezone li[data-val='-07:00']"),
            Some(("_timezone".to_string(), "-07:00".to_string()))
        );
        assert_eq!(parse_option("#save"), None);
    }
}
