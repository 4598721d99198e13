// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chromium-driven portal login.
//!
//! The only portal flow that still needs a real browser: the login form sets
//! its session cookies through JavaScript and the 2FA challenge is rendered
//! client-side. Everything downstream reuses the captured cookies over plain
//! HTTP.

use crate::otp::OtpProvider;
use crate::state::{SessionCookie, SessionState};
use crate::{LoginDriver, SessionError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use drx_core::Broker;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const LOGIN_PATH: &str = "/security/";
const USERNAME_SELECTOR: &str = "#lName";
const PASSWORD_SELECTOR: &str = "#pass";
const LOGIN_SUBMIT_SELECTOR: &str = "input[type=submit]";
const OTP_INPUT_SELECTOR: &str = "#tfa";
const OTP_SUBMIT_SELECTOR: &str = "#tfaForm input[type=submit]";
const DASHBOARD_SELECTOR: &str = "#menuTableBody > tr > td:nth-child(1)";

/// Minimum TOTP validity demanded before submitting the 2FA form.
const MIN_OTP_VALIDITY_SECS: u64 = 5;

/// [`LoginDriver`] backed by a headless Chromium instance.
#[derive(Debug, Clone)]
pub struct ChromiumLoginDriver {
    base_url: String,
    headless: bool,
}

impl ChromiumLoginDriver {
    /// Driver logging in against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headless: true,
        }
    }

    /// Show the browser window. Debugging aid.
    #[must_use]
    pub fn headed(mut self) -> Self {
        self.headless = false;
        self
    }

    async fn run_login(&self, broker: &Broker) -> Result<SessionState, SessionError> {
        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(SessionError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.drive_pages(&browser, broker).await;

        if let Err(e) = browser.close().await {
            warn!(target: "drx.session", error = %e, "browser close failed");
        }
        handler_task.abort();
        result
    }

    async fn drive_pages(
        &self,
        browser: &Browser,
        broker: &Broker,
    ) -> Result<SessionState, SessionError> {
        let url = format!("{}{LOGIN_PATH}", self.base_url);
        info!(target: "drx.session", %url, broker = %broker.name, "opening login page");
        let page = browser.new_page(url).await.map_err(cdp_err)?;
        page.wait_for_navigation().await.map_err(cdp_err)?;

        let username = wait_for_element(&page, USERNAME_SELECTOR, Duration::from_secs(20)).await?;
        username
            .click()
            .await
            .map_err(cdp_err)?
            .type_str(&broker.username)
            .await
            .map_err(cdp_err)?;

        let password = wait_for_element(&page, PASSWORD_SELECTOR, Duration::from_secs(5)).await?;
        password
            .click()
            .await
            .map_err(cdp_err)?
            .type_str(&broker.password)
            .await
            .map_err(cdp_err)?;

        let submit = wait_for_element(&page, LOGIN_SUBMIT_SELECTOR, Duration::from_secs(5)).await?;
        submit.click().await.map_err(cdp_err)?;
        sleep(Duration::from_secs(2)).await;

        if broker.auth_required {
            self.complete_two_factor(&page, broker).await?;
        }

        if wait_for_element(&page, DASHBOARD_SELECTOR, Duration::from_secs(15))
            .await
            .is_err()
        {
            let at = page.url().await.map_err(cdp_err)?.unwrap_or_default();
            return Err(SessionError::LoginFailed {
                reason: format!("dashboard never appeared, stuck at {at}"),
            });
        }
        info!(target: "drx.session", broker = %broker.name, "login confirmed, capturing cookies");

        let cookies = page.get_cookies().await.map_err(cdp_err)?;
        let cookies = cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
                expires: (c.expires > 0.0).then_some(c.expires),
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect();
        Ok(SessionState::from_cookies(cookies))
    }

    async fn complete_two_factor(&self, page: &Page, broker: &Broker) -> Result<(), SessionError> {
        let otp_uri = broker.otp_uri.as_deref().ok_or(SessionError::LoginFailed {
            reason: "broker requires 2FA but has no OTP URI".to_string(),
        })?;

        match wait_for_element(page, OTP_INPUT_SELECTOR, Duration::from_secs(10)).await {
            Ok(input) => {
                let provider = OtpProvider::from_uri(otp_uri)?;
                let code = provider.fresh(MIN_OTP_VALIDITY_SECS).await?;
                debug!(target: "drx.session", "submitting 2FA code");
                input
                    .click()
                    .await
                    .map_err(cdp_err)?
                    .type_str(&code)
                    .await
                    .map_err(cdp_err)?;
                let submit =
                    wait_for_element(page, OTP_SUBMIT_SELECTOR, Duration::from_secs(5)).await?;
                submit.click().await.map_err(cdp_err)?;
                sleep(Duration::from_secs(2)).await;
                Ok(())
            }
            Err(_) => {
                // Some accounts skip the challenge when the device is
                // remembered; accept if we already landed on the dashboard.
                if wait_for_element(page, DASHBOARD_SELECTOR, Duration::from_secs(3))
                    .await
                    .is_ok()
                {
                    debug!(target: "drx.session", "2FA challenge skipped by portal");
                    Ok(())
                } else {
                    Err(SessionError::LoginFailed {
                        reason: "2FA input never became visible".to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl LoginDriver for ChromiumLoginDriver {
    async fn login(&self, broker: &Broker) -> Result<SessionState, SessionError> {
        self.run_login(broker).await
    }
}

/// Poll for a selector until it resolves or the timeout lapses.
///
/// chromiumoxide's `find_element` does not wait, so visibility waits are a
/// polling loop here.
async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            return Err(SessionError::LoginFailed {
                reason: format!("element '{selector}' never appeared"),
            });
        }
        sleep(Duration::from_millis(250)).await;
    }
}

fn cdp_err(e: chromiumoxide::error::CdpError) -> SessionError {
    SessionError::Browser(e.to_string())
}
