// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session acquisition: probe, login, persist.
//!
//! [`SessionManager::acquire`] is the only entry point the pipeline uses.
//! It loads the persisted snapshot, validates it with one GET against the
//! AMS search page, and falls back to the browser login when the probe says
//! the session is gone. A failed probe never raises; a failed login does.

use crate::{SessionError, SessionState, SessionStore};
use async_trait::async_trait;
use drx_core::Broker;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// User agent presented on probe requests, matching the portal adapter.
const PROBE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_5 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Mobile/15E148 Safari/604.1";

/// AMS search page, relative to the portal origin. Reachable only with a
/// live session; anonymous requests are redirected to the login form.
const AMS_PAGE_PATH: &str = "/app/ams/index.jsp";

/// Performs the browser login flow for one broker.
///
/// The production implementation drives Chromium (see the `browser`
/// feature); tests substitute a canned driver.
#[async_trait]
pub trait LoginDriver: Send + Sync {
    /// Log in as `broker` and return the captured session snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::LoginFailed`] when the portal rejects the
    /// credentials or the dashboard never appears, and
    /// [`SessionError::Browser`] for automation-level failures.
    async fn login(&self, broker: &Broker) -> Result<SessionState, SessionError>;
}

/// Process-wide single-slot semaphore around browser logins.
///
/// Two concurrent logins for the same 2FA account can consume each other's
/// TOTP codes; one slot removes the hazard entirely.
fn login_slot() -> &'static Semaphore {
    static SLOT: OnceLock<Semaphore> = OnceLock::new();
    SLOT.get_or_init(|| Semaphore::new(1))
}

/// Owns cookie-jar lifetime for brokers: reuse when the probe passes,
/// fresh login otherwise, persist after login.
pub struct SessionManager<D> {
    store: SessionStore,
    driver: D,
    base_url: String,
    probe_timeout: Duration,
}

impl<D: LoginDriver> SessionManager<D> {
    /// Create a manager over `store`, logging in through `driver` and
    /// probing against `base_url`.
    #[must_use]
    pub fn new(store: SessionStore, driver: D, base_url: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            store,
            driver,
            base_url: base_url.into(),
            probe_timeout,
        }
    }

    /// Produce a valid session for `broker`.
    ///
    /// # Errors
    ///
    /// Propagates login failures; probe failures only ever downgrade to a
    /// fresh login.
    pub async fn acquire(&self, broker: &Broker) -> Result<SessionState, SessionError> {
        if let Some(state) = self.store.load(broker.id) {
            if state.is_expired() {
                info!(target: "drx.session", broker = %broker.name, "snapshot past its expiry hint, logging in fresh");
            } else if self.is_valid(&state).await {
                info!(target: "drx.session", broker = %broker.name, "reusing persisted session");
                return Ok(state);
            } else {
                info!(target: "drx.session", broker = %broker.name, "persisted session rejected by probe");
            }
        }

        let state = {
            let _permit = login_slot()
                .acquire()
                .await
                .map_err(|_| SessionError::Browser("login slot closed".to_string()))?;
            info!(target: "drx.session", broker = %broker.name, "starting portal login");
            self.driver.login(broker).await?
        };

        if let Err(e) = self.store.save(broker.id, &state) {
            // A session that cannot be persisted is still a session.
            warn!(target: "drx.session", broker = %broker.name, error = %e, "failed to persist session snapshot");
        }
        Ok(state)
    }

    /// Probe the AMS page with the snapshot's cookies.
    ///
    /// Valid iff the response looks like the AMS page and not the login
    /// form. Any transport failure reads as invalid.
    pub async fn is_valid(&self, state: &SessionState) -> bool {
        if state.is_empty() {
            return false;
        }
        let client = match reqwest::Client::builder()
            .timeout(self.probe_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(PROBE_USER_AGENT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(target: "drx.session", error = %e, "probe client build failed");
                return false;
            }
        };

        let url = format!("{}{AMS_PAGE_PATH}", self.base_url);
        let response = match client
            .get(&url)
            .header(reqwest::header::COOKIE, state.cookie_header())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "drx.session", error = %e, "session probe request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            return false;
        }
        let final_url = response.url().to_string();
        match response.text().await {
            Ok(body) => probe_verdict(&body, &final_url),
            Err(e) => {
                warn!(target: "drx.session", error = %e, "session probe body read failed");
                false
            }
        }
    }

    /// The underlying snapshot store.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Decide validity from the probed page.
///
/// Login-form anchor (`#lName`) wins over everything; the AMS prefix field
/// (`#pre`) confirms validity; otherwise fall back to a URL sniff.
fn probe_verdict(html: &str, final_url: &str) -> bool {
    let document = Html::parse_document(html);
    let login_anchor = Selector::parse("#lName").expect("static selector");
    let ams_anchor = Selector::parse("#pre").expect("static selector");

    if document.select(&login_anchor).next().is_some() {
        return false;
    }
    if document.select(&ams_anchor).next().is_some() {
        return true;
    }
    let lower = final_url.to_lowercase();
    !(lower.contains("security") || lower.contains("login"))
}
