// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared HTTP client: headers, cookies, timeouts, retry.
//!
//! All four flows go through [`PortalClient::post_form`] /
//! [`PortalClient::get`], which apply the portal header discipline (mobile
//! user agent, Origin/Referer, session cookie header), a per-call timeout,
//! and the project retry policy. A connection-level failure marks the inner
//! `reqwest` client for re-creation before the next attempt.

use crate::PortalError;
use drx_config::Timeouts;
use drx_retry::RetryPolicy;
use drx_session::SessionState;
use reqwest::header;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// User agent presented on every portal request.
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_5 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Mobile/15E148 Safari/604.1";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
     image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// A response body together with the URL it finally came from (after
/// redirects) and its content type.
#[derive(Debug)]
pub struct PortalResponse {
    /// Response body bytes.
    pub bytes: Vec<u8>,
    /// Final URL after redirects.
    pub final_url: String,
    /// `Content-Type` header value, empty when absent.
    pub content_type: String,
}

impl PortalResponse {
    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// One authenticated HTTP session against the portal.
pub struct PortalClient {
    base_url: String,
    cookie_header: String,
    timeouts: Timeouts,
    retry: RetryPolicy,
    http: Mutex<reqwest::Client>,
    rebuild_next: AtomicBool,
}

impl PortalClient {
    /// Build a client for `base_url` using the cookies of `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        session: &SessionState,
        timeouts: Timeouts,
        retry: RetryPolicy,
    ) -> Result<Self, PortalError> {
        let client = build_http_client()?;
        Ok(Self {
            base_url: base_url.into(),
            cookie_header: session.cookie_header(),
            timeouts,
            retry,
            http: Mutex::new(client),
            rebuild_next: AtomicBool::new(false),
        })
    }

    /// The portal origin this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-call timeout table.
    #[must_use]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Absolute URL for a portal-relative path (or pass through an already
    /// absolute link).
    #[must_use]
    pub fn absolutize(&self, href: &str) -> String {
        if href.starts_with('/') {
            format!("{}{href}", self.base_url)
        } else {
            href.to_string()
        }
    }

    /// POST a form to `path` and return the response body.
    ///
    /// `referer` is portal-relative. Retries per the project policy; 4xx
    /// statuses and wrong content are terminal.
    ///
    /// # Errors
    ///
    /// Returns the final [`PortalError`] once retries are exhausted.
    pub async fn post_form(
        &self,
        path: &str,
        referer: &str,
        form: &[(String, String)],
        timeout: Duration,
    ) -> Result<PortalResponse, PortalError> {
        let url = format!("{}{path}", self.base_url);
        let referer = format!("{}{referer}", self.base_url);
        self.execute(path, move |client| {
            client
                .post(&url)
                .header(header::REFERER, referer.as_str())
                .form(form)
                .timeout(timeout)
        })
        .await
    }

    /// GET an absolute URL captured from a portal page.
    ///
    /// # Errors
    ///
    /// Returns the final [`PortalError`] once retries are exhausted.
    pub async fn get(
        &self,
        url: &str,
        referer: &str,
        timeout: Duration,
    ) -> Result<PortalResponse, PortalError> {
        let referer = format!("{}{referer}", self.base_url);
        self.execute(url, move |client| {
            client
                .get(url)
                .header(header::REFERER, referer.as_str())
                .timeout(timeout)
        })
        .await
    }

    async fn execute<F>(&self, op: &str, build: F) -> Result<PortalResponse, PortalError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        drx_retry::run_with(&self.retry, op, |attempt| {
            let client = self.current_client(attempt);
            let request = build(&client)
                .header(header::USER_AGENT, USER_AGENT)
                .header(header::ACCEPT, ACCEPT)
                .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(header::ORIGIN, self.base_url.as_str())
                .header(header::COOKIE, self.cookie_header.as_str());
            async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_connect() {
                        self.rebuild_next.store(true, Ordering::SeqCst);
                    }
                    PortalError::Http(e)
                })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PortalError::Status {
                        status: status.as_u16(),
                    });
                }

                let final_url = response.url().to_string();
                let content_type = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let bytes = response.bytes().await.map_err(PortalError::Http)?.to_vec();
                debug!(
                    target: "drx.portal",
                    op,
                    status = status.as_u16(),
                    bytes = bytes.len(),
                    "portal response"
                );
                Ok(PortalResponse {
                    bytes,
                    final_url,
                    content_type,
                })
            }
        })
        .await
    }

    /// Hand out the current client, rebuilding it first when the previous
    /// attempt died at the connection level.
    fn current_client(&self, attempt: u32) -> reqwest::Client {
        let mut guard = self.http.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if attempt > 0 && self.rebuild_next.swap(false, Ordering::SeqCst) {
            match build_http_client() {
                Ok(fresh) => {
                    debug!(target: "drx.portal", "re-created http client after connection error");
                    *guard = fresh;
                }
                Err(e) => {
                    warn!(target: "drx.portal", error = %e, "client rebuild failed, reusing");
                }
            }
        }
        guard.clone()
    }
}

fn build_http_client() -> Result<reqwest::Client, PortalError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(PortalError::Http)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drx_session::state::SessionCookie;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> SessionState {
        SessionState::from_cookies(vec![
            SessionCookie {
                name: "JSESSIONID".into(),
                value: "abc".into(),
                domain: None,
                path: None,
                expires: None,
                http_only: false,
                secure: false,
            },
            SessionCookie {
                name: "portal".into(),
                value: "1".into(),
                domain: None,
                path: None,
                expires: None,
                http_only: false,
                secure: false,
            },
        ])
    }

    fn client_for(server: &MockServer) -> PortalClient {
        PortalClient::new(
            server.uri(),
            &session(),
            Timeouts::default(),
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 4,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn post_form_sends_cookies_and_repeated_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/x.do"))
            .and(header("cookie", "JSESSIONID=abc; portal=1"))
            .and(body_string_contains("headerFields=a"))
            .and(body_string_contains("headerFields=b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let form = vec![
            ("headerFields".to_string(), "a".to_string()),
            ("headerFields".to_string(), "b".to_string()),
        ];
        let response = client
            .post_form("/app/x.do", "/app/x.jsp", &form, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn server_errors_are_retried_to_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/flaky.do"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/app/flaky.do"))
            .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .post_form("/app/flaky.do", "/", &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.text(), "finally");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/forbidden.do"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .post_form("/app/forbidden.do", "/", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Status { status: 403 }));
    }

    #[test]
    fn absolutize_only_touches_relative_paths() {
        let state = session();
        let client = PortalClient::new(
            "https://portal.example",
            &state,
            Timeouts::default(),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(
            client.absolutize("/app/ams/mawbMenu.do?amsMawbId=5"),
            "https://portal.example/app/ams/mawbMenu.do?amsMawbId=5"
        );
        assert_eq!(client.absolutize("https://other/x"), "https://other/x");
    }
}
