//! Session handling for the two-cookie login protocol
//!
//! Login yields the long-lived super-secure token (`GDCAuthSST`); exchanging it at the
//! token endpoint yields the short-lived temporary token (`GDCAuthTT`) that resource
//! requests authenticate with. A `Session` is created per call and never shared.

use crate::config::{ClientConfig, TokenMethod};
use crate::error::{GoodDataError, Operation, Result};
use crate::http;
use reqwest::header::COOKIE;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use url::Url;

pub const SST_COOKIE: &str = "GDCAuthSST";
pub const TT_COOKIE: &str = "GDCAuthTT";

const LOGIN_PATH: &str = "/gdc/account/login";
const TOKEN_PATH: &str = "/gdc/account/token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// Logged in, temporary token not yet acquired
    Establishing,
    Authenticated,
}

#[derive(Clone, Default)]
pub struct Session {
    super_secure_token: Option<String>,
    temporary_token: Option<String>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("has_super_secure_token", &self.super_secure_token.is_some())
            .field("has_temporary_token", &self.temporary_token.is_some())
            .finish()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn has_super_secure_token(&self) -> bool {
        self.super_secure_token.is_some()
    }

    pub fn has_temporary_token(&self) -> bool {
        self.temporary_token.is_some()
    }

    /// Store the auth cookies found among `(name, value)` pairs, overwriting held values.
    ///
    /// Names must match exactly; empty values (cookie removal) are ignored.
    pub fn absorb_cookies<I, N, V>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in cookies {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            match name.as_ref() {
                SST_COOKIE => self.super_secure_token = Some(value.to_string()),
                TT_COOKIE => self.temporary_token = Some(value.to_string()),
                _ => {}
            }
        }
    }

    /// `Cookie` header value for the token endpoint
    pub(crate) fn super_secure_cookie(&self) -> Result<String> {
        self.super_secure_token
            .as_deref()
            .map(|v| format!("{}={}", SST_COOKIE, v))
            .ok_or(GoodDataError::MissingSessionCookie(SST_COOKIE))
    }

    /// `Cookie` header value for resource requests
    pub(crate) fn temporary_cookie(&self) -> Result<String> {
        match (&self.state, self.temporary_token.as_deref()) {
            (SessionState::Authenticated, Some(v)) => Ok(format!("{}={}", TT_COOKIE, v)),
            _ => Err(GoodDataError::MissingSessionCookie(TT_COOKIE)),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "postUserLogin")]
    post_user_login: PostUserLogin<'a>,
}

#[derive(Serialize)]
struct PostUserLogin<'a> {
    login: &'a str,
    password: &'a str,
    remember: u8,
}

/// Runs the login and token steps for one client.
pub(crate) struct Authenticator<'a> {
    pub(crate) http: &'a Client,
    pub(crate) config: &'a ClientConfig,
    pub(crate) base: &'a Url,
}

impl<'a> Authenticator<'a> {
    pub(crate) async fn login(&self, session: &mut Session) -> Result<()> {
        let url = http::endpoint(self.base, LOGIN_PATH)?;
        tracing::debug!(url = %url, username = %self.config.username, "Logging in");

        let payload = LoginRequest {
            post_user_login: PostUserLogin {
                login: &self.config.username,
                password: &self.config.password,
                remember: 1,
            },
        };

        let response = self.http.post(url).json(&payload).send().await?;
        let cookies = http::set_cookies(&response);
        let body = http::classify(response, Operation::Login).await?;

        if body.get("userLogin").is_none() {
            tracing::warn!("Login response has no userLogin");
            return Err(GoodDataError::Semantic(Operation::Login));
        }

        session.absorb_cookies(cookies);
        if !session.has_super_secure_token() {
            return Err(GoodDataError::MissingSessionCookie(SST_COOKIE));
        }
        session.state = SessionState::Establishing;
        Ok(())
    }

    pub(crate) async fn acquire_temp_token(&self, session: &mut Session) -> Result<()> {
        let url = http::endpoint(self.base, TOKEN_PATH)?;
        tracing::debug!(url = %url, method = ?self.config.token_method, "Requesting temporary token");

        let request = match self.config.token_method {
            TokenMethod::Get => self.http.get(url),
            TokenMethod::Post => self.http.post(url),
        };
        let response = request
            .header(COOKIE, session.super_secure_cookie()?)
            .send()
            .await?;
        let cookies = http::set_cookies(&response);
        http::classify(response, Operation::TempToken).await?;

        session.absorb_cookies(cookies);
        if !session.has_temporary_token() {
            return Err(GoodDataError::MissingSessionCookie(TT_COOKIE));
        }
        session.state = SessionState::Authenticated;
        Ok(())
    }

    /// Log in and acquire a temporary token into a brand-new session
    pub(crate) async fn establish(&self) -> Result<Session> {
        let mut session = Session::new();
        self.login(&mut session).await?;
        self.acquire_temp_token(&mut session).await?;
        tracing::info!(host = %self.config.host_name, "Session established");
        Ok(session)
    }

    /// Run `operation` on a fresh session; a login or token failure is returned as-is
    /// and `operation` is never started.
    pub(crate) async fn with_session<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.establish().await?;
        operation(session).await
    }
}
