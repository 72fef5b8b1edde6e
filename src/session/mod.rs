//! Session state and authentication.
//!
//! - [`Session`]: the credential bundle for one account
//! - [`SessionHandle`]: the process-wide, read-shared session slot
//! - [`SessionStore`]: on-disk persistence, one file per account
//! - [`Authenticator`]: login, two-factor and checkpoint flows

pub mod auth;
pub mod handle;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::transport::SetCookie;

pub use auth::{
    AuthState, Authenticator, ChallengeMethod, CheckpointChallenge, LoginOutcome,
    TwoFactorChallenge,
};
pub use handle::{SessionHandle, SessionRenewer, SessionSnapshot};
pub use store::SessionStore;

/// Cookie holding the CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Cookie holding the numeric id of the logged in user.
pub const USER_ID_COOKIE: &str = "ds_user_id";

/// Cookie present only on authenticated sessions.
pub const SESSION_COOKIE: &str = "sessionid";

/// Authentication state for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub cookies: BTreeMap<String, String>,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl Session {
    /// A cookie-only session that has not logged in yet.
    pub fn anonymous() -> Self {
        Self {
            account: String::new(),
            user_id: None,
            cookies: BTreeMap::new(),
            csrf_token: String::new(),
            created_at: Utc::now(),
            expires_at: None,
            valid: true,
        }
    }

    /// Merge cookies set by a response. The CSRF token and expiry follow the
    /// `csrftoken` cookie; an empty value or `Max-Age=0` removes a cookie.
    pub fn apply_cookies(&mut self, cookies: &[SetCookie]) {
        for cookie in cookies {
            if cookie.value.is_empty() || cookie.max_age.is_some_and(|age| age <= 0) {
                self.cookies.remove(&cookie.name);
                continue;
            }

            self.cookies
                .insert(cookie.name.clone(), cookie.value.clone());

            if cookie.name == CSRF_COOKIE {
                self.csrf_token = cookie.value.clone();
                self.expires_at = cookie
                    .max_age
                    .map(|secs| Utc::now() + Duration::seconds(secs));
            }
            if cookie.name == USER_ID_COOKIE {
                self.user_id = Some(cookie.value.clone());
            }
        }
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Whether the server has accepted a login for this session.
    pub fn is_authenticated(&self) -> bool {
        self.cookies.contains_key(SESSION_COOKIE)
    }

    /// Usable for authenticated requests right now.
    pub fn is_usable(&self) -> bool {
        self.valid && !self.is_expired()
    }
}

#[cfg(test)]
pub(crate) fn test_session(account: &str) -> Session {
    let mut cookies = BTreeMap::new();
    cookies.insert(CSRF_COOKIE.to_string(), "csrf".to_string());
    cookies.insert(SESSION_COOKIE.to_string(), format!("{}-sid", account));
    cookies.insert(USER_ID_COOKIE.to_string(), "1000".to_string());
    Session {
        account: account.to_string(),
        user_id: Some("1000".to_string()),
        cookies,
        csrf_token: "csrf".to_string(),
        created_at: Utc::now(),
        expires_at: Some(Utc::now() + Duration::days(365)),
        valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(raw: &str) -> SetCookie {
        SetCookie::parse(raw).unwrap()
    }

    #[test]
    fn test_apply_cookies_tracks_csrf_and_user() {
        let mut session = Session::anonymous();
        session.apply_cookies(&[
            cookie("csrftoken=tok; Max-Age=3600; Path=/"),
            cookie("ds_user_id=42; Path=/"),
            cookie("sessionid=abc"),
        ]);

        assert_eq!(session.csrf_token, "tok");
        assert_eq!(session.user_id.as_deref(), Some("42"));
        assert!(session.is_authenticated());
        assert!(session.expires_at.is_some());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_apply_cookies_removes_deleted_cookie() {
        let mut session = test_session("alice");
        session.apply_cookies(&[cookie("sessionid=\"\"; Max-Age=0")]);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_cookie_header_is_sorted() {
        let mut session = Session::anonymous();
        session.apply_cookies(&[cookie("mid=m"), cookie("csrftoken=c")]);
        assert_eq!(session.cookie_header(), "csrftoken=c; mid=m");
    }

    #[test]
    fn test_expired_session_is_not_usable() {
        let mut session = test_session("alice");
        session.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(session.is_expired());
        assert!(!session.is_usable());
    }
}
