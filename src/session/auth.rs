//! Login, two-factor and checkpoint flows.
//!
//! ```text
//! Anonymous -> Authenticating -> Authenticated
//!                             -> AwaitingTwoFactor -> Authenticated
//!                             -> AwaitingChallenge -> Authenticated
//! Authenticated -> Anonymous  (logout, pause, invalidation)
//! ```
//!
//! At most one challenge is pending at a time. Challenge handles are
//! one-shot: once a challenge succeeded or expired its handle is rejected
//! with [`Error::ChallengeExpired`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::client::FetchClient;
use crate::api::decoder::LoginReply;
use crate::api::endpoints::{BASE_URL, LOGIN_URL, LOGOUT_URL, MID_URL, TWO_FACTOR_URL};
use crate::api::transport::{status_error, HttpRequest, HttpResponse};
use crate::error::{Error, Result};
use crate::fs::validate_account_name;
use crate::session::{Session, SessionHandle, SessionRenewer, SessionStore};

/// Seconds a two-factor or checkpoint challenge can be answered.
pub const CHALLENGE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    AwaitingTwoFactor,
    AwaitingChallenge,
    Authenticated,
}

/// Handle to a pending two-factor verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorChallenge {
    pub id: Uuid,
    pub username: String,
    pub obfuscated_phone: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Handle to a pending security checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointChallenge {
    pub id: Uuid,
    pub username: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Where the checkpoint security code is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMethod {
    Sms,
    Email,
}

impl ChallengeMethod {
    fn choice(self) -> &'static str {
        match self {
            ChallengeMethod::Sms => "0",
            ChallengeMethod::Email => "1",
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Session),
    TwoFactorRequired(TwoFactorChallenge),
    CheckpointRequired(CheckpointChallenge),
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

enum Pending {
    TwoFactor {
        challenge: TwoFactorChallenge,
        identifier: String,
        session: Session,
        credentials: Credentials,
    },
    Checkpoint {
        challenge: CheckpointChallenge,
        session: Session,
        credentials: Credentials,
        code_requested: bool,
    },
}

impl Pending {
    fn id(&self) -> Uuid {
        match self {
            Pending::TwoFactor { challenge, .. } => challenge.id,
            Pending::Checkpoint { challenge, .. } => challenge.id,
        }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Pending::TwoFactor { challenge, .. } => challenge.expires_at,
            Pending::Checkpoint { challenge, .. } => challenge.expires_at,
        }
    }
}

struct Inner {
    state: AuthState,
    pending: Option<Pending>,
    /// Remembered after a successful login, used to renew the session.
    credentials: Option<Credentials>,
}

/// Drives authentication and owns writes to the session slot.
pub struct Authenticator {
    client: Arc<FetchClient>,
    store: SessionStore,
    handle: SessionHandle,
    challenge_ttl: Duration,
    inner: Mutex<Inner>,
}

impl Authenticator {
    /// Create the authenticator and register it as the session renewer.
    pub fn new(client: Arc<FetchClient>, store: SessionStore, handle: SessionHandle) -> Arc<Self> {
        Self::with_challenge_ttl(client, store, handle, Duration::seconds(CHALLENGE_TTL_SECS))
    }

    pub fn with_challenge_ttl(
        client: Arc<FetchClient>,
        store: SessionStore,
        handle: SessionHandle,
        challenge_ttl: Duration,
    ) -> Arc<Self> {
        let authenticator = Arc::new(Self {
            client,
            store,
            handle: handle.clone(),
            challenge_ttl,
            inner: Mutex::new(Inner {
                state: AuthState::Anonymous,
                pending: None,
                credentials: None,
            }),
        });
        let renewer: Weak<Authenticator> = Arc::downgrade(&authenticator);
        handle.set_renewer(renewer);
        authenticator
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current state. An authenticated session the server invalidated
    /// reports [`AuthState::Anonymous`].
    pub async fn state(&self) -> AuthState {
        let state = self.inner.lock().await.state;
        if state == AuthState::Authenticated && !self.handle.is_authenticated().await {
            return AuthState::Anonymous;
        }
        state
    }

    async fn set_state(&self, state: AuthState) {
        self.inner.lock().await.state = state;
    }

    /// Log in with a username and password.
    ///
    /// The previous session is dropped from memory first; its stored copy
    /// is kept until the new one replaces it.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Usage("username and password must not be empty".into()));
        }
        validate_account_name(username)?;

        if let Some(old) = self.handle.clear().await {
            tracing::debug!("Dropped in-memory session of '{}'", old.account);
        }

        self.authenticate(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<LoginOutcome> {
        {
            let mut inner = self.inner.lock().await;
            inner.state = AuthState::Authenticating;
            inner.pending = None;
        }

        let result = self.submit_credentials(credentials).await;
        if result.is_err() {
            self.set_state(AuthState::Anonymous).await;
        }
        result
    }

    async fn submit_credentials(&self, credentials: Credentials) -> Result<LoginOutcome> {
        let mut session = Session::anonymous();
        session.account = credentials.username.clone();
        self.fetch_csrf(&mut session).await?;

        tracing::info!("Logging in as '{}'", credentials.username);
        let request = HttpRequest::post(LOGIN_URL)
            .form("username", &credentials.username)
            .form("password", &credentials.password);
        let response = self.client.send(request, Some(&session)).await?;
        let reply = self.read_reply(&mut session, &response, false)?;

        match reply {
            LoginReply::Authenticated { user_id } => {
                let session = self.finalize(session, user_id, credentials).await?;
                Ok(LoginOutcome::Authenticated(session))
            }
            LoginReply::TwoFactor {
                username,
                identifier,
                obfuscated_phone,
            } => {
                let challenge = TwoFactorChallenge {
                    id: Uuid::new_v4(),
                    username,
                    obfuscated_phone,
                    expires_at: Utc::now() + self.challenge_ttl,
                };
                tracing::info!("Two-factor verification required");
                let mut inner = self.inner.lock().await;
                inner.state = AuthState::AwaitingTwoFactor;
                inner.pending = Some(Pending::TwoFactor {
                    challenge: challenge.clone(),
                    identifier,
                    session,
                    credentials,
                });
                Ok(LoginOutcome::TwoFactorRequired(challenge))
            }
            LoginReply::Checkpoint { url } => {
                let challenge = CheckpointChallenge {
                    id: Uuid::new_v4(),
                    username: credentials.username.clone(),
                    url,
                    expires_at: Utc::now() + self.challenge_ttl,
                };
                tracing::info!("Security checkpoint required");
                let mut inner = self.inner.lock().await;
                inner.state = AuthState::AwaitingChallenge;
                inner.pending = Some(Pending::Checkpoint {
                    challenge: challenge.clone(),
                    session,
                    credentials,
                    code_requested: false,
                });
                Ok(LoginOutcome::CheckpointRequired(challenge))
            }
            LoginReply::Rejected { message } => Err(Error::Auth(message)),
        }
    }

    /// Obtain the CSRF cookie, falling back to the mid endpoint.
    async fn fetch_csrf(&self, session: &mut Session) -> Result<()> {
        for url in [BASE_URL, MID_URL] {
            let response = self.client.send(HttpRequest::get(url), Some(session)).await?;
            session.apply_cookies(&response.set_cookies());
            if !session.csrf_token.is_empty() {
                return Ok(());
            }
        }
        Err(Error::Auth("the server did not issue a CSRF token".into()))
    }

    fn read_reply(
        &self,
        session: &mut Session,
        response: &HttpResponse,
        checkpoint: bool,
    ) -> Result<LoginReply> {
        session.apply_cookies(&response.set_cookies());
        let payload = match response.json() {
            Ok(payload) => payload,
            Err(e) => {
                return Err(status_error(response.status, response.retry_after(), "login")
                    .unwrap_or(e))
            }
        };
        let decoder = self.client.decoder();
        if checkpoint {
            decoder.checkpoint_reply(&payload)
        } else {
            decoder.login_reply(&payload)
        }
    }

    /// Look up the pending challenge `id`. An expired challenge is discarded.
    async fn pending(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match &inner.pending {
            Some(pending) if pending.id() == id => {
                if pending.expires_at() <= Utc::now() {
                    tracing::warn!("Challenge expired");
                    inner.pending = None;
                    inner.state = AuthState::Anonymous;
                    return Err(Error::ChallengeExpired);
                }
                Ok(())
            }
            _ => Err(Error::ChallengeExpired),
        }
    }

    /// Remove the pending challenge `id`, failing if it was replaced meanwhile.
    async fn take_pending(&self, id: Uuid) -> Result<Pending> {
        let mut inner = self.inner.lock().await;
        match inner.pending.take() {
            Some(pending) if pending.id() == id => Ok(pending),
            other => {
                inner.pending = other;
                Err(Error::ChallengeExpired)
            }
        }
    }

    async fn abandon(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        if inner.pending.as_ref().is_some_and(|p| p.id() == id) {
            inner.pending = None;
            inner.state = AuthState::Anonymous;
        }
    }

    /// Answer a two-factor challenge. A wrong code keeps the challenge open.
    pub async fn submit_two_factor(
        &self,
        challenge: &TwoFactorChallenge,
        code: &str,
    ) -> Result<Session> {
        self.pending(challenge.id).await?;
        let (identifier, mut session) = {
            let inner = self.inner.lock().await;
            match &inner.pending {
                Some(Pending::TwoFactor {
                    identifier,
                    session,
                    ..
                }) => (identifier.clone(), session.clone()),
                _ => return Err(Error::ChallengeExpired),
            }
        };

        let request = HttpRequest::post(TWO_FACTOR_URL)
            .form("username", &challenge.username)
            .form("identifier", identifier)
            .form("verificationCode", code.trim());
        let response = self.client.send(request, Some(&session)).await?;

        match self.read_reply(&mut session, &response, false)? {
            LoginReply::Authenticated { user_id } => {
                let Pending::TwoFactor { credentials, .. } = self.take_pending(challenge.id).await?
                else {
                    return Err(Error::ChallengeExpired);
                };
                self.finalize(session, user_id, credentials).await
            }
            LoginReply::Rejected { message } => Err(Error::Auth(message)),
            LoginReply::TwoFactor { .. } | LoginReply::Checkpoint { .. } => {
                self.abandon(challenge.id).await;
                Err(Error::Auth(
                    "unexpected challenge during two-factor verification".into(),
                ))
            }
        }
    }

    /// Ask the server to send the checkpoint security code.
    pub async fn request_checkpoint_code(
        &self,
        challenge: &CheckpointChallenge,
        method: ChallengeMethod,
    ) -> Result<()> {
        self.pending(challenge.id).await?;
        let mut session = self.checkpoint_session(challenge.id).await?;
        let url = format!("{}{}", BASE_URL, challenge.url);

        let response = self.client.send(HttpRequest::get(&url), Some(&session)).await?;
        session.apply_cookies(&response.set_cookies());

        let request = HttpRequest::post(&url)
            .form("choice", method.choice())
            .header("Referer", &url);
        let response = self.client.send(request, Some(&session)).await?;
        if let Some(err) = status_error(response.status, response.retry_after(), "checkpoint") {
            return Err(err);
        }
        session.apply_cookies(&response.set_cookies());

        let mut inner = self.inner.lock().await;
        match &mut inner.pending {
            Some(Pending::Checkpoint {
                challenge: pending,
                session: pending_session,
                code_requested,
                ..
            }) if pending.id == challenge.id => {
                *pending_session = session;
                *code_requested = true;
                tracing::info!("Security code sent via {:?}", method);
                Ok(())
            }
            _ => Err(Error::ChallengeExpired),
        }
    }

    async fn checkpoint_session(&self, id: Uuid) -> Result<Session> {
        let inner = self.inner.lock().await;
        match &inner.pending {
            Some(Pending::Checkpoint {
                challenge, session, ..
            }) if challenge.id == id => Ok(session.clone()),
            _ => Err(Error::ChallengeExpired),
        }
    }

    /// Submit the checkpoint security code.
    pub async fn solve_checkpoint(
        &self,
        challenge: &CheckpointChallenge,
        code: &str,
    ) -> Result<Session> {
        self.pending(challenge.id).await?;
        let requested = {
            let inner = self.inner.lock().await;
            matches!(
                &inner.pending,
                Some(Pending::Checkpoint { code_requested: true, .. })
            )
        };
        if !requested {
            return Err(Error::Usage(
                "request a security code before solving the checkpoint".into(),
            ));
        }
        let mut session = self.checkpoint_session(challenge.id).await?;
        let url = format!("{}{}", BASE_URL, challenge.url);

        let request = HttpRequest::post(&url)
            .form("security_code", code.trim())
            .header("Referer", &url);
        let response = self.client.send(request, Some(&session)).await?;

        match self.read_reply(&mut session, &response, true)? {
            LoginReply::Authenticated { user_id } => {
                let Pending::Checkpoint { credentials, .. } = self.take_pending(challenge.id).await?
                else {
                    return Err(Error::ChallengeExpired);
                };
                self.finalize(session, user_id, credentials).await
            }
            LoginReply::Rejected { message } => Err(Error::Auth(message)),
            _ => Err(Error::MalformedResponse("unexpected checkpoint reply".into())),
        }
    }

    async fn finalize(
        &self,
        mut session: Session,
        user_id: Option<String>,
        credentials: Credentials,
    ) -> Result<Session> {
        if session.user_id.is_none() {
            session.user_id = user_id;
        }
        session.account = credentials.username.clone();
        session.created_at = Utc::now();
        session.valid = true;

        self.store.save(&session.account, &session)?;
        self.store.set_current(&session.account)?;
        self.handle.replace(session.clone()).await;

        let mut inner = self.inner.lock().await;
        inner.state = AuthState::Authenticated;
        inner.pending = None;
        inner.credentials = Some(credentials);
        tracing::info!("Logged in as '{}'", session.account);
        Ok(session)
    }

    /// Install the stored session of `account`.
    pub async fn restore(&self, account: &str) -> Result<Session> {
        let session = self.store.load(account)?;
        if session.is_expired() || !session.is_authenticated() {
            tracing::warn!("Stored session for '{}' has expired", account);
            return Err(Error::AuthExpired);
        }

        self.store.set_current(account)?;
        self.handle.replace(session.clone()).await;
        self.set_state(AuthState::Authenticated).await;
        tracing::debug!("Restored session for '{}'", account);
        Ok(session)
    }

    /// Install the session of the current account, if one is set.
    pub async fn restore_current(&self) -> Result<Option<Session>> {
        match self.store.current()? {
            Some(account) => self.restore(&account).await.map(Some),
            None => Ok(None),
        }
    }

    /// Log out remotely, delete the stored session and go anonymous.
    /// Failing to reach the server is logged and otherwise ignored.
    pub async fn logout(&self) -> Result<()> {
        if let Some(session) = self.handle.current().await {
            let request = HttpRequest::post(LOGOUT_URL)
                .form("csrfmiddlewaretoken", &session.csrf_token);
            match self.client.send(request, Some(&session)).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!("Remote session closed")
                }
                Ok(response) => tracing::warn!("Remote logout returned HTTP {}", response.status),
                Err(e) => tracing::warn!("Remote logout failed: {}", e),
            }

            match self.store.delete(&session.account) {
                Ok(()) | Err(Error::SessionNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            tracing::info!("Logged out '{}'", session.account);
        }

        self.reset().await
    }

    /// Forget the in-memory session but keep its stored copy.
    pub async fn pause(&self) -> Result<()> {
        if let Some(session) = self.handle.current().await {
            tracing::info!("Session of '{}' kept on disk", session.account);
        }
        self.reset().await
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear_current()?;
        self.handle.clear().await;
        let mut inner = self.inner.lock().await;
        inner.state = AuthState::Anonymous;
        inner.pending = None;
        inner.credentials = None;
        Ok(())
    }
}

#[async_trait]
impl SessionRenewer for Authenticator {
    async fn renew(&self) -> Result<Session> {
        let credentials = self
            .inner
            .lock()
            .await
            .credentials
            .clone()
            .ok_or(Error::AuthExpired)?;

        match self.authenticate(credentials).await {
            Ok(LoginOutcome::Authenticated(session)) => Ok(session),
            Ok(_) => {
                tracing::warn!("Re-authentication needs interactive verification");
                let mut inner = self.inner.lock().await;
                inner.pending = None;
                inner.state = AuthState::Anonymous;
                Err(Error::AuthExpired)
            }
            Err(e) => Err(e),
        }
    }
}
