//! Session lifecycle controller
//!
//! Owns the session state machine and drives startup, login, logout and
//! forced logout. State is published through a `watch` channel so views can
//! wait for `Determining` to settle before rendering protected content.

use std::sync::{Arc, Weak};

use medool_common::auth::{CredentialStore, LogoutSignal, RefreshCoordinator, User};
use medool_domain::{OtpRequest, OtpResponse, OtpVerification, Profile};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::ports::AuthApi;
use super::state::{SessionPhase, SessionState};
use super::SessionError;

/// Drives the session state machine
pub struct SessionController {
    api: Arc<dyn AuthApi>,
    refresher: RefreshCoordinator,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// New controller in the `Determining` phase.
    pub fn new(api: Arc<dyn AuthApi>, refresher: RefreshCoordinator) -> Self {
        let (state, _) = watch::channel(SessionState::determining());
        Self { api, refresher, state }
    }

    fn credentials(&self) -> &Arc<CredentialStore> {
        self.refresher.credentials()
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    /// True until the startup check has settled.
    pub fn is_determining(&self) -> bool {
        self.phase() == SessionPhase::Determining
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn active_profile(&self) -> Option<Profile> {
        self.state.borrow().active_profile.clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Startup session check.
    ///
    /// Settles `Determining` into `Unauthenticated` when there is no durable
    /// refresh token or the refresh fails, and into `Authenticated` (with
    /// profiles loaded) when it succeeds. Calling it again after the phase
    /// has settled is a no-op that returns the current phase.
    ///
    /// # Errors
    /// Never fails today; refresh and profile failures degrade to
    /// `Unauthenticated` or an empty profile list.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<SessionPhase, SessionError> {
        let phase = self.phase();
        if phase != SessionPhase::Determining {
            debug!(%phase, "session already settled");
            return Ok(phase);
        }

        if !self.credentials().has_refresh().await {
            info!("no stored session");
            return Ok(self.settle(SessionState::unauthenticated()));
        }

        let Some(session) = self.refresher.refresh_session().await else {
            info!("stored session could not be restored");
            self.credentials().clear_all().await;
            return Ok(self.settle(SessionState::unauthenticated()));
        };

        let profiles = self.load_profiles().await;
        info!(user_id = %session.user.id, profiles = profiles.len(), "session restored");
        Ok(self.settle(SessionState::authenticated(session.user, profiles)))
    }

    /// Leave `Determining` with `next`, unless something else (a forced
    /// logout) already moved the phase on.
    fn settle(&self, next: SessionState) -> SessionPhase {
        let mut settled = next.phase;
        self.state.send_if_modified(|state| {
            if state.phase == SessionPhase::Determining {
                *state = next;
                true
            } else {
                settled = state.phase;
                false
            }
        });
        settled
    }

    /// Ask the backend to text a login OTP to `phone`.
    ///
    /// # Errors
    /// Propagates the gateway's `DomainError` (rate limits, cooldowns).
    #[instrument(skip_all)]
    pub async fn request_otp(&self, phone: &str) -> Result<OtpResponse, SessionError> {
        let response = self.api.request_otp(&OtpRequest::login(phone)).await?;
        info!(status = %response.status, "login OTP requested");
        Ok(response)
    }

    /// Complete login with the OTP the user received.
    ///
    /// # Errors
    /// - `InvalidTransition` unless the session is `Unauthenticated`
    /// - `Api` for a rejected OTP
    /// - `Storage` when the refresh token cannot be persisted; the access
    ///   token is discarded again in that case
    #[instrument(skip_all)]
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<User, SessionError> {
        let phase = self.phase();
        if phase != SessionPhase::Unauthenticated {
            return Err(SessionError::InvalidTransition {
                from: phase,
                to: SessionPhase::Authenticated,
            });
        }

        let verification = OtpVerification { phone: phone.to_string(), otp: otp.to_string() };
        let grant = self.api.verify_otp(&verification).await?;

        if let Err(err) = self.credentials().store_grant(&grant).await {
            warn!(error = %err, "refresh token could not be persisted; aborting login");
            self.credentials().clear_access();
            return Err(SessionError::Storage(err));
        }

        let profiles = self.load_profiles().await;
        let user = grant.user;
        let next = SessionState::authenticated(user.clone(), profiles);

        // A concurrent login may have won while this one was in flight.
        let mut committed = Ok(SessionPhase::Authenticated);
        self.state.send_if_modified(|state| {
            committed = state.phase.transition_to(SessionPhase::Authenticated);
            if committed.is_ok() {
                *state = next;
            }
            committed.is_ok()
        });
        committed?;

        let new_user = self.state.borrow().profiles.is_empty();
        info!(user_id = %user.id, new_user, "login complete");
        Ok(user)
    }

    /// Best-effort backend logout followed by an unconditional local clear.
    ///
    /// The logout call itself needs a bearer token, and obtaining one may
    /// rotate the refresh token. The token to revoke is therefore read only
    /// after a valid access token is in hand.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.refresher.get_valid_access_token().await.is_none() {
            debug!("no live session to revoke on the backend");
        }
        if let Some(refresh_token) = self.credentials().refresh_token().await {
            if let Err(err) = self.api.logout(&refresh_token).await {
                warn!(
                    error = %err,
                    technical = err.technical.as_deref().unwrap_or_default(),
                    "backend logout failed; clearing local session anyway"
                );
            }
        }

        self.credentials().clear_all().await;
        self.reset("logout");
    }

    /// Response to the gateway's forced-logout signal.
    #[instrument(skip(self))]
    pub async fn handle_forced_logout(&self) {
        self.credentials().clear_all().await;
        self.reset("forced logout");
    }

    fn reset(&self, reason: &'static str) {
        let changed = self.state.send_if_modified(|state| {
            if state.phase.can_transition_to(SessionPhase::Unauthenticated) {
                *state = SessionState::unauthenticated();
                true
            } else {
                false
            }
        });
        if changed {
            info!(reason, "session ended");
        } else {
            debug!(reason, "session already unauthenticated");
        }
    }

    /// Run [`Self::handle_forced_logout`] for every raise of `signal`.
    ///
    /// The task holds only a weak reference and exits once the controller is
    /// dropped or the channel closes.
    pub fn spawn_logout_listener(self: &Arc<Self>, signal: &LogoutSignal) -> JoinHandle<()> {
        let mut receiver = signal.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(()) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "logout listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let Some(controller) = controller.upgrade() else { break };
                controller.handle_forced_logout().await;
            }
            debug!("logout listener stopped");
        })
    }

    /// Switch the profile the session acts for.
    ///
    /// Returns the selected profile, or `None` when `profile_id` is not one
    /// of the session's profiles.
    pub fn set_active_profile(&self, profile_id: &str) -> Option<Profile> {
        let mut selected = None;
        self.state.send_if_modified(|state| {
            selected = state.profiles.iter().find(|profile| profile.id == profile_id).cloned();
            match &selected {
                Some(profile) if state.active_profile.as_ref() != Some(profile) => {
                    state.active_profile = Some(profile.clone());
                    true
                }
                _ => false,
            }
        });
        selected
    }

    /// Re-fetch profiles after a create, edit or delete.
    ///
    /// # Errors
    /// Propagates the gateway's `DomainError`; state is left unchanged.
    #[instrument(skip(self))]
    pub async fn refresh_profiles(&self) -> Result<Vec<Profile>, SessionError> {
        let profiles = self.api.fetch_profiles().await?;
        self.state.send_modify(|state| state.replace_profiles(profiles.clone()));
        Ok(profiles)
    }

    async fn load_profiles(&self) -> Vec<Profile> {
        match self.api.fetch_profiles().await {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(
                    error = %err,
                    technical = err.technical.as_deref().unwrap_or_default(),
                    "profile load failed"
                );
                Vec::new()
            }
        }
    }
}
