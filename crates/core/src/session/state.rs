//! Session phases and the published session snapshot

use std::fmt;

use medool_common::auth::User;
use medool_domain::{select_active_profile, Profile};
use serde::Serialize;

use super::SessionError;

/// Where the session stands
///
/// ```text
/// Determining ──► Unauthenticated ◄──► Authenticated
///      └──────────────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Startup check still running; protected views must wait.
    Determining,
    Unauthenticated,
    Authenticated,
}

impl SessionPhase {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Determining, Self::Unauthenticated | Self::Authenticated)
                | (Self::Unauthenticated, Self::Authenticated)
                | (Self::Authenticated, Self::Unauthenticated)
        )
    }

    /// Validated transition.
    ///
    /// # Errors
    /// `SessionError::InvalidTransition` for anything outside the state
    /// diagram above, including self-transitions.
    pub fn transition_to(self, next: Self) -> Result<Self, SessionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SessionError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Determining => "determining",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
        })
    }
}

/// Snapshot published to observers on every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub profiles: Vec<Profile>,
    pub active_profile: Option<Profile>,
}

impl SessionState {
    pub fn determining() -> Self {
        Self {
            phase: SessionPhase::Determining,
            user: None,
            profiles: Vec::new(),
            active_profile: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self { phase: SessionPhase::Unauthenticated, ..Self::determining() }
    }

    /// Signed-in state with the default (or first) profile active.
    pub fn authenticated(user: User, profiles: Vec<Profile>) -> Self {
        let active_profile = select_active_profile(&profiles).cloned();
        Self { phase: SessionPhase::Authenticated, user: Some(user), profiles, active_profile }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Replace the profile list, keeping the active profile when it still
    /// exists and falling back to default/first otherwise.
    pub fn replace_profiles(&mut self, profiles: Vec<Profile>) {
        let keep = self
            .active_profile
            .as_ref()
            .and_then(|active| profiles.iter().find(|profile| profile.id == active.id))
            .cloned();
        self.active_profile = keep.or_else(|| select_active_profile(&profiles).cloned());
        self.profiles = profiles;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::determining()
    }
}
