//! Application state container.
//!
//! # Responsibility
//! - Hold the signed-in user, the linked partner and the UI theme.
//! - Derive the active pair scope for feature views.
//!
//! # Invariants
//! - A partner is only held while a user is signed in.
//! - Switching to a different user drops the previous user's partner.
//! - Nothing here is persisted.

use crate::model::identity::{Identity, UserId};
use crate::model::pair::{derive_scope, PairKey};
use std::sync::{Arc, Mutex};

/// Colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Session state shared between auth callbacks, pairing and views.
pub type SharedSession = Arc<Mutex<AppSession>>;

/// Explicit client state passed to every feature view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSession {
    user: Option<Identity>,
    partner: Option<UserId>,
    theme: Theme,
}

impl AppSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh session for shared ownership.
    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn me(&self) -> Option<&UserId> {
        self.user.as_ref().map(|identity| &identity.uid)
    }

    pub fn partner(&self) -> Option<&UserId> {
        self.partner.as_ref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Applies an identity change from the auth provider.
    pub fn set_user(&mut self, user: Option<Identity>) {
        let same_user = match (&self.user, &user) {
            (Some(current), Some(next)) => current.uid == next.uid,
            _ => false,
        };
        if !same_user {
            self.partner = None;
        }
        self.user = user;
    }

    /// Records the linked partner. Ignored while signed out.
    pub fn set_partner(&mut self, partner: UserId) {
        if self.user.is_some() {
            self.partner = Some(partner);
        }
    }

    pub fn clear_partner(&mut self) {
        self.partner = None;
    }

    /// Tears down user and partner; keeps the theme.
    pub fn sign_out(&mut self) {
        self.user = None;
        self.partner = None;
    }

    /// Current pair scope, if both participants are known.
    pub fn pair_key(&self) -> Option<PairKey> {
        derive_scope(self.me(), self.partner())
    }
}
