//! Pairing use-case service.
//!
//! # Responsibility
//! - Link the signed-in user to a partner by email or by raw user id.
//! - Record the pair link and update the session partner.
//!
//! # Invariants
//! - A user can never be linked to themselves.
//! - Disconnecting only clears the session partner; shared data stays.

use crate::model::identity::{UserId, UserIdError};
use crate::model::pair::{derive_pair_key, PairKey};
use crate::session::SharedSession;
use crate::store::{lock_unpoisoned, DirectoryStore, PairLink, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Pairing failure shown next to the link form.
#[derive(Debug)]
pub enum PairError {
    NotSignedIn,
    EmptyInput,
    InvalidPartnerId(UserIdError),
    SelfPair,
    PartnerNotFound,
    Store(StoreError),
}

impl Display for PairError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "sign in before linking a partner"),
            Self::EmptyInput => write!(f, "enter your partner's email or id"),
            Self::InvalidPartnerId(err) => write!(f, "{err}"),
            Self::SelfPair => write!(f, "you cannot link with yourself"),
            Self::PartnerNotFound => write!(f, "no user found with that email"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PairError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPartnerId(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PairError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Pairing facade over the profile directory and the session.
pub struct PairService<D: DirectoryStore> {
    directory: Arc<D>,
    session: SharedSession,
}

impl<D: DirectoryStore> PairService<D> {
    pub fn new(directory: Arc<D>, session: SharedSession) -> Self {
        Self { directory, session }
    }

    /// Finds the partner by email, ignoring surrounding space and ASCII case,
    /// and links them.
    pub fn link_by_email(&self, email: &str) -> Result<PairLink, PairError> {
        let me = self.me()?;
        let email = email.trim();
        if email.is_empty() {
            return Err(PairError::EmptyInput);
        }

        let Some(profile) = self.directory.find_profile_by_email(email)? else {
            warn!("event=pair_link module=service status=error error_code=partner_not_found");
            return Err(PairError::PartnerNotFound);
        };
        self.link(&me, profile.uid)
    }

    /// Links to a partner by the id they shared out of band.
    pub fn connect(&self, partner_code: &str) -> Result<PairLink, PairError> {
        let me = self.me()?;
        if partner_code.trim().is_empty() {
            return Err(PairError::EmptyInput);
        }
        let partner = UserId::parse(partner_code).map_err(PairError::InvalidPartnerId)?;
        self.link(&me, partner)
    }

    /// Clears the session partner. Shared records are left in place.
    pub fn disconnect(&self) {
        lock_unpoisoned(&self.session).clear_partner();
        info!("event=pair_unlink module=service status=ok");
    }

    /// Pair link for the current session scope, if any.
    pub fn current_link(&self) -> Result<Option<PairLink>, PairError> {
        let scope: Option<PairKey> = lock_unpoisoned(&self.session).pair_key();
        match scope {
            Some(scope) => Ok(self.directory.get_pair_link(&scope)?),
            None => Ok(None),
        }
    }

    fn me(&self) -> Result<UserId, PairError> {
        lock_unpoisoned(&self.session)
            .me()
            .cloned()
            .ok_or(PairError::NotSignedIn)
    }

    fn link(&self, me: &UserId, partner: UserId) -> Result<PairLink, PairError> {
        if &partner == me {
            return Err(PairError::SelfPair);
        }
        let link = self.directory.upsert_pair_link(me, &partner)?;
        debug_assert_eq!(link.pair_key, derive_pair_key(me, &partner));
        lock_unpoisoned(&self.session).set_partner(partner);
        info!("event=pair_link module=service status=ok");
        Ok(link)
    }
}
