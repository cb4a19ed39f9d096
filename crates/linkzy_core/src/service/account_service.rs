//! Account use-case service.
//!
//! # Responsibility
//! - Route sign-up/sign-in/sign-out through the auth provider.
//! - Mirror identity changes into the session and the profile directory.
//!
//! # Invariants
//! - The session user always follows the provider's current identity.
//! - A failed profile write never blocks sign-in.

use crate::auth::{AuthProvider, AuthResult};
use crate::model::identity::Identity;
use crate::session::SharedSession;
use crate::store::{lock_unpoisoned, DirectoryStore, Subscription};
use log::warn;
use std::sync::Arc;

/// Account facade wiring auth, session and profile directory together.
pub struct AccountService<A: AuthProvider> {
    auth: Arc<A>,
    session: SharedSession,
    _identity_listener: Subscription,
}

impl<A: AuthProvider> AccountService<A> {
    /// Registers the identity listener and returns the service.
    pub fn new<D>(auth: Arc<A>, directory: Arc<D>, session: SharedSession) -> Self
    where
        D: DirectoryStore + Send + Sync + 'static,
    {
        let listener_session = Arc::clone(&session);
        let on_change = move |identity: Option<&Identity>| {
            lock_unpoisoned(&listener_session).set_user(identity.cloned());
            if let Some(identity) = identity {
                if let Err(err) =
                    directory.upsert_profile(&identity.uid, identity.email.as_deref())
                {
                    warn!(
                        "event=profile_upsert module=service status=error error={}",
                        err
                    );
                }
            }
        };
        let identity_listener = auth.on_identity_change(Box::new(on_change));

        Self {
            auth,
            session,
            _identity_listener: identity_listener,
        }
    }

    pub fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.auth.sign_up(email, password)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.auth.sign_in(email, password)
    }

    /// Signs out and tears the session down.
    pub fn sign_out(&self) -> AuthResult<()> {
        self.auth.sign_out()?;
        lock_unpoisoned(&self.session).sign_out();
        Ok(())
    }

    pub fn current(&self) -> Option<Identity> {
        self.auth.current()
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }
}
