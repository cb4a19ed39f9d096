//! SQLite-backed local auth provider.

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, AuthProvider, AuthResult, IdentityCallback};
use crate::db::open_db_in_memory;
use crate::model::identity::{Identity, UserId};
use crate::store::{lock_unpoisoned, Subscription};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

type SharedCallback = Arc<Mutex<IdentityCallback>>;

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    callbacks: BTreeMap<u64, SharedCallback>,
}

/// Email/password provider storing argon2id hashes in `auth_accounts`.
pub struct LocalAuthProvider {
    conn: Mutex<Connection>,
    current: Mutex<Option<Identity>>,
    listeners: Arc<Mutex<ListenerSet>>,
}

impl LocalAuthProvider {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            current: Mutex::new(None),
            listeners: Arc::new(Mutex::new(ListenerSet::default())),
        }
    }

    /// Provider over a throwaway in-memory account table.
    pub fn in_memory() -> AuthResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn set_current(&self, identity: Option<Identity>) {
        *lock_unpoisoned(&self.current) = identity.clone();

        let callbacks: Vec<SharedCallback> = lock_unpoisoned(&self.listeners)
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            let mut callback = lock_unpoisoned(&callback);
            (*callback)(identity.as_ref());
        }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let uid = UserId::generate();
        let hash = hash_password(password)?;
        {
            let conn = lock_unpoisoned(&self.conn);
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM auth_accounts WHERE email = ?1);",
                [email.as_str()],
                |row| row.get(0),
            )?;
            if taken {
                return Err(AuthError::EmailInUse);
            }
            conn.execute(
                "INSERT INTO auth_accounts (uid, email, password_hash) VALUES (?1, ?2, ?3);",
                params![uid.as_str(), email.as_str(), hash],
            )?;
        }
        info!("event=auth_sign_up module=auth status=ok");

        let identity = Identity::new(uid, Some(email));
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let email = normalize_email(email)?;
        let row = {
            let conn = lock_unpoisoned(&self.conn);
            conn.query_row(
                "SELECT uid, password_hash FROM auth_accounts WHERE email = ?1;",
                [email.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
        };

        let Some((uid, hash)) = row else {
            warn!("event=auth_sign_in module=auth status=error error_code=unknown_account");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &hash)? {
            warn!("event=auth_sign_in module=auth status=error error_code=bad_password");
            return Err(AuthError::InvalidCredentials);
        }
        let uid = UserId::parse(&uid).map_err(|_| AuthError::InvalidCredentials)?;
        info!("event=auth_sign_in module=auth status=ok");

        let identity = Identity::new(uid, Some(email));
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) -> AuthResult<()> {
        info!("event=auth_sign_out module=auth status=ok");
        self.set_current(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        lock_unpoisoned(&self.current).clone()
    }

    fn on_identity_change(&self, mut callback: IdentityCallback) -> Subscription {
        callback(self.current().as_ref());

        let id = {
            let mut set = lock_unpoisoned(&self.listeners);
            let id = set.next_id;
            set.next_id += 1;
            set.callbacks.insert(id, Arc::new(Mutex::new(callback)));
            id
        };

        let listeners: Weak<Mutex<ListenerSet>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                lock_unpoisoned(&listeners).callbacks.remove(&id);
            }
        })
    }
}

fn normalize_email(email: &str) -> AuthResult<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(normalized)
}
