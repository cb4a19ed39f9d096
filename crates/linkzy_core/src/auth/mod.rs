//! Auth collaborator boundary.
//!
//! # Responsibility
//! - Define the sign-up/sign-in/sign-out contract that yields identities.
//! - Push identity changes to registered listeners.
//!
//! # Invariants
//! - Listeners receive the current identity immediately on registration.
//! - Credentials never appear in logs or error messages.

use crate::db::DbError;
use crate::model::identity::Identity;
use crate::store::Subscription;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod local;
pub mod password;

pub use local::LocalAuthProvider;

pub type AuthResult<T> = Result<T, AuthError>;

/// Callback invoked with the new identity, or `None` after sign-out.
pub type IdentityCallback = Box<dyn FnMut(Option<&Identity>) + Send>;

/// Auth failure surfaced to sign-in flows.
#[derive(Debug)]
pub enum AuthError {
    InvalidEmail,
    WeakPassword { min_len: usize },
    EmailInUse,
    InvalidCredentials,
    Hash(String),
    Db(DbError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "email address is not valid"),
            Self::WeakPassword { min_len } => {
                write!(f, "password must be at least {min_len} characters")
            }
            Self::EmailInUse => write!(f, "an account already exists for this email"),
            Self::InvalidCredentials => write!(f, "email or password is incorrect"),
            Self::Hash(message) => write!(f, "password hashing failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// External identity provider.
pub trait AuthProvider {
    fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity>;
    fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;
    fn sign_out(&self) -> AuthResult<()>;
    fn current(&self) -> Option<Identity>;
    /// Registers a listener; dropping the handle unregisters it.
    fn on_identity_change(&self, callback: IdentityCallback) -> Subscription;
}
