//! Pair key derivation.
//!
//! # Responsibility
//! - Derive the canonical scope key shared by two linked users.
//!
//! # Invariants
//! - `derive_pair_key(a, b) == derive_pair_key(b, a)`.
//! - The key is a pure function of its inputs.
//! - A missing identifier on either side yields no scope at all.

use crate::model::identity::UserId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Separator between the two sorted identifiers.
///
/// `UserId` construction rejects identifiers that contain it.
pub const PAIR_SEPARATOR: char = '_';

/// Canonical, order-independent identifier for one unordered user pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the pair key for two identifiers.
///
/// Sorts lexicographically and joins with `_`. A self-pair still resolves.
pub fn derive_pair_key(a: &UserId, b: &UserId) -> PairKey {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    PairKey(format!("{low}{PAIR_SEPARATOR}{high}"))
}

/// Derives a scope only when both participants are present.
pub fn derive_scope(me: Option<&UserId>, partner: Option<&UserId>) -> Option<PairKey> {
    match (me, partner) {
        (Some(me), Some(partner)) => Some(derive_pair_key(me, partner)),
        _ => None,
    }
}
