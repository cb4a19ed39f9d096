//! Domain model for pairing and shared feature records.
//!
//! # Responsibility
//! - Define identities, the pair key and typed feature schemas.
//! - Validate store data where it crosses into application logic.
//!
//! # Invariants
//! - Pair keys are derived, never stored as free input.
//! - Feature data is only observed through validated schemas.

pub mod feature;
pub mod identity;
pub mod pair;
pub mod record;
