//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate auth, directory and session updates into use-case APIs.
//! - Keep view code decoupled from provider and storage details.

pub mod account_service;
pub mod pair_service;
