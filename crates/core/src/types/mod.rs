//! Core types for Paperslip.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod yen;

pub use email::{Email, EmailError};
pub use id::*;
pub use yen::Yen;
