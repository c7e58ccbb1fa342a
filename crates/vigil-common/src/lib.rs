//! # Vigil Common
//!
//! Shared types, errors, and constants used across Vigil components.
//!
//! ## Modules
//! - `types` - Core data structures (ContentMapping, ClassificationResult, etc.)
//! - `error` - Error taxonomy for authentication, moderation, and the remote client
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::{AuthFailure, AuthFailureKind, ClientError, ModerationError, VigilError};
pub use types::*;
