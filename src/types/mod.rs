//! Core type definitions for llm-relay.
//!
//! This module contains the canonical, provider-agnostic message model that
//! every adapter translates from.

pub mod content;
pub mod messages;

// Re-export commonly used types
pub use content::*;
pub use messages::*;
