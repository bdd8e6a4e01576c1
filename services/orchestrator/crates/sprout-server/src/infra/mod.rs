//! Infrastructure adapters — concrete port implementations.
//!
//! One module per external system. Adapters translate between provider
//! wire formats and domain types; they never embed business rules and
//! never log secret values or raw provider response bodies.

pub mod github;
pub mod memory;
pub mod neon;
pub mod vercel;
