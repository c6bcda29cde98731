//! Request extractors applied at the handler boundary.

pub mod auth;

pub use auth::AuthUser;
