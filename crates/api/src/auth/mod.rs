//! Authentication building blocks (JWT validation).
//!
//! Credential issuance lives outside this service; the API only validates
//! tokens minted by the identity provider and trusts their claims.

pub mod jwt;
