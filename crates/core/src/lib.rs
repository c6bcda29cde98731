//! Domain core for the Aftercare service-request platform.
//!
//! This crate owns the service request lifecycle: the typed role model, the
//! per-role authorization matrix, the primary status state machine, the
//! two-phase deletion workflow, the tamper-evident activity trail, and the
//! badge rule engine. Everything here is independent of HTTP and SQL; the
//! [`LifecycleEngine`](engine::LifecycleEngine) operates against the
//! [`ServiceStore`](store::ServiceStore) trait so the same logic runs over
//! Postgres in production and over [`MemoryStore`](memory::MemoryStore) in
//! tests.

pub mod activity;
pub mod badges;
pub mod capability;
pub mod deletion;
pub mod effects;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod lifecycle;
pub mod memory;
pub mod roles;
pub mod store;
pub mod types;

pub use capability::{Capability, CapabilitySet, ServiceView};
pub use deletion::DeletionStatus;
pub use effects::{EffectSink, LifecycleEvent};
pub use engine::{DeletionOutcome, LifecycleEngine};
pub use error::CoreError;
pub use lifecycle::ServiceStatus;
pub use memory::MemoryStore;
pub use roles::{Actor, Role};
pub use store::ServiceStore;
