//! Aftercare event bus.
//!
//! Building blocks for decoupled side-effect dispatch:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] — the canonical event envelope, with a conversion
//!   from the engine's `LifecycleEvent`.
//!
//! The engine publishes after its transaction commits; the side-effect
//! router in the API crate consumes the bus and drives notifications,
//! badge evaluation, and the geocoding trigger.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent};
