//! Event bus for execution lifecycle events.
//!
//! Provides an `EventBus` that distributes `EventEnvelope` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
