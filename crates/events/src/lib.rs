//! Client-side event distribution.
//!
//! The sync core never talks to the UI directly. It publishes [`ClientEvent`]s
//! (user notifications and cache invalidations) on an [`EventBus`], and
//! whatever renders the UI subscribes.

pub mod bus;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{ClientEvent, Notification, Severity};
