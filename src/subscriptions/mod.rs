//! Observer registry shared by the recorder and the playback engine.
//!
//! Observers are either callbacks, invoked synchronously on the notifying
//! thread, or bounded channels whose receivers are dropped when they fall
//! behind.
//!
//! # Example
//!
//! ```ignore
//! let registry: ObserverRegistry<u32> = ObserverRegistry::new();
//!
//! let id = registry.subscribe(|n| println!("got {n}"));
//! let receiver = registry.subscribe_channel(16);
//!
//! registry.notify(&1);
//! assert_eq!(receiver.recv()?, 1);
//!
//! registry.unsubscribe(id);
//! ```

mod registry;
mod types;

pub use registry::{Callback, ObserverRegistry};
pub use types::{EventReceiver, SubscriptionId};
