//! Change feed for store mutations.
//!
//! Every collection append/update/remove and every singleton write is
//! broadcast to in-process subscribers, which is how the shared state cache
//! and the presentation layer learn that derived views must be recomputed.
//!
//! Subscriptions support:
//! - Filtering by storage key
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::keys(&[keys::BOOKINGS]),
//!     ..Default::default()
//! });
//!
//! let (events, disconnected) = handle.drain();
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
