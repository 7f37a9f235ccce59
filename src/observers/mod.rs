//! Observer channel registry
//!
//! Each subscriber connection gets a snapshot on attach and every later
//! broadcast, with no delivery guarantee. The periodic heartbeat snapshot
//! corrects anything a slow subscriber missed.

mod registry;

pub use registry::{ObserverRegistry, Subscriber, SubscriberId, Subscription};
