//! Keyed, invalidatable replica of server entities.

pub mod key;
pub mod query;
pub mod store;

pub use key::{QueryKey, Resource};
pub use query::{Query, QueryState};
pub use store::{Payload, QueryCache, Snapshot, Subscription};
