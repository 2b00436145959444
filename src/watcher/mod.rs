//! Recursive, debounced directory watching for deployment roots.
//!
//! # Architecture
//!
//! ```text
//! RecursiveWatcher (one per root)
//!   - notify watcher, one NonRecursive subscription per directory
//!   - SubscriptionTable (path <-> handle)
//!   - observation thread  --RawEvent-->  PendingChangeSet
//!   - DebounceTimer thread --expiry--> flush -> ChangeListener
//!                                       \-> coverage repair
//! ```
//!
//! The pending change-set and the subscription table share one lock per
//! root, so recording, delivery and repair never interleave.

mod aggregator;
mod error;
mod listener;
mod recursive;
mod subscriptions;
mod timer;

pub use aggregator::{ChangeBatch, ChangeKind, PendingChangeSet, RawEvent};
pub use error::WatchError;
pub use listener::{ChangeListener, Delivery};
pub use recursive::RecursiveWatcher;
pub use subscriptions::{SubscriptionId, SubscriptionTable};
pub use timer::DebounceTimer;
