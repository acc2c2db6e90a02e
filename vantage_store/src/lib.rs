//! # Data Store
//!
//! Versioned-data primitives, a bounded hot-key cache for the RT
//! cyclic executive, and a generic non-RT data store with expiration
//! and observer subscriptions.
//!
//! - [`version`] — the seqlock primitive ([`version::VersionedCell`])
//! - [`hotkey`] — [`hotkey::HotKeyCache`], index-addressed on the RT path
//! - [`value`] — [`value::CellValue`], the closed value type cells hold
//! - [`store`] — [`store::DataStore`], the generic non-RT map
//! - [`accessor`] — typed façades over a [`store::DataStore`]

pub mod accessor;
pub mod hotkey;
pub mod store;
pub mod value;
pub mod version;

pub use accessor::RobotStateAccessor;
pub use hotkey::{HotKeyCache, HotKeyIndex, HotKeyMetrics};
pub use store::{DataStore, ExpirationPolicy, StoreMetrics, SubscriptionHandle, VersionedValue};
pub use value::CellValue;
pub use version::{try_optimistic_read, VersionedCell};
