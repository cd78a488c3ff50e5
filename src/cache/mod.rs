//! Cache module for memoizing external lookups on disk
//!
//! This module provides the key constructor, the JSON-file backed cache store,
//! and the fetch mediator that answers every outbound request from the store
//! when it can and records the result when it cannot. Entries never expire,
//! so repeated runs with the same requests make no network calls.

pub mod key;
pub mod mediator;
pub mod store;

pub use key::{construct_key, RequestDescriptor, KEY_SEPARATOR};
pub use mediator::{FetchError, FetchMediator, FetchStats, HttpTransport, Transport};
pub use store::{CacheError, CacheStore};
