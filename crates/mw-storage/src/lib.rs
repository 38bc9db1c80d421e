//! Persistence layer
//!
//! Catalogues (macros, triggers) are persisted as versioned JSON documents
//! under a `store/` directory. Each document wraps its payload in an
//! envelope carrying the storage key and a format version, so future format
//! changes can be detected at load time.
//!
//! Writes are atomic: content goes to a temp file first and is renamed into
//! place, so a crash mid-save never corrupts an existing catalogue.

mod store;

pub use store::{Persisted, Store, StoreError, StoreResult, Versioned};
