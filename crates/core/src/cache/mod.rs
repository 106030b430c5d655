//! File-backed change-detection cache.
//!
//! Each source owns one small JSON record holding the last published
//! fingerprint, the last conditional-request token and the refresh
//! timestamps. Records are replaced atomically and never shared between
//! sources.

pub mod hash;
pub mod record;
pub mod store;

pub use crate::Error;

pub use hash::{canonical_form, fingerprint};
pub use record::CacheRecord;
pub use store::CacheStore;
