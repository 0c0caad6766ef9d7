//! # Cache
//!
//! Content-addressed filesystem cache for downloaded images. Entries are
//! addressed by request identity (URI plus optional target dimensions),
//! not by content bytes: the derived key doubles as the file name, so the
//! same pure function answers both "is this cached?" and "where does the
//! download land?".

mod key;
mod store;

pub use key::CacheKey;
pub use store::CacheStore;
