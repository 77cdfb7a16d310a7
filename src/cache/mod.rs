//! The binary cache: byte layout ([`codec`]), filtering ([`query`]), and the
//! lifecycle coordinator that decides between use-cache, reconcile, and
//! rebuild ([`lifecycle`]).

pub mod codec;
mod lifecycle;
pub mod query;

pub use codec::CacheView;
pub use lifecycle::{CacheMapping, delete, list, load_cache, upsert};
pub use query::Filter;
