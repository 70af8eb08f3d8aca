//! Feed ingestion: fetching, tolerant parsing and normalization of job feeds.
//!
//! The pieces are independent so each can be exercised on its own:
//!
//! - [`FeedFetcher`] pulls raw bytes for one source URL
//! - [`parse`] turns possibly malformed RSS/Atom XML into [`RawItem`]s and never fails
//! - [`normalize_all`] maps raw items to validated job candidates

mod fetcher;
mod normalizer;
mod parser;
mod raw_item;
mod repair;
mod text;

pub use fetcher::{
    DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FeedFetcher, FetchError,
    FetcherConfig,
};
pub use normalizer::{DroppedItem, Normalized, normalize, normalize_all, source_name};
pub use parser::parse;
pub use raw_item::RawItem;
pub use text::{clean_text, truncate_description};
