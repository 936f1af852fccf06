//! Backend fetcher implementations
//!
//! Each backend implements `ResourceFetcher` for one family of schemes.
//! Only HTTP/HTTPS ships with the crate; other schemes can be added through
//! `FetcherRegistry::register`.

pub mod http;

pub use http::HttpFetcher;
