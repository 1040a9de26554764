//! Client code for urlmeta.
//!
//! This crate provides the reqwest-backed fetcher used by the record
//! lifecycle, plus validation for submitted target URLs.

pub mod fetch;

pub use fetch::{ClientBuildError, FetchConfig, HttpFetcher, UrlError, parse_target};
