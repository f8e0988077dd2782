//! A blog content pipeline: structured rich-text documents in
//! ([`crate::doc`]), HTML pages out.
//!
//! Content flows through four stages. A [`crate::store::ContentStore`]
//! backend (hosted API, SQLite, or flat markdown files) produces typed
//! records; [`crate::render`] turns document trees into HTML while
//! [`crate::toc`] derives the in-page navigation from the same headings;
//! [`crate::paginate`] computes listing windows; and [`crate::write`]
//! templates everything onto disk, with [`crate::sitemap`] trailing behind
//! for the crawl surface.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod api_store;
pub mod build;
pub mod config;
pub mod db_store;
pub mod doc;
pub mod file_store;
pub mod image;
pub mod markdown;
pub mod page;
pub mod paginate;
pub mod render;
pub mod sitemap;
pub mod store;
pub mod toc;
pub mod util;
pub mod value;
pub mod write;
