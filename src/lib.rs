//! # labsite
//!
//! Content builder for a research group website.
//!
//! ## Modules
//!
//! - [`source`] - Site tree access (local directory or static origin)
//! - [`model`] - Member profiles and publication records
//! - [`merge`] - Cross-member publication deduplication
//! - [`matching`] - Group-author detection
//! - [`aggregator`] - Publication load pipeline
//! - [`semanticscholar`], [`crossref`], [`openalex`] - External API clients
//! - [`enrichment`] - DOI venue/URL lookups
//! - [`cache`] - Expiring cache for API responses
//! - [`browse`] - Filter and "load more" controller
//! - [`render`] - Publications page HTML
//! - [`carousel`], [`highlights`] - Home page highlights carousel
//! - [`partials`] - Shared head/header/footer injection
//! - [`member`] - Member profile pages
//! - [`openings`] - Open positions listing
//! - [`sync`] - Member publication files from Semantic Scholar
//! - [`classify`] - Keyword topic labels for member publication files
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use labsite::aggregator::{Aggregator, AggregatorOptions};
//! use labsite::source::FsSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let aggregator = Aggregator::new(FsSource::new("./site"), AggregatorOptions::default());
//!     let aggregate = aggregator.load().await?;
//!     println!("Loaded {} publications", aggregate.publications.len());
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod browse;
pub mod cache;
pub mod carousel;
pub mod classify;
pub mod crossref;
pub mod documents;
pub mod enrichment;
pub mod error;
pub mod highlights;
pub mod matching;
pub mod member;
pub mod merge;
pub mod model;
pub mod openalex;
pub mod openings;
pub mod partials;
pub mod render;
pub mod semanticscholar;
pub mod source;
pub mod sync;

pub use error::{LabsiteError, Result};
