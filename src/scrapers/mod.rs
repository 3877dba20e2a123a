//! Listing site scrapers that produce the cover records to mirror.
//!
//! Each scraper follows the same two-step pattern:
//!
//! 1. **Listing**: fetch a category page and extract one block per cover
//! 2. **Detail**: follow each block's link to find the high-resolution image
//!
//! # Supported Sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | capasjornais.pt | [`capasjornais`] | HTML scraping |
//!
//! All requests go through [`crate::remote::RemoteClient`], so the relay in
//! front of the site is applied uniformly.

pub mod capasjornais;
