//! The library code for the `lunchmap` page generator. A build runs in a
//! straight line:
//!
//! 1. Parsing the places document and the lunch log ([`crate::parser`])
//! 2. Resolving addresses to coordinates ([`crate::geocode`])
//! 3. Attaching coordinates, photos ([`crate::images`]), and visited status
//!    to each place ([`crate::assemble`])
//! 4. Rendering the places into a single HTML page ([`crate::write`])
//!
//! Step 2 is the only one that talks to the outside world. Lookups go
//! through the [`geocode::Geocoder`] trait one at a time, spaced out to stay
//! within the public Nominatim usage policy, and every address is looked up
//! at most once per run. Addresses that can't be resolved end up at a default
//! coordinate instead of failing the build.
//!
//! [`build::build_map`] runs all four steps for a [`config::Config`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assemble;
pub mod build;
pub mod config;
pub mod geocode;
pub mod images;
pub mod parser;
pub mod place;
pub mod write;

mod util;
