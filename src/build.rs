//! Exports the [`build_map`] function which stitches together the high-level
//! steps of building the map page: parsing the source documents
//! ([`crate::parser`]), resolving addresses ([`crate::geocode`]), enriching
//! the places ([`crate::assemble`]), and rendering the page
//! ([`crate::write`]).

use crate::assemble::{assemble, pending_addresses};
use crate::config::Config;
use crate::geocode::{GeocodeCache, Geocoder, Resolver};
use crate::images::{discover_images, Links};
use crate::parser::{load_lunch_log, load_places, Error as ParseError};
use crate::write::{load_template, render, write_page, Error as WriteError, Page};
use log::{info, warn};
use std::fmt;

/// Counts describing a finished build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub places: usize,
    pub visits: usize,

    /// Places drawn on the map.
    pub mapped: usize,

    /// Places left off the map for lack of coordinates.
    pub dropped: usize,
}

/// Builds the map page from a [`Config`], resolving addresses with
/// `geocoder`. Both source documents are loaded before anything else
/// happens, so a missing one fails the build without writing output.
pub fn build_map<G: Geocoder>(config: &Config, geocoder: G) -> Result<Summary> {
    build_map_with_cache(config, geocoder, GeocodeCache::new())
}

/// Like [`build_map`], but addresses already in `cache` are not geocoded
/// again.
pub fn build_map_with_cache<G: Geocoder>(
    config: &Config,
    geocoder: G,
    cache: GeocodeCache,
) -> Result<Summary> {
    info!("Loading location data...");
    let places = load_places(&config.places_file)?;
    let visits = load_lunch_log(&config.lunch_log_file)?;
    info!(
        "Found {} places and {} lunch log entries",
        places.len(),
        visits.len()
    );

    // Parse the template before spending time on geocoding.
    let template = load_template(config.template_file.as_deref())?;

    info!("Geocoding addresses...");
    let mut resolver = Resolver::new(geocoder, config).with_cache(cache);
    resolver.resolve(pending_addresses(&places, &config.predefined));
    let cache = resolver.into_cache();

    // Photos are linked relative to wherever the page ends up.
    let links = Links::new(&config.output_file);
    let places = assemble(
        places,
        &visits,
        &config.predefined,
        &cache,
        &config.root_directory,
        &links,
    );

    let mut summary = Summary {
        places: places.len(),
        visits: visits.len(),
        ..Summary::default()
    };
    for place in &places {
        match (&place.coordinates, &place.address) {
            (Some(_), _) => summary.mapped += 1,
            (None, Some(address)) => {
                summary.dropped += 1;
                warn!("Leaving '{}' off the map: '{}' has no coordinates", place.name, address);
            }
            (None, None) => {
                summary.dropped += 1;
                warn!("Leaving '{}' off the map: no address", place.name);
            }
        }
    }

    let reference_images = match &config.reference.pics {
        Some(pics) => links.links(&discover_images(&config.root_directory, pics)),
        None => Vec::new(),
    };

    info!("Generating map HTML...");
    let contents = render(
        &template,
        &Page {
            title: &config.title,
            places: &places,
            reference: &config.reference,
            reference_images: &reference_images,
        },
    )?;
    write_page(&config.output_file, &contents)?;
    info!(
        "Map with {} of {} places written to '{}'",
        summary.mapped,
        summary.places,
        config.output_file.display()
    );

    Ok(summary)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a map. Errors can happen loading the source
/// documents or rendering and writing the page; geocoding problems are never
/// fatal.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading the source documents.
    Parse(ParseError),

    /// Returned for errors rendering or writing the page.
    Write(WriteError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => fmt::Display::fmt(err, f),
            Error::Write(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Write(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}
