//! Resolves free-text addresses to [`Coordinates`]. The [`Resolver`] holds
//! the policy (fallback table, city qualifier, request spacing, default
//! coordinates for failures) and the per-run [`GeocodeCache`]; the actual
//! lookups go through the [`Geocoder`] trait so the network can be swapped
//! out. [`Nominatim`] is the implementation backed by an OpenStreetMap
//! Nominatim search endpoint.

use crate::config::{Config, GeocoderSettings};
use crate::place::Coordinates;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::iter::FromIterator;
use std::num::ParseFloatError;
use std::thread::sleep;
use std::time::{Duration, Instant};
use url::Url;

/// Looks up a single free-text query. `Ok(None)` means the service answered
/// but had no match.
pub trait Geocoder {
    fn geocode(&mut self, query: &str) -> Result<Option<Coordinates>>;
}

impl<G: Geocoder + ?Sized> Geocoder for &mut G {
    fn geocode(&mut self, query: &str) -> Result<Option<Coordinates>> {
        (**self).geocode(query)
    }
}

/// A blocking client for a Nominatim `/search` endpoint.
pub struct Nominatim {
    client: reqwest::blocking::Client,
    endpoint: Url,
}

/// The subset of a Nominatim search result we care about. Nominatim returns
/// coordinates as strings.
#[derive(Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl Nominatim {
    pub fn new(settings: &GeocoderSettings) -> Result<Nominatim> {
        Ok(Nominatim {
            client: reqwest::blocking::Client::builder()
                .user_agent(settings.user_agent.as_str())
                .timeout(settings.timeout())
                .build()?,
            endpoint: Url::parse(&settings.endpoint)?,
        })
    }
}

impl Geocoder for Nominatim {
    fn geocode(&mut self, query: &str) -> Result<Option<Coordinates>> {
        let url = Url::parse_with_params(
            self.endpoint.as_str(),
            &[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ],
        )?;
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        decode(status, &response.text()?)
    }
}

/// Reads the first hit out of a Nominatim search response.
fn decode(status: StatusCode, body: &str) -> Result<Option<Coordinates>> {
    if !status.is_success() {
        return Err(Error::Status(status));
    }
    let results: Vec<SearchResult> = serde_json::from_str(body)?;
    match results.first() {
        None => Ok(None),
        Some(result) => Ok(Some(Coordinates::new(
            result.lat.trim().parse()?,
            result.lon.trim().parse()?,
        ))),
    }
}

/// Enforces a minimum spacing between consecutive calls.
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Throttle {
        Throttle {
            interval,
            last: None,
        }
    }

    /// Blocks until at least `interval` has passed since the previous `wait`
    /// returned. Called right before each request, this spaces out the
    /// starts of consecutive requests; time spent inside a request counts
    /// toward the interval.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Appends `", {city}, {country}"` to addresses that mention neither. An
/// empty city or country counts as not configured and is left out of both
/// the check and the suffix.
pub struct Qualifier {
    parts: Vec<String>,
}

impl Qualifier {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Qualifier {
        let parts: Vec<String> = vec![city.into(), country.into()];
        Qualifier {
            parts: parts
                .into_iter()
                .map(|part| part.trim().to_owned())
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }

    pub fn qualify<'a>(&self, address: &'a str) -> Cow<'a, str> {
        if self.parts.is_empty() || self.parts.iter().any(|part| address.contains(part.as_str())) {
            Cow::Borrowed(address)
        } else {
            Cow::Owned(format!("{}, {}", address, self.parts.join(", ")))
        }
    }
}

/// Where a cached coordinate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// The address is a key of the fallback table.
    Fallback,

    /// The geocoding service found the address.
    Geocoded,

    /// Geocoding failed; the coordinates are the configured default.
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub coordinates: Coordinates,
    pub source: Source,
}

/// Address → coordinates for one run. Every address is resolved at most
/// once; later lookups are answered from here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeocodeCache(BTreeMap<String, Resolution>);

impl GeocodeCache {
    pub fn new() -> GeocodeCache {
        GeocodeCache::default()
    }

    pub fn get(&self, address: &str) -> Option<&Resolution> {
        self.0.get(address)
    }

    pub fn coordinates(&self, address: &str) -> Option<Coordinates> {
        self.get(address).map(|r| r.coordinates)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains_key(address)
    }

    pub fn insert(&mut self, address: impl Into<String>, resolution: Resolution) {
        self.0.insert(address.into(), resolution);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.0.iter().map(|(address, r)| (address.as_str(), r))
    }
}

impl<S: Into<String>> FromIterator<(S, Coordinates)> for GeocodeCache {
    /// Builds a cache of already-geocoded addresses, e.g. from fixtures.
    fn from_iter<I: IntoIterator<Item = (S, Coordinates)>>(iter: I) -> GeocodeCache {
        let mut cache = GeocodeCache::new();
        for (address, coordinates) in iter {
            cache.insert(
                address,
                Resolution {
                    coordinates,
                    source: Source::Geocoded,
                },
            );
        }
        cache
    }
}

/// Resolves addresses in order: fallback table, then the [`Geocoder`], then
/// the default coordinates for whatever failed.
pub struct Resolver<'a, G> {
    geocoder: G,
    fallback: &'a HashMap<String, Coordinates>,
    qualifier: Qualifier,
    default_coordinates: Coordinates,
    throttle: Throttle,
    settle_delay: Duration,
    failure_delay: Duration,
    cache: GeocodeCache,
}

impl<'a, G: Geocoder> Resolver<'a, G> {
    pub fn new(geocoder: G, config: &'a Config) -> Resolver<'a, G> {
        Resolver {
            geocoder,
            fallback: &config.fallback,
            qualifier: Qualifier::new(config.city.as_str(), config.country.as_str()),
            default_coordinates: config.default_coordinates,
            throttle: Throttle::new(config.geocoder.request_interval()),
            settle_delay: config.geocoder.settle_delay(),
            failure_delay: config.geocoder.failure_delay(),
            cache: GeocodeCache::new(),
        }
    }

    /// Seeds the resolver with already-known addresses. These are never sent
    /// to the geocoder.
    pub fn with_cache(mut self, cache: GeocodeCache) -> Resolver<'a, G> {
        self.cache = cache;
        self
    }

    /// Resolves every address not already in the cache and returns the
    /// cache. Failed addresses get the default coordinates only after all
    /// addresses have been attempted; they're not retried.
    pub fn resolve<'s>(&mut self, addresses: impl IntoIterator<Item = &'s str>) -> &GeocodeCache {
        let mut failed: Vec<&str> = Vec::new();

        for address in addresses {
            if self.cache.contains(address) || failed.contains(&address) {
                continue;
            }

            if let Some(&coordinates) = self.fallback.get(address) {
                info!("Using fallback coordinates for '{}'", address);
                self.cache.insert(
                    address,
                    Resolution {
                        coordinates,
                        source: Source::Fallback,
                    },
                );
                continue;
            }

            let query = self.qualifier.qualify(address);
            info!("Geocoding '{}'", query);
            self.throttle.wait();
            match self.geocoder.geocode(&query) {
                Ok(Some(coordinates)) => {
                    info!("Geocoded '{}' to {}", address, coordinates);
                    self.cache.insert(
                        address,
                        Resolution {
                            coordinates,
                            source: Source::Geocoded,
                        },
                    );
                    pause(self.settle_delay);
                }
                Ok(None) => {
                    warn!("No geocoding result for '{}'", address);
                    failed.push(address);
                    pause(self.failure_delay);
                }
                Err(e) => {
                    warn!("Geocoding failed for '{}': {}", address, e);
                    failed.push(address);
                    pause(self.failure_delay);
                }
            }
        }

        for address in failed {
            warn!(
                "Using default coordinates {} for '{}'",
                self.default_coordinates, address
            );
            self.cache.insert(
                address,
                Resolution {
                    coordinates: self.default_coordinates,
                    source: Source::Default,
                },
            );
        }

        &self.cache
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn into_cache(self) -> GeocodeCache {
        self.cache
    }
}

fn pause(delay: Duration) {
    if delay > Duration::ZERO {
        sleep(delay);
    }
}

/// The result of a fallible geocoding operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error talking to the geocoding service.
#[derive(Debug)]
pub enum Error {
    /// Returned for transport errors and timeouts.
    Http(reqwest::Error),

    /// Returned when the service answers with a non-success status.
    Status(StatusCode),

    /// Returned when the response body isn't a list of search results.
    Json(serde_json::Error),

    /// Returned when the configured endpoint isn't a valid URL.
    Url(url::ParseError),

    /// Returned when the service answers with a non-numeric coordinate.
    InvalidCoordinate(ParseFloatError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(err) => write!(f, "Geocoding request failed: {}", err),
            Error::Status(status) => write!(f, "Geocoding service answered {}", status),
            Error::Json(err) => write!(f, "Undecodable geocoding response: {}", err),
            Error::Url(err) => write!(f, "Invalid geocoder endpoint: {}", err),
            Error::InvalidCoordinate(err) => write!(f, "Invalid coordinate in response: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::Status(_) => None,
            Error::Json(err) => Some(err),
            Error::Url(err) => Some(err),
            Error::InvalidCoordinate(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}

impl From<ParseFloatError> for Error {
    fn from(err: ParseFloatError) -> Error {
        Error::InvalidCoordinate(err)
    }
}
