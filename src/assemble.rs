//! Merges parsed places with coordinates, photos, and the lunch log.

use crate::geocode::GeocodeCache;
use crate::images::{discover_images, Links};
use crate::place::{Coordinates, Place, VisitEntry};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Enriches each place in order and returns the same places. A place gets
/// its coordinates from `predefined` by name, otherwise from `cache` by
/// address; images come from its `pics` directory under `image_root`, linked
/// through `links`; `visited` is set when some visit names it. Places are neither added nor
/// removed here.
pub fn assemble(
    places: Vec<Place>,
    visits: &[VisitEntry],
    predefined: &HashMap<String, Coordinates>,
    cache: &GeocodeCache,
    image_root: &Path,
    links: &Links,
) -> Vec<Place> {
    let visited: HashSet<&str> = visits.iter().map(|v| v.name.as_str()).collect();

    places
        .into_iter()
        .map(|mut place| {
            place.coordinates = match predefined.get(&place.name) {
                Some(&coordinates) => Some(coordinates),
                None => place
                    .address
                    .as_deref()
                    .and_then(|address| cache.coordinates(address)),
            };
            if let Some(pics) = &place.pics {
                let images = discover_images(image_root, pics);
                if !images.is_empty() {
                    place.images = Some(links.links(&images));
                }
            }
            place.visited = visited.contains(place.name.as_str());
            place
        })
        .collect()
}

/// The addresses that still need resolving: those of places without a
/// predefined coordinate, each listed once, in document order.
pub fn pending_addresses<'p>(
    places: &'p [Place],
    predefined: &HashMap<String, Coordinates>,
) -> Vec<&'p str> {
    let mut seen = HashSet::new();
    places
        .iter()
        .filter(|place| !predefined.contains_key(&place.name))
        .filter_map(|place| place.address.as_deref())
        .filter(|address| seen.insert(*address))
        .collect()
}
