//! Parses the two source documents: the places document (a flat bullet list
//! of `- Marker: value` lines) into [`Place`]s and the lunch log (dated
//! `###` headings) into [`VisitEntry`]s. Neither parser fails on malformed
//! input; lines that don't match are skipped. Only reading the files from
//! disk can fail, see [`load_places`] and [`load_lunch_log`].

use crate::place::{Place, VisitEntry};
use chrono::NaiveDate;
use pulldown_cmark::{Event, Parser, Tag};
use std::fmt;
use std::path::{Path, PathBuf};

const NAME_MARKER: &str = "- Name:";
const LOCATION_MARKER: &str = "- Location:";
const CUISINE_MARKER: &str = "- Cuisine:";
const PRICE_RANGE_MARKER: &str = "- Price range:";
const NOTE_MARKER: &str = "- Note:";
const PICS_MARKER: &str = "- pics:";

/// Separates the date from the place name in a lunch-log heading.
const HEADING_SEPARATOR: &str = " — ";
const LOCATION_LABEL: &str = "**Location:**";

/// Reads and parses the places document at `path`.
pub fn load_places(path: &Path) -> Result<Vec<Place>> {
    Ok(parse_places(&read(path)?))
}

/// Reads and parses the lunch log at `path`.
pub fn load_lunch_log(path: &Path) -> Result<Vec<VisitEntry>> {
    Ok(parse_lunch_log(&read(path)?))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::Read {
        path: path.to_owned(),
        err,
    })
}

/// Parses the places document. Each `- Name:` line starts a new [`Place`];
/// the other markers set a field on the most recently started place. For
/// example:
///
/// ```md
/// - Name: Munji
///   - Location: Oudevaartplaats 2
///   - Cuisine: Korean
///   - pics: pics/munji
/// ```
pub fn parse_places(input: &str) -> Vec<Place> {
    let mut places = Vec::new();
    let mut current: Option<Place> = None;

    for line in input.lines() {
        let line = line.trim();

        if let Some(name) = line.strip_prefix(NAME_MARKER) {
            if let Some(place) = current.take() {
                places.push(place);
            }
            current = Some(Place::new(name.trim()));
            continue;
        }

        // Markers ahead of the first name have nothing to attach to.
        let place = match current.as_mut() {
            Some(place) => place,
            None => continue,
        };

        let (field, value) = if let Some(value) = line.strip_prefix(LOCATION_MARKER) {
            (&mut place.address, value)
        } else if let Some(value) = line.strip_prefix(CUISINE_MARKER) {
            (&mut place.cuisine, value)
        } else if let Some(value) = line.strip_prefix(PRICE_RANGE_MARKER) {
            (&mut place.price_range, value)
        } else if let Some(value) = line.strip_prefix(NOTE_MARKER) {
            (&mut place.note, value)
        } else if let Some(value) = line.strip_prefix(PICS_MARKER) {
            (&mut place.pics, value)
        } else {
            continue;
        };
        *field = non_empty(value);
    }

    if let Some(place) = current {
        places.push(place);
    }
    places
}

/// Parses the lunch log. Every level-3 heading shaped like
/// `### 2024-01-01 — Cafe X` produces one [`VisitEntry`] in document order.
/// The first `- **Location:** ...` list item below the heading, up to the
/// next heading of level 3 or higher, becomes the entry's location
/// description.
///
/// The place name and location are cut from the source text as written, so a
/// name keeps any markdown characters it has in the places document.
pub fn parse_lunch_log(input: &str) -> Vec<VisitEntry> {
    let mut entries: Vec<VisitEntry> = Vec::new();

    // Index into `entries` of the entry whose block we are in.
    let mut open: Option<usize> = None;

    for (event, range) in Parser::new(input).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading(level)) if level <= 3 => {
                let text = heading_text(first_line(&input[range.start..]));
                open = match parse_heading(text).filter(|_| level == 3) {
                    Some(entry) => {
                        entries.push(entry);
                        Some(entries.len() - 1)
                    }
                    None => None,
                };
            }
            Event::Start(Tag::Item) => {
                if let Some(i) = open {
                    let entry = &mut entries[i];
                    if entry.location_description.is_none() {
                        entry.location_description =
                            location_description(first_line(&input[range.start..]));
                    }
                }
            }
            _ => {}
        }
    }

    entries
}

// The rest of the source line a block starts on.
fn first_line(source: &str) -> &str {
    source.lines().next().unwrap_or_default()
}

// Drops the `###` opening sequence. A trailing `#` stays: it is part of the
// name as the places document spells it.
fn heading_text(line: &str) -> &str {
    line.trim_start().trim_start_matches('#')
}

fn parse_heading(text: &str) -> Option<VisitEntry> {
    let (date, name) = text.trim().split_once(HEADING_SEPARATOR)?;
    let name = name.trim();
    if name.is_empty() || !is_iso_date(date) {
        return None;
    }
    Some(VisitEntry {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?,
        name: name.to_owned(),
        location_description: None,
    })
}

// chrono accepts single-digit months and days, so the `YYYY-MM-DD` shape is
// checked separately.
fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn location_description(item: &str) -> Option<String> {
    non_empty(strip_list_marker(item.trim_start()).strip_prefix(LOCATION_LABEL)?)
}

// Removes a `-`, `*`, `+` or `1.` list marker and the space after it.
fn strip_list_marker(line: &str) -> &str {
    let rest = match line.strip_prefix(|c: char| c == '-' || c == '*' || c == '+') {
        Some(rest) => rest,
        None => {
            let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
            match digits.strip_prefix(|c: char| c == '.' || c == ')') {
                Some(rest) if digits.len() < line.len() => rest,
                _ => return line,
            }
        }
    };
    match rest.strip_prefix(|c: char| c == ' ' || c == '\t') {
        Some(rest) => rest.trim_start(),
        None if rest.is_empty() => rest,
        None => line,
    }
}

fn non_empty(value: &str) -> Option<String> {
    match value.trim() {
        "" => None,
        value => Some(value.to_owned()),
    }
}

/// Represents the result of a parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a source document.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source document is missing or can't be read as UTF-8.
    Read { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "Reading source document '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
        }
    }
}
