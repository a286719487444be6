//! Renders the map page. The assembled places are serialized to JSON and
//! handed to a [`Template`] together with the reference marker; the result
//! is rendered completely in memory before the output file is touched.

use crate::config::Reference;
use crate::place::Place;
use gtmpl::{Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

/// The page template used when the project doesn't name one.
pub const DEFAULT_TEMPLATE: &str = include_str!("../theme/map.html");

/// Everything a page template gets to see.
pub struct Page<'a> {
    pub title: &'a str,

    /// All assembled places. Only the ones with coordinates are rendered.
    pub places: &'a [Place],

    pub reference: &'a Reference,
    pub reference_images: &'a [String],
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value::Object`] with the keys `title`,
    /// `locations`, `reference`, and `reference_images`. All but `title` hold
    /// JSON text meant to be dropped into a `<script>` verbatim.
    fn to_value(&self) -> Result<Value> {
        let reference = serde_json::json!({
            "name": self.reference.name,
            "coordinates": self.reference.coordinates,
        });

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.to_owned()));
        m.insert(
            "locations".to_owned(),
            Value::String(locations_json(self.places)?),
        );
        m.insert(
            "reference".to_owned(),
            Value::String(script_safe(serde_json::to_string(&reference)?)),
        );
        m.insert(
            "reference_images".to_owned(),
            Value::String(script_safe(serde_json::to_string(self.reference_images)?)),
        );
        Ok(Value::Object(m))
    }
}

/// Serializes the places that have coordinates as a JSON array. Places
/// without coordinates can't be drawn and are left out.
pub fn locations_json(places: &[Place]) -> Result<String> {
    let located: Vec<&Place> = places
        .iter()
        .filter(|place| place.coordinates.is_some())
        .collect();
    Ok(script_safe(serde_json::to_string(&located)?))
}

// `</` can't appear inside a `<script>` element; `<\/` is the same string to
// a JSON parser.
fn script_safe(json: String) -> String {
    json.replace("</", "<\\/")
}

/// Loads the page template from `path`, or the built-in one.
pub fn load_template(path: Option<&Path>) -> Result<Template> {
    let contents = match path {
        None => DEFAULT_TEMPLATE.to_owned(),
        Some(path) => std::fs::read_to_string(path).map_err(|err| Error::OpenTemplateFile {
            path: path.to_owned(),
            err,
        })?,
    };
    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

/// Applies `template` to `page` and returns the document.
pub fn render(template: &Template, page: &Page) -> Result<String> {
    let mut out: Vec<u8> = Vec::new();
    template.execute(&mut out, &gtmpl::Context::from(page.to_value()?)?)?;
    Ok(String::from_utf8(out)?)
}

/// Writes `contents` to `path`, replacing any previous file. The page goes to
/// a sibling temporary file first and is renamed over `path`, so a failed
/// write leaves the previous page in place.
pub fn write_page(path: &Path, contents: &str) -> Result<()> {
    let io_err = |err| Error::Io {
        path: path.to_owned(),
        err,
    };
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let temp = partial_path(path);
    let result = std::fs::write(&temp, contents).and_then(|()| std::fs::rename(&temp, path));
    if result.is_err() {
        // Best effort; the write error is the one worth reporting.
        let _ = std::fs::remove_file(&temp);
    }
    result.map_err(io_err)
}

// `out/map.html` is staged as `out/.map.html.partial`.
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening the template file.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned for errors parsing the template.
    ParseTemplate(String),

    /// An error during templating.
    Template(String),

    /// Returned when the payload can't be serialized.
    Json(serde_json::Error),

    /// Returned when the rendered page isn't valid UTF-8.
    Encoding(FromUtf8Error),

    /// An error writing the output file.
    Io { path: PathBuf, err: io::Error },
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::Encoding(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "Parsing template: {}", err),
            Error::Template(err) => write!(f, "Rendering template: {}", err),
            Error::Json(err) => write!(f, "Serializing map data: {}", err),
            Error::Encoding(err) => write!(f, "Rendered page: {}", err),
            Error::Io { path, err } => write!(f, "Writing '{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
            Error::Json(err) => Some(err),
            Error::Encoding(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::place::Coordinates;

    fn places() -> Vec<Place> {
        let mut munji = Place::new("Munji");
        munji.address = Some("Oudevaartplaats 2".to_owned());
        munji.note = Some("closes at </script> o'clock".to_owned());
        munji.coordinates = Some(Coordinates::new(51.2214, 4.401));
        munji.visited = true;
        munji.images = Some(vec!["pics/munji/a.jpg".to_owned()]);

        let mut nowhere = Place::new("Nowhere");
        nowhere.address = Some("Unknown 1".to_owned());
        vec![munji, nowhere]
    }

    #[test]
    fn test_locations_json() -> Result<()> {
        let json = locations_json(&places())?;
        assert!(!json.contains("</"));

        let parsed: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(
            serde_json::json!([{
                "name": "Munji",
                "address": "Oudevaartplaats 2",
                "note": "closes at </script> o'clock",
                "coordinates": [51.2214, 4.401],
                "visited": true,
                "images": ["pics/munji/a.jpg"],
            }]),
            parsed
        );
        Ok(())
    }

    #[test]
    fn test_render() -> Result<()> {
        let mut template = Template::default();
        template
            .parse("{{.title}}|{{.locations}}|{{.reference}}|{{.reference_images}}")
            .map_err(Error::ParseTemplate)?;
        let places = places();
        let reference = Reference {
            name: "Campus".to_owned(),
            coordinates: Coordinates::new(1.5, 2.5),
            pics: None,
        };
        let images = vec!["pics/campus/x.png".to_owned()];
        let page = Page {
            title: "Lunch",
            places: &places,
            reference: &reference,
            reference_images: &images,
        };

        let rendered = render(&template, &page)?;
        let parts: Vec<&str> = rendered.split('|').collect();
        assert_eq!(4, parts.len());
        assert_eq!("Lunch", parts[0]);
        assert_eq!(locations_json(&places)?, parts[1]);
        assert_eq!(
            serde_json::json!({"name": "Campus", "coordinates": [1.5, 2.5]}),
            serde_json::from_str::<serde_json::Value>(parts[2])?
        );
        assert_eq!(r#"["pics/campus/x.png"]"#, parts[3]);
        Ok(())
    }

    #[test]
    fn test_default_template_embeds_payload() -> Result<()> {
        let template = load_template(None)?;
        let places = places();
        let page = Page {
            title: "Lunch Locations Map",
            places: &places,
            reference: &Reference::default(),
            reference_images: &[],
        };
        let rendered = render(&template, &page)?;
        assert!(rendered.contains(&format!("const locations = {};", locations_json(&places)?)));
        assert!(rendered.contains("const referenceImages = [];"));
        assert!(rendered.contains("<title>Lunch Locations Map</title>"));
        assert!(!rendered.contains("{{"));
        Ok(())
    }

    #[test]
    fn test_missing_template_file() {
        let path = Path::new("./no/such/template.html");
        assert!(matches!(
            load_template(Some(path)),
            Err(Error::OpenTemplateFile { .. })
        ));
    }

    #[test]
    fn test_write_page_overwrites() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out").join("map.html");
        write_page(&path, "a much longer first version").map_err(to_io)?;
        write_page(&path, "second").map_err(to_io)?;
        assert_eq!("second", std::fs::read_to_string(&path)?);
        assert!(!partial_path(&path).exists());
        Ok(())
    }

    #[test]
    fn test_failed_write_keeps_previous_page() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("map.html");
        write_page(&path, "first").map_err(to_io)?;

        // A directory in the staging spot makes the write fail.
        std::fs::create_dir(partial_path(&path))?;
        match write_page(&path, "second") {
            Err(Error::Io { path: p, .. }) => assert_eq!(path, p),
            other => panic!("wanted an I/O error, got {:?}", other),
        }
        assert_eq!("first", std::fs::read_to_string(&path)?);
        Ok(())
    }

    fn to_io(err: Error) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
