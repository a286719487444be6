//! Loads the `lunchmap.yaml` project file. [`Project`] is the file as
//! written (paths relative to the file); [`Config`] is the resolved form the
//! rest of the crate consumes.

use crate::place::Coordinates;
use crate::util::open;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROJECT_FILE: &str = "lunchmap.yaml";

const UNIVERSITY: Coordinates = Coordinates::new(51.2054, 4.4132);

#[derive(Deserialize)]
#[serde(default)]
struct Project {
    places: PathBuf,
    lunch_log: PathBuf,
    output: PathBuf,
    template: Option<PathBuf>,
    title: String,
    city: String,
    country: String,
    default_coordinates: Coordinates,
    reference: Reference,
    predefined: HashMap<String, Coordinates>,
    fallback: HashMap<String, Coordinates>,
    geocoder: GeocoderSettings,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            places: PathBuf::from("places.md"),
            lunch_log: PathBuf::from("lunch_log.md"),
            output: PathBuf::from("lunch_map.html"),
            template: None,
            title: String::from("Lunch Locations Map"),
            city: String::from("Antwerpen"),
            country: String::from("Belgium"),
            default_coordinates: Coordinates::new(51.2194, 4.4025),
            reference: Reference::default(),
            predefined: HashMap::new(),
            fallback: vec![(String::from("University of Antwerp"), UNIVERSITY)]
                .into_iter()
                .collect(),
            geocoder: GeocoderSettings::default(),
        }
    }
}

/// The fixed reference marker drawn on every map, typically the campus the
/// lunches start from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Reference {
    pub name: String,
    pub coordinates: Coordinates,

    /// Photo directory, relative to the project root.
    pub pics: Option<String>,
}

impl Default for Reference {
    fn default() -> Self {
        Reference {
            name: String::from("University of Antwerp"),
            coordinates: UNIVERSITY,
            pics: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeocoderSettings {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,

    /// Minimum spacing between two consecutive requests.
    pub request_interval_ms: u64,

    /// Slept after every request.
    pub settle_delay_ms: u64,

    /// Slept instead of `settle_delay_ms` after a failed request.
    pub failure_delay_ms: u64,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        GeocoderSettings {
            endpoint: String::from("https://nominatim.openstreetmap.org/search"),
            user_agent: String::from("LunchMap/1.0 (educational purpose)"),
            timeout_secs: 20,
            request_interval_ms: 1000,
            settle_delay_ms: 1000,
            failure_delay_ms: 2000,
        }
    }
}

impl GeocoderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }
}

pub struct Config {
    pub root_directory: PathBuf,
    pub places_file: PathBuf,
    pub lunch_log_file: PathBuf,
    pub output_file: PathBuf,
    pub template_file: Option<PathBuf>,
    pub title: String,
    pub city: String,
    pub country: String,
    pub default_coordinates: Coordinates,
    pub reference: Reference,

    /// Place name → coordinates. Places listed here are never geocoded.
    pub predefined: HashMap<String, Coordinates>,

    /// Address → coordinates, consulted before the geocoding service.
    pub fallback: HashMap<String, Coordinates>,
    pub geocoder: GeocoderSettings,
}

impl Config {
    /// Looks for `lunchmap.yaml` in `dir` and then in each of its ancestors.
    /// Without a project file, the defaults apply with `dir` as the root.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let mut candidate = Some(dir);
        while let Some(dir) = candidate {
            let path = dir.join(PROJECT_FILE);
            if path.exists() {
                return Config::from_project_file(&path)
                    .with_context(|| format!("Loading configuration from '{}'", path.display()));
            }
            candidate = dir.parent();
        }
        log::debug!(
            "No `{}` in '{}' or its parents; using defaults",
            PROJECT_FILE,
            dir.display()
        );
        Ok(Config::from_project(Project::default(), dir))
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Ok(Config::from_project(project, project_root)),
        }
    }

    /// The defaults, rooted at `dir`.
    pub fn defaults(dir: &Path) -> Config {
        Config::from_project(Project::default(), dir)
    }

    fn from_project(project: Project, project_root: &Path) -> Config {
        Config {
            root_directory: project_root.to_owned(),
            places_file: project_root.join(project.places),
            lunch_log_file: project_root.join(project.lunch_log),
            output_file: project_root.join(project.output),
            template_file: project.template.map(|t| project_root.join(t)),
            title: project.title,
            city: project.city,
            country: project.country,
            default_coordinates: project.default_coordinates,
            reference: project.reference,
            predefined: project.predefined,
            fallback: project.fallback,
            geocoder: project.geocoder,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::from_directory(dir.path())?;
        assert_eq!(dir.path(), config.root_directory);
        assert_eq!(dir.path().join("places.md"), config.places_file);
        assert_eq!(dir.path().join("lunch_log.md"), config.lunch_log_file);
        assert_eq!(dir.path().join("lunch_map.html"), config.output_file);
        assert_eq!(None, config.template_file);
        assert_eq!("Antwerpen", config.city);
        assert_eq!(Some(&UNIVERSITY), config.fallback.get("University of Antwerp"));
        assert!(config.predefined.is_empty());
        assert_eq!(Duration::from_secs(20), config.geocoder.timeout());
        assert_eq!(Duration::from_secs(1), config.geocoder.request_interval());
        Ok(())
    }

    #[test]
    fn test_project_file_in_parent_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "output: out/map.html\n\
             template: theme/custom.html\n\
             city: Gent\n\
             predefined:\n  Munji: [51.2214, 4.401]\n\
             reference:\n  name: Campus\n  coordinates: [1.5, 2.5]\n  pics: pics/campus\n\
             geocoder:\n  request_interval_ms: 0\n",
        )?;
        let nested = dir.path().join("notes").join("2024");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        assert_eq!(dir.path(), config.root_directory);
        assert_eq!(dir.path().join("out/map.html"), config.output_file);
        assert_eq!(
            Some(dir.path().join("theme/custom.html")),
            config.template_file
        );
        assert_eq!("Gent", config.city);
        assert_eq!("Belgium", config.country);
        assert_eq!(
            Some(&Coordinates::new(51.2214, 4.401)),
            config.predefined.get("Munji")
        );
        assert_eq!(
            Reference {
                name: "Campus".to_owned(),
                coordinates: Coordinates::new(1.5, 2.5),
                pics: Some("pics/campus".to_owned()),
            },
            config.reference
        );
        assert_eq!(Duration::ZERO, config.geocoder.request_interval());
        assert_eq!(Duration::from_millis(1000), config.geocoder.settle_delay());
        Ok(())
    }

    #[test]
    fn test_invalid_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "default_coordinates: nowhere\n")?;
        assert!(Config::from_directory(dir.path()).is_err());
        Ok(())
    }
}
