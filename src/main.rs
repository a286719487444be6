use anyhow::Result;
use clap::{App, Arg};
use log::error;
use lunchmap::build::build_map;
use lunchmap::config::Config;
use lunchmap::geocode::Nominatim;
use std::path::PathBuf;

fn logger() -> env_logger::Builder {
    let env = env_logger::Env::new()
        .filter_or("LUNCHMAP_LOG", "info")
        .write_style("LUNCHMAP_LOG_STYLE");
    env_logger::Builder::from_env(env)
}

fn main() {
    logger().init();
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("lunchmap")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Renders places and a lunch log onto an interactive map page")
        .arg(
            Arg::with_name("project")
                .short("p")
                .long("project")
                .value_name("DIR")
                .takes_value(true)
                .help("Directory holding lunchmap.yaml or the source documents [default: .]"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .takes_value(true)
                .help("Where to write the page, overriding the project setting"),
        )
        .arg(
            Arg::with_name("template")
                .short("t")
                .long("template")
                .value_name("FILE")
                .takes_value(true)
                .help("Page template to use instead of the built-in one"),
        )
        .get_matches();

    let project = PathBuf::from(matches.value_of("project").unwrap_or("."));
    let mut config = Config::from_directory(&project)?;
    if let Some(output) = matches.value_of("output") {
        config.output_file = PathBuf::from(output);
    }
    if let Some(template) = matches.value_of("template") {
        config.template_file = Some(PathBuf::from(template));
    }

    let summary = build_map(&config, Nominatim::new(&config.geocoder)?)?;
    println!(
        "Map created successfully with {} of {} places! Open {} in your browser.",
        summary.mapped,
        summary.places,
        config.output_file.display()
    );
    Ok(())
}
