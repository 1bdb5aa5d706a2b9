use std::{error::Error, path::Path};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info, LevelFilter};
use serde::Serialize;

use crate::{
    chamber::ChamberGeometry,
    compare_media,
    error::{SimulationError, SimulationResult},
    fluid::FluidProperties,
    simulation_parameters::RunConfig,
    statistics::{write_chamber_report, write_media_comparison, write_summary},
    write_statistics, CleaningSimulation,
};

const CARGO_PKG_AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

pub fn start() {
    let matches = App::new("Orifice Chamber Cleaning Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run cleaning simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the run configuration")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("STATISTICS_OUTPUT")
                        .long("output")
                        .short("o")
                        .required(false)
                        .takes_value(true)
                        .help("YAML file where the run statistics are written to"),
                )
                .arg(
                    Arg::with_name("TRAJECTORY_OUTPUT")
                        .long("trajectories")
                        .short("t")
                        .required(false)
                        .takes_value(true)
                        .help("YAML file where the recorded particle trajectories are written to"),
                )
                .arg(
                    Arg::with_name("DEPOSIT_OUTPUT")
                        .long("deposit")
                        .short("d")
                        .required(false)
                        .takes_value(true)
                        .help("YAML file where the final deposit map is written to"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                ),
        )
        .subcommand(
            SubCommand::with_name("compare")
                .about("Run the configuration once per cleaning medium and compare the results")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the run configuration")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            SubCommand::with_name("chamber")
                .about("Print grid plugging and pressure drop of the chamber")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the run configuration, the constants table is used without it")
                        .required(false)
                        .index(1),
                ),
        )
        .get_matches();

    init_logger(matches.occurrences_of("v"));

    let result = if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)
    } else if let Some(compare_matches) = matches.subcommand_matches("compare") {
        compare(compare_matches)
    } else if let Some(chamber_matches) = matches.subcommand_matches("chamber") {
        chamber(chamber_matches)
    } else {
        unreachable!()
    };

    if let Err(e) = result {
        error!("{}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

/// Without `-v` the level comes from `RUST_LOG`, defaulting to `warn`.
fn init_logger(verbosity: u64) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbosity {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        2 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

fn load_config(matches: &ArgMatches) -> SimulationResult<RunConfig> {
    let config_path = matches.value_of("SIMULATION_CONFIG").map(Path::new);
    let overwrite_path = matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new);
    let config = match config_path {
        Some(path) => RunConfig::from_yaml_file(path, overwrite_path)?,
        None => RunConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn write_yaml<T: Serialize>(path: &str, value: &T) -> SimulationResult<()> {
    let yaml = serde_yaml::to_string(value)?;
    std::fs::write(path, yaml).map_err(|e| SimulationError::io(path, e))?;
    info!("written `{}`", path);
    Ok(())
}

fn run(matches: &ArgMatches) -> SimulationResult<()> {
    let config = load_config(matches)?;
    info!("{:?}", config);

    let mut simulation = CleaningSimulation::new(config)?;
    let counters_enabled = matches.is_present("STATISTICS_ENABLED");
    if counters_enabled {
        simulation.enable_performance_counters();
    }

    let statistics = simulation.run();
    print!("{}", write_summary(&statistics));

    if counters_enabled {
        print!("{}", write_statistics(&simulation));
    }

    if let Some(path) = matches.value_of("STATISTICS_OUTPUT") {
        write_yaml(path, &statistics)?;
    }
    if let Some(path) = matches.value_of("TRAJECTORY_OUTPUT") {
        if simulation.trajectories().is_empty() {
            log::warn!("no trajectories recorded, enable `record_trajectories` in the configuration");
        }
        write_yaml(path, &simulation.trajectories())?;
    }
    if let Some(path) = matches.value_of("DEPOSIT_OUTPUT") {
        write_yaml(path, &simulation.deposit().snapshot())?;
    }

    Ok(())
}

fn compare(matches: &ArgMatches) -> SimulationResult<()> {
    let config = load_config(matches)?;
    let results = compare_media(&config)?;
    print!("{}", write_media_comparison(&results));
    Ok(())
}

fn chamber(matches: &ArgMatches) -> SimulationResult<()> {
    let config = load_config(matches)?;
    let chamber = ChamberGeometry::new(&config.chamber)?;
    let fluid = FluidProperties::new(config.flow.temperature, config.flow.pressure);

    print!(
        "{}",
        write_chamber_report(
            &chamber.plugging_statistics(),
            &chamber.grid_pressure_drops(&fluid, config.flow.inlet_velocity())
        )
    );
    Ok(())
}
