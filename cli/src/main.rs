mod app_config;
mod app_error;
mod cmd_batch;
#[cfg(feature = "live")]
mod cmd_live;
#[cfg(feature = "live")]
mod cmd_list_ports;
mod script;
mod wav;

use std::str::FromStr;

use clap::{Arg, App, ArgMatches};
use log::*;

use looper::{ParseError, DEFAULT_BPM};

use crate::app_config::AppConfig;
use crate::app_error::AppError;

const DEFAULT_BLOCK_SIZE: usize = 512;

fn parse_option<T: FromStr>(sub_m: &ArgMatches, name: &str, default: T) -> Result<T, AppError>
    where ParseError: From<T::Err> {
    match sub_m.value_of(name) {
        Some(text) => text.parse::<T>()
            .map_err(|error| AppError::from(ParseError::from(error)))
            .map_err(|error| AppError::new(format!("--{}: {}", name, error))),
        None => Ok(default),
    }
}

fn app_config_from_args(sub_m: &ArgMatches) -> Result<AppConfig, AppError> {
    let bpm: f64 = parse_option(sub_m, "bpm", DEFAULT_BPM)?;
    if !(bpm > 0.0) {
        return Err(AppError::new(format!("--bpm: invalid tempo {}", bpm)));
    }
    let block_size: usize = parse_option(sub_m, "block-size", DEFAULT_BLOCK_SIZE)?;
    if block_size == 0 {
        return Err(AppError::new("--block-size: must be at least 1"));
    }

    let mut app_config = AppConfig::new(bpm, block_size);
    app_config.extra_loops = parse_option(sub_m, "loops", 0)?;
    Ok(app_config)
}

#[cfg(feature = "live")]
fn run_live(sub_m: &ArgMatches) -> Result<(), AppError> {
    let app_config = app_config_from_args(sub_m)?;
    cmd_live::run_live(&app_config, sub_m.value_of("input-device"), sub_m.value_of("output-device"))
}

#[cfg(not(feature = "live"))]
fn run_live(_sub_m: &ArgMatches) -> Result<(), AppError> {
    Err(AppError::new("This build has no audio device support (enable the `live` feature)"))
}

#[cfg(feature = "live")]
fn run_list_ports() -> Result<(), AppError> {
    cmd_list_ports::run_list_ports()
}

#[cfg(not(feature = "live"))]
fn run_list_ports() -> Result<(), AppError> {
    Err(AppError::new("This build has no audio device support (enable the `live` feature)"))
}

fn bpm_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("bpm")
        .long("bpm")
        .help("Beats per minute")
        .takes_value(true)
        .value_name("BPM")
}

fn main() {
    env_logger::init();

    let app_m = App::new("Looper")
        .version("1.0")
        .subcommand(App::new("batch")
            .about("Render a WAV file through the looper, driven by a script")
            .arg(Arg::with_name("input")
                 .long("input")
                 .short("i")
                 .help("Input WAV file")
                 .required(true)
                 .takes_value(true)
                 .value_name("FILE"))
            .arg(Arg::with_name("output")
                 .long("output")
                 .short("o")
                 .help("Output WAV file")
                 .required(true)
                 .takes_value(true)
                 .value_name("FILE"))
            .arg(Arg::with_name("script")
                 .long("script")
                 .short("s")
                 .help("Script of `<beat> <command>` lines")
                 .required(true)
                 .takes_value(true)
                 .value_name("FILE"))
            .arg(bpm_arg())
            .arg(Arg::with_name("block-size")
                 .long("block-size")
                 .help("Frames per processing block")
                 .takes_value(true)
                 .value_name("FRAMES"))
            .arg(Arg::with_name("loops")
                 .long("loops")
                 .help("Loop lengths to keep rendering after the input ends")
                 .takes_value(true)
                 .value_name("N")))
        .subcommand(App::new("live")
            .about("Loop live audio, reading commands from the terminal")
            .arg(Arg::with_name("input-device")
                 .long("input-device")
                 .short("i")
                 .help("Record audio from device")
                 .takes_value(true)
                 .value_name("NAME"))
            .arg(Arg::with_name("output-device")
                 .long("output-device")
                 .short("o")
                 .help("Play audio to device")
                 .takes_value(true)
                 .value_name("NAME"))
            .arg(bpm_arg()))
        .subcommand(App::new("list-ports")
            .about("List audio devices"))
        .get_matches();

    let result = match app_m.subcommand() {
        ("batch", Some(sub_m)) => {
            app_config_from_args(sub_m).and_then(|app_config| {
                // Required arguments, enforced by clap.
                let input = sub_m.value_of("input").unwrap_or_default();
                let output = sub_m.value_of("output").unwrap_or_default();
                let script = sub_m.value_of("script").unwrap_or_default();
                cmd_batch::run_batch(&app_config, input, output, script)
            })
        },
        ("live", Some(sub_m)) => run_live(sub_m),
        ("list-ports", Some(_)) => run_list_ports(),
        _ => Err(AppError::new(app_m.usage())),
    };

    if let Err(error) = result {
        error!("{}", error);
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}
