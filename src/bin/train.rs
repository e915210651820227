/*!
Train the LSTM forecasting model on one ticker of the processed table
*/

use anyhow::format_err;
use chrono::NaiveDate;
use clap::{App, Arg, ArgMatches};
use std::path::{Path, PathBuf};
use stockcast::config::{PipelineConfig, TrainConfig};
use stockcast::pipeline::train_job;
use stockcast::util::{init_logger, DATE_FORMAT};
use tch::Device;

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| format_err!("Invalid date {:?}: {}", value, err))
}

fn parse_usize(matches: &ArgMatches, name: &str) -> anyhow::Result<Option<usize>> {
    matches
        .value_of(name)
        .map(|v| {
            usize::from_str_radix(v, 10).map_err(|err| format_err!("Invalid --{}: {}", name, err))
        })
        .transpose()
}

fn config_from_args(matches: &ArgMatches) -> anyhow::Result<TrainConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => PipelineConfig::load(Path::new(path))?.train,
        None => TrainConfig::default(),
    };
    if let Some(ticker) = matches.value_of("ticker") {
        config.target_ticker = ticker.to_string();
    }
    if let Some(processed) = matches.value_of("processed") {
        config.processed_data_path = PathBuf::from(processed);
    }
    if let Some(model) = matches.value_of("model") {
        config.model_save_path = PathBuf::from(model);
    }
    if let Some(forecast) = matches.value_of("forecast") {
        config.forecast_output_path = Some(PathBuf::from(forecast));
    }
    if let Some(date) = matches.value_of("train-end") {
        config.train_end_date = parse_date(date)?;
    }
    if let Some(date) = matches.value_of("test-start") {
        config.test_start_date = parse_date(date)?;
    }
    if let Some(sequence_length) = parse_usize(matches, "sequence-length")? {
        config.sequence_length = sequence_length;
    }
    if let Some(horizon) = parse_usize(matches, "horizon")? {
        config.forecast_horizon = horizon;
    }
    if let Some(epochs) = parse_usize(matches, "epochs")? {
        config.trainer.epochs = epochs;
    }
    if matches.is_present("quiet") {
        config.trainer.progress = false;
    }
    Ok(config)
}

fn value_arg<'a>(name: &'a str, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name).long(name).help(help).takes_value(true)
}

pub fn main() -> anyhow::Result<()> {
    let matches = App::new("stockcast train")
        .version("0.1")
        .about("Fits a two-layer LSTM to forecast the next adjusted close of one ticker")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .help("TOML configuration file; flags override its [train] table")
                .takes_value(true),
        )
        .arg(value_arg("ticker", "Ticker to forecast"))
        .arg(value_arg("processed", "Processed table written by ingest"))
        .arg(value_arg("model", "Output path for the trained model"))
        .arg(value_arg(
            "forecast",
            "Also write a forecast of --horizon trading days to this path",
        ))
        .arg(value_arg("train-end", "Last date of the training period (YYYY-MM-DD)"))
        .arg(value_arg("test-start", "First date of the test period (YYYY-MM-DD)"))
        .arg(value_arg("sequence-length", "Past values per input window"))
        .arg(value_arg("horizon", "Trading days to forecast"))
        .arg(value_arg("epochs", "Maximum number of training epochs"))
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Hide the progress bar"),
        )
        .arg(
            Arg::with_name("device")
                .short("d")
                .long("device")
                .help("Device to use: cuda, cpu. Defaults to cuda")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Sets the level of verbosity")
                .takes_value(true),
        )
        .get_matches();

    let verbosity = matches
        .value_of("verbose")
        .map(|v| usize::from_str_radix(v, 10))
        .unwrap_or(Ok(1))?;
    init_logger(verbosity);

    let device: Device = match matches.value_of("device").unwrap_or("cuda") {
        "cuda" => Device::cuda_if_available(),
        "cpu" => Device::Cpu,
        device => Err(format_err!("Invalid value for device: {:?}", device))?,
    };
    log::info!("Device: {:?}", device);

    let config = config_from_args(&matches)?;
    if let Some(report) = train_job(&config, device)? {
        println!(
            "Fit {} windows in {} epochs (best loss {:.6} at epoch {}); model saved to {}",
            report.windows,
            report.summary.epochs_run,
            report.summary.best_loss,
            report.summary.best_epoch,
            report.model_path.display()
        );
        if let Some(path) = report.forecast_path {
            println!("Forecast written to {}", path.display());
        }
    }
    Ok(())
}
