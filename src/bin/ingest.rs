/*!
Download daily prices and write the raw and processed tables
*/

use anyhow::format_err;
use chrono::NaiveDate;
use clap::{App, Arg, ArgMatches};
use std::path::{Path, PathBuf};
use stockcast::config::{IngestConfig, PipelineConfig};
use stockcast::data::fake::RandomWalk;
use stockcast::data::raw::CsvSource;
use stockcast::data::yahoo::YahooSource;
use stockcast::pipeline::run_ingestion;
use stockcast::util::{init_logger, DATE_FORMAT};

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| format_err!("Invalid date {:?}: {}", value, err))
}

fn config_from_args(matches: &ArgMatches) -> anyhow::Result<IngestConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => PipelineConfig::load(Path::new(path))?.ingest,
        None => IngestConfig::default(),
    };
    if let Some(tickers) = matches.values_of_lossy("TICKERS") {
        config.tickers = tickers;
    }
    if let Some(start) = matches.value_of("start") {
        config.start_date = parse_date(start)?;
    }
    if let Some(end) = matches.value_of("end") {
        config.end_date = parse_date(end)?;
    }
    if let Some(raw) = matches.value_of("raw") {
        config.raw_data_path = PathBuf::from(raw);
    }
    if let Some(processed) = matches.value_of("processed") {
        config.processed_data_path = PathBuf::from(processed);
    }
    Ok(config)
}

pub fn main() -> anyhow::Result<()> {
    let matches = App::new("stockcast ingest")
        .version("0.1")
        .about("Downloads daily prices and extracts one adjusted close column per ticker")
        .arg(
            Arg::with_name("TICKERS")
                .help("Tickers to download, in output column order")
                .multiple(true),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .help("TOML configuration file; flags override its [ingest] table")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("start")
                .long("start")
                .help("First date to download (YYYY-MM-DD, inclusive)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("end")
                .long("end")
                .help("Date to stop at (YYYY-MM-DD, exclusive)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("raw")
                .long("raw")
                .help("Output path for the raw table")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("processed")
                .long("processed")
                .help("Output path for the processed table")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .help("Data source: yahoo, fake, or a raw CSV file to replay. Defaults to yahoo")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .help("Seed for the fake source")
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

    let config = config_from_args(&matches)?;
    let table = match matches.value_of("source").unwrap_or("yahoo") {
        "yahoo" => run_ingestion(&YahooSource::new()?, &config)?,
        "fake" => {
            let seed = matches
                .value_of("seed")
                .map(|v| v.parse::<u64>())
                .unwrap_or(Ok(0))?;
            let source = RandomWalk {
                seed,
                ..Default::default()
            };
            run_ingestion(&source, &config)?
        }
        path => {
            if Path::new(path) == config.raw_data_path.as_path() {
                return Err(format_err!(
                    "Refusing to replay {} onto itself; pass a different --raw path",
                    path
                ));
            }
            let source = CsvSource { path: path.into() };
            run_ingestion(&source, &config)?
        }
    };
    println!(
        "Wrote {} rows of {} to {}",
        table.len(),
        table.tickers().join(", "),
        config.processed_data_path.display()
    );
    Ok(())
}
