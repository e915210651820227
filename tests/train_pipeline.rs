/*!
Test the training job on a small synthetic table
*/
use chrono::NaiveDate;
use std::fs::{self, File};
use stockcast::config::{IngestConfig, TrainConfig};
use stockcast::data::fake::RandomWalk;
use stockcast::data::scale::MinMaxScaler;
use stockcast::data::{format_value, PriceTable};
use stockcast::lstm::{ModelDesc, TrainerConfig};
use stockcast::pipeline::{run_ingestion, train_job};
use stockcast::{CpuFloat, Error, GpuFloat};
use tch::Device;
use tempfile::{tempdir, TempDir};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ingest(dir: &TempDir) -> IngestConfig {
    let config = IngestConfig {
        tickers: vec!["TSLA".into(), "SPY".into()],
        start_date: day(2023, 1, 2),
        end_date: day(2023, 7, 1),
        raw_data_path: dir.path().join("raw.csv"),
        processed_data_path: dir.path().join("adj_close.csv"),
    };
    run_ingestion(&RandomWalk::default(), &config).unwrap();
    config
}

fn small(dir: &TempDir, ingest: &IngestConfig) -> TrainConfig {
    TrainConfig {
        processed_data_path: ingest.processed_data_path.clone(),
        model_save_path: dir.path().join("models").join("lstm.ot"),
        forecast_output_path: Some(dir.path().join("forecast.csv")),
        target_ticker: "TSLA".into(),
        train_end_date: day(2023, 4, 30),
        test_start_date: day(2023, 5, 1),
        sequence_length: 10,
        forecast_horizon: 5,
        model: ModelDesc {
            hidden: 8,
            ..Default::default()
        },
        trainer: TrainerConfig {
            epochs: 3,
            batch_size: 32,
            progress: false,
            ..Default::default()
        },
    }
}

#[test]
fn trains_saves_and_reloads() {
    let dir = tempdir().unwrap();
    let ingest = ingest(&dir);
    let config = small(&dir, &ingest);
    let report = train_job(&config, Device::Cpu).unwrap().expect("table loads");

    // 2023-01-02 to 2023-06-30 has 130 weekdays
    assert_eq!(report.rows, 130);
    assert_eq!(report.windows, 120);
    assert_eq!(report.train_rows + report.test_rows, 130);
    assert_eq!(report.summary.epochs_run, 3);
    assert_eq!(report.summary.losses.len(), 3);
    assert!(config.model_save_path.exists());

    // The saved model reproduces the forecast the trained model wrote
    let (_vs, model) = config
        .model
        .load(&config.model_save_path, config.sequence_length, Device::Cpu)
        .unwrap();
    let table = PriceTable::read_csv(File::open(&ingest.processed_data_path).unwrap()).unwrap();
    let scaled: Vec<GpuFloat> = report
        .scaler
        .transform(table.column("TSLA").unwrap())
        .into_iter()
        .map(|v| v as GpuFloat)
        .collect();
    let seed = &scaled[scaled.len() - config.sequence_length..];
    let expected: Vec<String> = model
        .forecast(seed, config.forecast_horizon, Device::Cpu)
        .unwrap()
        .into_iter()
        .map(|p| format_value(report.scaler.unscale(p as CpuFloat)))
        .collect();

    let forecast = fs::read_to_string(report.forecast_path.unwrap()).unwrap();
    let lines: Vec<&str> = forecast.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Date,TSLA");
    // 2023-06-30 is a Friday
    assert!(lines[1].starts_with("2023-07-03,"));
    assert!(lines[5].starts_with("2023-07-07,"));
    let written: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split(',').nth(1).unwrap())
        .collect();
    assert_eq!(written, expected);
}

#[test]
fn scaler_covers_the_target_only() {
    let dir = tempdir().unwrap();
    let ingest = ingest(&dir);
    let config = TrainConfig {
        forecast_output_path: None,
        ..small(&dir, &ingest)
    };
    let report = train_job(&config, Device::Cpu).unwrap().unwrap();
    let table = PriceTable::read_csv(File::open(&ingest.processed_data_path).unwrap()).unwrap();
    let expected = MinMaxScaler::fit(table.column("TSLA").unwrap()).unwrap();
    assert_eq!(report.scaler, expected);
    assert!(report.forecast_path.is_none());
}

#[test]
fn absent_ticker_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let ingest = ingest(&dir);
    let config = TrainConfig {
        target_ticker: "BND".into(),
        ..small(&dir, &ingest)
    };
    assert!(matches!(train_job(&config, Device::Cpu), Ok(None)));
    assert!(!config.model_save_path.exists());
}

#[test]
fn window_longer_than_series_is_insufficient() {
    let dir = tempdir().unwrap();
    let ingest = ingest(&dir);
    let config = TrainConfig {
        sequence_length: 130,
        ..small(&dir, &ingest)
    };
    assert!(matches!(
        train_job(&config, Device::Cpu),
        Err(Error::InsufficientData {
            rows: 130,
            sequence_length: 130
        })
    ));
}
