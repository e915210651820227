/*!
The training job
*/
use super::ensure_parent;
use crate::config::TrainConfig;
use crate::data::scale::MinMaxScaler;
use crate::data::window::SequenceWindows;
use crate::data::{format_value, PriceTable};
use crate::lstm::{Trainer, TrainingSummary};
use crate::util::{next_weekday, DATE_FORMAT};
use crate::{CpuFloat, Error, GpuFloat, Result};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tch::nn::VarStore;
use tch::Device;

/// The outcome of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// Usable rows of the target series
    pub rows: usize,
    /// Rows dated up to the training cut-off
    pub train_rows: usize,
    /// Rows dated from the test start onwards
    pub test_rows: usize,
    /// Number of sequence windows the model was fit on
    pub windows: usize,
    /// The scaler fitted on the whole series
    pub scaler: MinMaxScaler,
    /// What the optimiser did
    pub summary: TrainingSummary,
    /// Where the model was saved
    pub model_path: PathBuf,
    /// Where the forecast was written, if anywhere
    pub forecast_path: Option<PathBuf>,
}

/// A ticker's series with the boundary gaps interpolation could not fill removed
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSeries {
    /// Row dates
    pub dates: Vec<NaiveDate>,
    /// Prices
    pub values: Vec<CpuFloat>,
}

/// Read the processed table and pull out one ticker's series
pub fn load_target(path: &Path, ticker: &str) -> Result<TargetSeries> {
    let file = File::open(path).map_err(|err| Error::load(path, err))?;
    let table = PriceTable::read_csv(file).map_err(|err| Error::load(path, err))?;
    let column = table
        .column(ticker)
        .ok_or_else(|| Error::load(path, format!("no column for ticker {}", ticker)))?;

    let first = column.iter().position(|v| v.is_finite());
    let last = column.iter().rposition(|v| v.is_finite());
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(Error::load(
                path,
                format!("column {} holds no prices", ticker),
            ))
        }
    };
    let dropped = column.len() - (last - first + 1);
    if dropped > 0 {
        warn!(
            "Dropping {} leading/trailing rows of {} without a price",
            dropped, ticker
        );
    }
    let values = column[first..=last].to_vec();
    if let Some(gap) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::load(
            path,
            format!(
                "{} has an unfilled gap on {}",
                ticker,
                table.dates()[first + gap]
            ),
        ));
    }
    Ok(TargetSeries {
        dates: table.dates()[first..=last].to_vec(),
        values,
    })
}

/// Fit the forecasting model on every window of the target series and save it.
///
/// The train/test dates only split the rows conceptually; the final model sees everything.
pub fn run_training(config: &TrainConfig, device: Device) -> Result<TrainReport> {
    config.validate()?;
    info!("Starting model training for {}", config.target_ticker);
    let series = load_target(&config.processed_data_path, &config.target_ticker)?;
    info!(
        "Data loaded for {} from {}: {} rows",
        config.target_ticker,
        config.processed_data_path.display(),
        series.values.len()
    );

    let train_rows = series
        .dates
        .iter()
        .filter(|&&d| d <= config.train_end_date)
        .count();
    let test_rows = series
        .dates
        .iter()
        .filter(|&&d| d >= config.test_start_date)
        .count();
    info!(
        "{} rows up to {}, {} rows from {}; fitting on all rows",
        train_rows, config.train_end_date, test_rows, config.test_start_date
    );

    let scaler = MinMaxScaler::fit(&series.values).ok_or_else(|| {
        Error::load(&config.processed_data_path, "target series is empty")
    })?;
    let scaled: Vec<GpuFloat> = scaler
        .transform(&series.values)
        .into_iter()
        .map(|v| v as GpuFloat)
        .collect();
    let windows = SequenceWindows::new(&scaled, config.sequence_length)?;
    info!(
        "Built {} windows of {} values",
        windows.len(),
        config.sequence_length
    );

    tch::manual_seed(config.trainer.seed as i64);
    let vs = VarStore::new(device);
    let model = config.model.build(&vs, config.sequence_length);
    let trainer = Trainer::new(config.trainer.clone(), device);
    info!("Training LSTM model on full historical data");
    let summary = trainer.fit(&model, &vs, &windows)?;
    info!(
        "Training complete after {} epochs, best loss {:.6}",
        summary.epochs_run, summary.best_loss
    );

    ensure_parent(&config.model_save_path)?;
    vs.save(&config.model_save_path)?;
    info!(
        "Trained LSTM model saved to {}",
        config.model_save_path.display()
    );

    let forecast_path = match &config.forecast_output_path {
        Some(path) => {
            let seed = &scaled[scaled.len() - config.sequence_length..];
            let predictions = model.forecast(seed, config.forecast_horizon, device)?;
            let prices: Vec<CpuFloat> = predictions
                .into_iter()
                .map(|p| scaler.unscale(p as CpuFloat))
                .collect();
            let last_date = series.dates[series.dates.len() - 1];
            write_forecast(path, &config.target_ticker, last_date, &prices)?;
            info!(
                "{}-day forecast for {} saved to {}",
                config.forecast_horizon,
                config.target_ticker,
                path.display()
            );
            Some(path.clone())
        }
        None => None,
    };

    Ok(TrainReport {
        rows: series.values.len(),
        train_rows,
        test_rows,
        windows: windows.len(),
        scaler,
        summary,
        model_path: config.model_save_path.clone(),
        forecast_path,
    })
}

/// Run the training job. A table that cannot be loaded is reported and ends the job quietly
/// with `Ok(None)`; every other failure is returned.
pub fn train_job(config: &TrainConfig, device: Device) -> Result<Option<TrainReport>> {
    match run_training(config, device) {
        Ok(report) => Ok(Some(report)),
        Err(err @ Error::Load { .. }) => {
            error!("Error loading data: {}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Write forecast prices for the weekdays following `last_date`
fn write_forecast(
    path: &Path,
    ticker: &str,
    last_date: NaiveDate,
    prices: &[CpuFloat],
) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
    wtr.write_record(&["Date", ticker])?;
    let mut date = last_date;
    for price in prices {
        date = next_weekday(date);
        wtr.write_record(&[date.format(DATE_FORMAT).to_string(), format_value(*price)])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn processed(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn boundary_gaps_are_trimmed() {
        let file = processed(
            "Date,TSLA,BND\n\
             2024-01-02,,70\n\
             2024-01-03,10,71\n\
             2024-01-04,11,72\n\
             2024-01-05,,73\n",
        );
        let series = load_target(file.path(), "TSLA").unwrap();
        assert_eq!(series.values, vec![10.0, 11.0]);
        assert_eq!(
            series.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
            ]
        );
    }

    #[test]
    fn missing_ticker_is_a_load_error() {
        let file = processed("Date,BND\n2024-01-02,70\n");
        assert!(matches!(
            load_target(file.path(), "TSLA"),
            Err(Error::Load { .. })
        ));
    }

    #[test]
    fn interior_gap_is_a_load_error() {
        let file = processed("Date,TSLA\n2024-01-02,1\n2024-01-03,\n2024-01-04,3\n");
        assert!(matches!(
            load_target(file.path(), "TSLA"),
            Err(Error::Load { reason, .. }) if reason.contains("2024-01-03")
        ));
    }

    #[test]
    fn missing_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            processed_data_path: dir.path().join("absent.csv"),
            model_save_path: dir.path().join("model.ot"),
            ..Default::default()
        };
        assert!(matches!(train_job(&config, Device::Cpu), Ok(None)));
        assert!(!config.model_save_path.exists());
    }

    #[test]
    fn short_series_stops_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let file = processed("Date,TSLA\n2024-01-02,1\n2024-01-03,2\n2024-01-04,3\n");
        let config = TrainConfig {
            processed_data_path: file.path().to_path_buf(),
            model_save_path: dir.path().join("model.ot"),
            sequence_length: 3,
            ..Default::default()
        };
        assert!(matches!(
            train_job(&config, Device::Cpu),
            Err(Error::InsufficientData {
                rows: 3,
                sequence_length: 3
            })
        ));
        assert!(!config.model_save_path.exists());
    }

    #[test]
    fn forecast_dates_skip_weekends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("forecast.csv");
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        write_forecast(&path, "TSLA", friday, &[1.5, 2.5]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Date,TSLA\n2024-01-08,1.5\n2024-01-09,2.5\n"
        );
    }
}
