/*!
Job configuration.

Both jobs take an explicit configuration value. The defaults download TSLA, BND and SPY from mid
2015 to mid 2025 and forecast TSLA from 60-day windows.
*/
use crate::lstm::{ModelDesc, TrainerConfig};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for the ingestion job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Tickers to download, in the column order of the processed table
    pub tickers: Vec<String>,
    /// First date requested from the source (inclusive)
    pub start_date: NaiveDate,
    /// Last date requested from the source (exclusive)
    pub end_date: NaiveDate,
    /// Where the table returned by the source is written verbatim
    pub raw_data_path: PathBuf,
    /// Where the adjusted close table is written
    pub processed_data_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> IngestConfig {
        IngestConfig {
            tickers: vec!["TSLA".into(), "BND".into(), "SPY".into()],
            start_date: ymd(2015, 7, 1),
            end_date: ymd(2025, 7, 31),
            raw_data_path: "data/raw/financial_data.csv".into(),
            processed_data_path: "data/processed/adj_close.csv".into(),
        }
    }
}

impl IngestConfig {
    /// Check the options make sense before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            return Err(Error::Config("at least one ticker is required".into()));
        }
        let mut seen = HashSet::new();
        if let Some(ticker) = self.tickers.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(Error::Config(format!("ticker {} is listed more than once", ticker)));
        }
        if self.start_date >= self.end_date {
            return Err(Error::Config(format!(
                "start date {} is not before end date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

/// Options for the training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// The processed table written by the ingestion job
    pub processed_data_path: PathBuf,
    /// Where the trained model is saved
    pub model_save_path: PathBuf,
    /// Where to write a price forecast after training, if anywhere
    pub forecast_output_path: Option<PathBuf>,
    /// The ticker to forecast
    pub target_ticker: String,
    /// Last date of the conceptual training period. Not used to restrict the final fit.
    pub train_end_date: NaiveDate,
    /// First date of the conceptual test period
    pub test_start_date: NaiveDate,
    /// Number of past values in each input window
    pub sequence_length: usize,
    /// Number of trading days to forecast
    pub forecast_horizon: usize,
    /// Network architecture
    pub model: ModelDesc,
    /// Optimisation settings
    pub trainer: TrainerConfig,
}

impl Default for TrainConfig {
    fn default() -> TrainConfig {
        TrainConfig {
            processed_data_path: "data/processed/adj_close.csv".into(),
            model_save_path: "models/lstm_tsla_forecast_model.ot".into(),
            forecast_output_path: None,
            target_ticker: "TSLA".into(),
            train_end_date: ymd(2023, 12, 31),
            test_start_date: ymd(2024, 1, 1),
            sequence_length: 60,
            forecast_horizon: 252,
            model: ModelDesc::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Check the options make sense before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(Error::Config("sequence length must be positive".into()));
        }
        if self.target_ticker.trim().is_empty() {
            return Err(Error::Config("a target ticker is required".into()));
        }
        if self.trainer.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(Error::Config(format!(
                "dropout rate {} is outside [0, 1)",
                self.model.dropout
            )));
        }
        Ok(())
    }
}

/// A configuration file holding the options of both jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The `[ingest]` table
    pub ingest: IngestConfig,
    /// The `[train]` table
    pub train: TrainConfig,
}

impl PipelineConfig {
    /// Parse a TOML configuration
    pub fn from_toml(text: &str) -> Result<PipelineConfig> {
        toml::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }

    /// Read a TOML configuration file
    pub fn load(path: &Path) -> Result<PipelineConfig> {
        let text = fs::read_to_string(path)?;
        PipelineConfig::from_toml(&text)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
