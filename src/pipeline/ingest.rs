/*!
The ingestion job
*/
use super::ensure_parent;
use crate::config::IngestConfig;
use crate::data::resolve::adjusted_close;
use crate::data::{MarketData, PriceTable};
use crate::Result;
use log::{error, info};
use std::fs::File;
use std::io::BufWriter;

/// Download, resolve and gap-fill adjusted closes, writing the raw and processed tables.
///
/// Any failure aborts the job: a failed download is logged and propagated, and a table without
/// a usable price column for every ticker is a [`crate::Error::ColumnResolution`].
pub fn run_ingestion<S: MarketData>(source: &S, config: &IngestConfig) -> Result<PriceTable> {
    config.validate()?;
    info!(
        "Starting data ingestion for {:?} from {} to {}",
        config.tickers, config.start_date, config.end_date
    );
    ensure_parent(&config.raw_data_path)?;
    ensure_parent(&config.processed_data_path)?;

    let raw = source
        .download(&config.tickers, config.start_date, config.end_date)
        .map_err(|err| {
            error!("Error fetching raw data: {}", err);
            err
        })?;
    info!(
        "Raw data fetched: {} rows, {} {} columns",
        raw.index.len(),
        raw.labels.len(),
        raw.labels.shape()
    );

    let file = BufWriter::new(File::create(&config.raw_data_path)?);
    raw.write_csv(file)?;
    info!("Raw data saved to {}", config.raw_data_path.display());

    let columns = adjusted_close(&raw, &config.tickers)?;
    let mut table = PriceTable::from_columns(&raw.index, config.tickers.clone(), columns)?;
    table.interpolate();

    let file = BufWriter::new(File::create(&config.processed_data_path)?);
    let rows = table.write_csv(file)?;
    info!(
        "Processed adjusted close data ({} rows) saved to {}",
        rows,
        config.processed_data_path.display()
    );
    Ok(table)
}
