/*!
Raw download tables, stored the way pandas writes them
*/
use super::{format_value, parse_value, MarketData};
use crate::error::FetchError;
use crate::util::parse_day;
use crate::{CpuFloat, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

/// The column labels of a raw table
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ColumnLabels {
    /// One string per column
    Flat(Vec<String>),
    /// A `(field, ticker)` pair per column, e.g. `("Adj Close", "TSLA")`
    TwoLevel(Vec<(String, String)>),
}

impl ColumnLabels {
    /// Number of columns labelled
    pub fn len(&self) -> usize {
        match self {
            ColumnLabels::Flat(labels) => labels.len(),
            ColumnLabels::TwoLevel(labels) => labels.len(),
        }
    }

    /// Whether there are no columns
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A short name for the label shape, for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            ColumnLabels::Flat(_) => "flat",
            ColumnLabels::TwoLevel(_) => "two-level",
        }
    }

    /// The lower-cased labels, with two-level parts joined by a space
    pub fn flattened(&self) -> Vec<String> {
        match self {
            ColumnLabels::Flat(labels) => labels.iter().map(|l| l.to_lowercase()).collect(),
            ColumnLabels::TwoLevel(labels) => labels
                .iter()
                .map(|(field, ticker)| {
                    [field.as_str(), ticker.as_str()]
                        .iter()
                        .map(|part| part.trim())
                        .filter(|part| !part.is_empty())
                        .join(" ")
                        .to_lowercase()
                })
                .collect(),
        }
    }
}

/// A table as returned by a market data source, before any cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// The row index, as the source wrote it
    pub index: Vec<String>,
    /// The column labels
    pub labels: ColumnLabels,
    /// Column-major values, `NaN` where missing
    pub columns: Vec<Vec<CpuFloat>>,
}

impl RawTable {
    /// Read a table written by [`RawTable::write_csv`] or by pandas' `DataFrame.to_csv`.
    ///
    /// Every row before the first dated row is a header row. A header row whose value cells are
    /// all empty names the index and is dropped. One remaining header row gives flat labels, two
    /// give two-level labels; with more, the first and last are used.
    pub fn read_csv<R: Read>(rdr: R) -> Result<RawTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);
        let mut headers: Vec<Vec<String>> = Vec::new();
        let mut index = Vec::new();
        let mut rows: Vec<Vec<CpuFloat>> = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let first = record.get(0).unwrap_or_default();
            if index.is_empty() && parse_day(first).is_none() {
                headers.push(record.iter().skip(1).map(|s| s.trim().to_string()).collect());
                continue;
            }
            index.push(first.to_string());
            rows.push(record.iter().skip(1).map(parse_value).collect());
        }
        headers.retain(|header| header.iter().any(|cell| !cell.is_empty()));

        let width = headers
            .iter()
            .map(Vec::len)
            .chain(rows.iter().map(Vec::len))
            .max()
            .unwrap_or(0);
        let cell = |header: &Vec<String>, ix: usize| header.get(ix).cloned().unwrap_or_default();
        let labels = match headers.as_slice() {
            [] => ColumnLabels::Flat((0..width).map(|ix| format!("Unnamed: {}", ix + 1)).collect()),
            [only] => ColumnLabels::Flat((0..width).map(|ix| cell(only, ix)).collect()),
            [fields, .., tickers] => ColumnLabels::TwoLevel(
                (0..width)
                    .map(|ix| (cell(fields, ix), cell(tickers, ix)))
                    .collect(),
            ),
        };
        let columns = (0..width)
            .map(|ix| {
                rows.iter()
                    .map(|row| row.get(ix).copied().unwrap_or(CpuFloat::NAN))
                    .collect()
            })
            .collect();
        Ok(RawTable {
            index,
            labels,
            columns,
        })
    }

    /// Write the table in pandas' CSV layout.
    /// On success, return how many rows were written
    pub fn write_csv<W: Write>(&self, wtr: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(wtr);
        match &self.labels {
            ColumnLabels::Flat(labels) => {
                wtr.write_record(std::iter::once("Date").chain(labels.iter().map(String::as_str)))?;
            }
            ColumnLabels::TwoLevel(labels) => {
                wtr.write_record(
                    std::iter::once("Price").chain(labels.iter().map(|(field, _)| field.as_str())),
                )?;
                wtr.write_record(
                    std::iter::once("Ticker")
                        .chain(labels.iter().map(|(_, ticker)| ticker.as_str())),
                )?;
                wtr.write_record(
                    std::iter::once("Date").chain(std::iter::repeat("").take(labels.len())),
                )?;
            }
        }
        for (row, date) in self.index.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(date.clone());
            record.extend(
                self.columns
                    .iter()
                    .map(|column| format_value(column.get(row).copied().unwrap_or(CpuFloat::NAN))),
            );
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(self.index.len())
    }

    /// Keep only the rows dated in `[start, end)`. Rows with unreadable dates are kept.
    pub fn restrict(&mut self, start: NaiveDate, end: NaiveDate) {
        let keep: Vec<bool> = self
            .index
            .iter()
            .map(|value| parse_day(value).map_or(true, |date| start <= date && date < end))
            .collect();
        let mut flags = keep.iter();
        self.index.retain(|_| *flags.next().unwrap_or(&true));
        for column in self.columns.iter_mut() {
            let mut flags = keep.iter();
            column.retain(|_| *flags.next().unwrap_or(&true));
        }
    }
}

/// Replay a raw table saved by an earlier ingestion instead of downloading it again
#[derive(Debug, Clone)]
pub struct CsvSource {
    /// The raw table file
    pub path: PathBuf,
}

impl MarketData for CsvSource {
    fn download(
        &self,
        _tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        let replay_error = |reason: String| FetchError::Replay {
            path: self.path.clone(),
            reason,
        };
        let file = File::open(&self.path).map_err(|err| replay_error(err.to_string()))?;
        let mut table = RawTable::read_csv(file).map_err(|err| replay_error(err.to_string()))?;
        table.restrict(start, end);
        Ok(table)
    }
}
