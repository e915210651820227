/*!
Data processing and IO functions
*/
use crate::error::FetchError;
use crate::util::{parse_day, DATE_FORMAT};
use crate::{CpuFloat, Error, Result};
use chrono::NaiveDate;
use std::io::{Read, Write};
use std::str::FromStr;

pub mod fake;
pub mod raw;
pub mod resolve;
pub mod scale;
pub mod window;
pub mod yahoo;

pub use raw::{ColumnLabels, RawTable};

/// A source of daily market data
pub trait MarketData {
    /// Download a raw table for `tickers` between `start` (inclusive) and `end` (exclusive)
    fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError>;
}

impl<M: MarketData + ?Sized> MarketData for &M {
    fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        (**self).download(tickers, start, end)
    }
}

/// A daily price table: one row per date, one column per ticker. `NaN` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<CpuFloat>>,
}

impl PriceTable {
    /// Build a table from resolved columns over a raw index.
    ///
    /// The index is coerced to dates, rows are sorted by date, and rows sharing a date are merged
    /// keeping the first finite value of each column.
    pub fn from_columns(
        index: &[String],
        tickers: Vec<String>,
        columns: Vec<Vec<CpuFloat>>,
    ) -> Result<PriceTable> {
        assert_eq!(tickers.len(), columns.len(), "one column per ticker");
        let mut rows: Vec<(NaiveDate, usize)> = Vec::with_capacity(index.len());
        for (row, value) in index.iter().enumerate() {
            let date = parse_day(value).ok_or_else(|| Error::BadDate(value.clone()))?;
            rows.push((date, row));
        }
        // Stable, so duplicates stay in source order
        rows.sort_by_key(|&(date, _)| date);

        let mut dates: Vec<NaiveDate> = Vec::with_capacity(rows.len());
        let mut merged: Vec<Vec<CpuFloat>> = vec![Vec::with_capacity(rows.len()); columns.len()];
        for (date, row) in rows {
            if dates.last() == Some(&date) {
                for (out, column) in merged.iter_mut().zip(columns.iter()) {
                    let last = out.len() - 1;
                    if !out[last].is_finite() {
                        out[last] = column.get(row).copied().unwrap_or(CpuFloat::NAN);
                    }
                }
                continue;
            }
            dates.push(date);
            for (out, column) in merged.iter_mut().zip(columns.iter()) {
                out.push(column.get(row).copied().unwrap_or(CpuFloat::NAN));
            }
        }
        Ok(PriceTable {
            dates,
            tickers,
            columns: merged,
        })
    }

    /// The row dates, strictly increasing
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The column names, in order
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Get a ticker's column
    pub fn column(&self, ticker: &str) -> Option<&[CpuFloat]> {
        let ix = self.tickers.iter().position(|t| t == ticker)?;
        Some(&self.columns[ix])
    }

    /// Fill interior gaps of every column by linear interpolation between the nearest finite
    /// values, treating rows as equally spaced. Leading and trailing gaps are left as they are.
    pub fn interpolate(&mut self) {
        for column in self.columns.iter_mut() {
            interpolate_linear(column);
        }
    }

    /// Read a processed table: a `Date` column followed by one column per ticker
    pub fn read_csv<R: Read>(rdr: R) -> Result<PriceTable> {
        let mut rdr = csv::Reader::from_reader(rdr);
        let headers = rdr.headers()?.clone();
        let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        let mut index = Vec::new();
        let mut columns = vec![Vec::new(); tickers.len()];
        for record in rdr.records() {
            let record = record?;
            let mut fields = record.iter();
            index.push(fields.next().unwrap_or_default().to_string());
            for (column, field) in columns.iter_mut().zip(fields.chain(std::iter::repeat(""))) {
                column.push(parse_value(field));
            }
        }
        PriceTable::from_columns(&index, tickers, columns)
    }

    /// Write the table as CSV, leaving missing values empty.
    /// On success, return how many rows were written
    pub fn write_csv<W: Write>(&self, wtr: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(wtr);
        wtr.write_record(std::iter::once("Date").chain(self.tickers.iter().map(String::as_str)))?;
        for (row, date) in self.dates.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            record.extend(self.columns.iter().map(|column| format_value(column[row])));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(self.dates.len())
    }
}

/// Linearly interpolate the interior `NaN`s of a series in place
pub fn interpolate_linear(values: &mut [CpuFloat]) {
    let mut prev: Option<usize> = None;
    for ix in 0..values.len() {
        if !values[ix].is_finite() {
            continue;
        }
        if let Some(start) = prev {
            let gap = ix - start;
            if gap > 1 {
                let (lo, hi) = (values[start], values[ix]);
                for k in 1..gap {
                    values[start + k] = lo + (hi - lo) * (k as CpuFloat / gap as CpuFloat);
                }
            }
        }
        prev = Some(ix);
    }
}

/// Parse a table cell, mapping empty or unparseable cells to `NaN`
pub fn parse_value(field: &str) -> CpuFloat {
    CpuFloat::from_str(field.trim()).unwrap_or(CpuFloat::NAN)
}

/// Format a table cell, writing missing values as empty cells
pub fn format_value(value: CpuFloat) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
