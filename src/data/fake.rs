/*!
Generate fake daily price tables, for testing purposes and offline runs
*/
use super::{ColumnLabels, MarketData, RawTable};
use crate::error::FetchError;
use crate::util::{next_weekday, DATE_FORMAT};
use crate::CpuFloat;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// The fields generated per ticker, in the order newer Yahoo downloads use
pub const FIELDS: [&str; 5] = ["Close", "High", "Low", "Open", "Volume"];

/// Generate prices using a geometric random walk over weekdays.
///
/// The table has the two-level `(field, ticker)` shape without an `Adj Close` group. The seed is
/// mixed with each ticker's name, so a ticker's series does not depend on the other tickers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RandomWalk {
    /// The RNG seed
    pub seed: u64,
    /// The price on the first day
    pub start_price: CpuFloat,
    /// Mean daily log return
    pub drift: CpuFloat,
    /// Standard deviation of the daily log return
    pub volatility: CpuFloat,
    /// Probability that a close is reported as missing
    pub missing_rate: f64,
}

impl Default for RandomWalk {
    fn default() -> RandomWalk {
        RandomWalk {
            seed: 0,
            start_price: 100.0,
            drift: 0.0003,
            volatility: 0.02,
            missing_rate: 0.0,
        }
    }
}

impl RandomWalk {
    fn ticker_rng(&self, ticker: &str) -> StdRng {
        let mixed = ticker
            .bytes()
            .fold(self.seed ^ 0x9e37_79b9_7f4a_7c15, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });
        StdRng::seed_from_u64(mixed)
    }

    /// Generate `(close, high, low, open, volume)` columns for one ticker over `days` rows
    fn walk(&self, ticker: &str, days: usize) -> Result<[Vec<CpuFloat>; 5], FetchError> {
        let returns = Normal::new(self.drift, self.volatility)
            .map_err(|err| FetchError::InvalidRequest(format!("bad volatility: {:?}", err)))?;
        let mut rng = self.ticker_rng(ticker);
        let mut price = self.start_price;
        let mut columns: [Vec<CpuFloat>; 5] = Default::default();
        for _ in 0..days {
            let open = price;
            price *= returns.sample(&mut rng).exp();
            let spread = (open - price).abs() + price * self.volatility * rng.gen::<CpuFloat>();
            let close = if rng.gen_bool(self.missing_rate.max(0.0).min(1.0)) {
                CpuFloat::NAN
            } else {
                price
            };
            columns[0].push(close);
            columns[1].push(open.max(price) + spread / 2.0);
            columns[2].push(open.min(price) - spread / 2.0);
            columns[3].push(open);
            columns[4].push(rng.gen_range(1e5 as CpuFloat, 1e7).round());
        }
        Ok(columns)
    }
}

impl MarketData for RandomWalk {
    fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        if tickers.is_empty() {
            return Err(FetchError::InvalidRequest("no tickers requested".into()));
        }
        let mut dates = Vec::new();
        let mut day = start;
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day = next_weekday(day);
        }
        while day < end {
            dates.push(day);
            day = next_weekday(day);
        }

        let mut sorted: Vec<&String> = tickers.iter().collect();
        sorted.sort();
        sorted.dedup();
        let walks = sorted
            .iter()
            .map(|ticker| self.walk(ticker, dates.len()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut labels = Vec::with_capacity(FIELDS.len() * sorted.len());
        let mut columns = Vec::with_capacity(FIELDS.len() * sorted.len());
        for (field_ix, field) in FIELDS.iter().enumerate() {
            for (ticker, walk) in sorted.iter().zip(walks.iter()) {
                labels.push((field.to_string(), ticker.to_string()));
                columns.push(walk[field_ix].clone());
            }
        }
        Ok(RawTable {
            index: dates
                .iter()
                .map(|d| d.format(DATE_FORMAT).to_string())
                .collect(),
            labels: ColumnLabels::TwoLevel(labels),
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekdays_only() {
        let table = RandomWalk::default()
            .download(&["SPY".to_string()], day(2024, 1, 6), day(2024, 1, 16))
            .unwrap();
        assert_eq!(
            table.index,
            vec![
                "2024-01-08",
                "2024-01-09",
                "2024-01-10",
                "2024-01-11",
                "2024-01-12",
                "2024-01-15"
            ]
        );
        assert_eq!(table.labels.len(), FIELDS.len());
        assert!(table.columns.iter().all(|c| c.len() == 6));
    }

    #[test]
    fn ticker_series_are_independent_and_reproducible() {
        let walk = RandomWalk {
            seed: 7,
            ..Default::default()
        };
        let (start, end) = (day(2023, 1, 1), day(2023, 3, 1));
        let alone = walk.download(&["TSLA".to_string()], start, end).unwrap();
        let together = walk
            .download(&["TSLA".to_string(), "BND".to_string()], start, end)
            .unwrap();
        // Columns are field-major over sorted tickers: BND, TSLA
        assert_eq!(
            together.labels,
            ColumnLabels::TwoLevel(vec![
                ("Close".into(), "BND".into()),
                ("Close".into(), "TSLA".into()),
                ("High".into(), "BND".into()),
                ("High".into(), "TSLA".into()),
                ("Low".into(), "BND".into()),
                ("Low".into(), "TSLA".into()),
                ("Open".into(), "BND".into()),
                ("Open".into(), "TSLA".into()),
                ("Volume".into(), "BND".into()),
                ("Volume".into(), "TSLA".into()),
            ])
        );
        assert_eq!(alone.columns[0], together.columns[1]);
        assert!(alone.columns[0].iter().all(|p| *p > 0.0));
    }

    #[test]
    fn missing_rate_drops_closes() {
        let walk = RandomWalk {
            missing_rate: 1.0,
            ..Default::default()
        };
        let table = walk
            .download(&["BND".to_string()], day(2024, 1, 1), day(2024, 2, 1))
            .unwrap();
        assert!(table.columns[0].iter().all(|c| c.is_nan()));
        assert!(table.columns[3].iter().all(|o| o.is_finite()));
    }
}
