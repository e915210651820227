/*!
Forecast equity prices with a stacked LSTM, written in Rust using PyTorch bindings.

The crate is split into two batch jobs. The [ingestion job](pipeline::ingest) downloads daily
price data for a set of tickers, picks out one adjusted-close column per ticker and fills interior
gaps, writing a raw and a processed CSV table. The [training job](pipeline::training) windows one
ticker's series, fits a two-layer LSTM regression network to predict the next value and saves it.
*/
#![forbid(missing_docs)]

pub mod config;
pub mod data;
pub mod error;
pub mod lstm;
pub mod pipeline;
pub mod util;

pub use error::{Error, Result};

/// The floating point type to be used for CPU calculations
pub type CpuFloat = f64;

/// The floating point type to be used for GPU calculations
pub type GpuFloat = f32;
