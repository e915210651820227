/*!
Locate one adjusted close column per ticker in a raw download.

Sources disagree on how they label prices: `Adj Close`, `Close`, `Price`, flat strings or
`(field, ticker)` pairs. The label shape is inspected once to gather candidate columns, then a
single token predicate ranks every candidate the same way.
*/
use super::raw::{ColumnLabels, RawTable};
use crate::error::ColumnResolutionError;
use crate::CpuFloat;
use itertools::Itertools;

/// Price-like label tokens, most preferred first
pub const PRICE_TOKENS: [&str; 5] = ["adj close", "adj", "adjusted", "close", "price"];

/// The top-level group holding adjusted closes in a two-level table
pub const ADJ_CLOSE_GROUP: &str = "Adj Close";

/// The rank of the first price token a flattened, lower-cased label contains
pub fn price_rank(flattened: &str) -> Option<usize> {
    PRICE_TOKENS.iter().position(|token| flattened.contains(token))
}

/// A column which might hold a ticker's price
#[derive(Debug, Clone, Eq, PartialEq)]
struct Candidate {
    column: usize,
    rank: usize,
    name: String,
    /// The label says nothing about which ticker it belongs to
    anonymous: bool,
}

fn candidates(labels: &ColumnLabels, tickers: &[String]) -> Vec<Candidate> {
    let flattened = labels.flattened();
    match labels {
        ColumnLabels::TwoLevel(pairs) => {
            let group: Vec<Candidate> = pairs
                .iter()
                .enumerate()
                .filter(|(_, (field, _))| field == ADJ_CLOSE_GROUP)
                .map(|(column, (_, ticker))| Candidate {
                    column,
                    rank: 0,
                    name: ticker.clone(),
                    anonymous: ticker.trim().is_empty(),
                })
                .collect();
            if !group.is_empty() {
                return group;
            }
            pairs
                .iter()
                .zip(flattened.iter())
                .enumerate()
                .filter_map(|(column, ((field, ticker), flat))| {
                    let rank = price_rank(flat)?;
                    let name = tickers
                        .iter()
                        .find(|t| *t == field || *t == ticker)
                        .cloned()
                        .unwrap_or_else(|| {
                            [field, ticker]
                                .iter()
                                .map(|part| part.trim())
                                .filter(|part| !part.is_empty())
                                .join("_")
                        });
                    Some(Candidate {
                        column,
                        rank,
                        name,
                        anonymous: ticker.trim().is_empty(),
                    })
                })
                .collect()
        }
        ColumnLabels::Flat(labels) => labels
            .iter()
            .zip(flattened.iter())
            .enumerate()
            .filter_map(|(column, (label, flat))| {
                let rank = price_rank(flat)?;
                let rest = strip_price_tokens(label);
                let name = tickers
                    .iter()
                    .find(|t| t.eq_ignore_ascii_case(&rest))
                    .cloned()
                    .unwrap_or_else(|| rest.clone());
                Some(Candidate {
                    column,
                    rank,
                    anonymous: rest.is_empty(),
                    name,
                })
            })
            .collect(),
    }
}

/// Remove every price token from a label, leaving whatever identifies the ticker
fn strip_price_tokens(label: &str) -> String {
    let mut tokens = PRICE_TOKENS;
    tokens.sort_by_key(|token| std::cmp::Reverse(token.len()));
    let mut label = label.to_string();
    for token in tokens.iter() {
        while let Some(pos) = label.to_ascii_lowercase().find(token) {
            label.replace_range(pos..pos + token.len(), " ");
        }
    }
    label
        .trim_matches(|c: char| c.is_whitespace() || "_-.:()".contains(c))
        .to_string()
}

/// Pick the column index of each ticker's price, in ticker order
pub fn select_columns(
    labels: &ColumnLabels,
    tickers: &[String],
) -> Result<Vec<usize>, ColumnResolutionError> {
    let candidates = candidates(labels, tickers);
    if candidates.is_empty() {
        return Err(ColumnResolutionError::NoPriceColumn {
            shape: labels.shape(),
        });
    }
    let best = |filter: &dyn Fn(&Candidate) -> bool| {
        candidates
            .iter()
            .filter(|c| filter(c))
            .min_by_key(|c| (c.rank, c.column))
            .map(|c| c.column)
    };
    tickers
        .iter()
        .map(|ticker| {
            best(&|c: &Candidate| &c.name == ticker)
                .or_else(|| {
                    if tickers.len() != 1 {
                        return None;
                    }
                    best(&|c: &Candidate| c.anonymous).or_else(|| match labels {
                        // With one ticker requested, the best flat price column is its own
                        // whatever else the label says
                        ColumnLabels::Flat(_) => best(&|_: &Candidate| true),
                        ColumnLabels::TwoLevel(_) => None,
                    })
                })
                .ok_or_else(|| ColumnResolutionError::MissingTicker(ticker.clone()))
        })
        .collect()
}

/// Extract each ticker's adjusted close column from a raw table, in ticker order
pub fn adjusted_close(
    raw: &RawTable,
    tickers: &[String],
) -> Result<Vec<Vec<CpuFloat>>, ColumnResolutionError> {
    let selected = select_columns(&raw.labels, tickers)?;
    Ok(selected
        .into_iter()
        .map(|column| raw.columns[column].clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn two_level(pairs: &[(&str, &str)]) -> ColumnLabels {
        ColumnLabels::TwoLevel(
            pairs
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
        )
    }

    fn flat(labels: &[&str]) -> ColumnLabels {
        ColumnLabels::Flat(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn adj_close_group_in_requested_order() {
        let labels = two_level(&[
            ("Adj Close", "BND"),
            ("Adj Close", "SPY"),
            ("Adj Close", "TSLA"),
            ("Close", "BND"),
            ("Close", "SPY"),
            ("Close", "TSLA"),
            ("Volume", "BND"),
            ("Volume", "SPY"),
            ("Volume", "TSLA"),
        ]);
        assert_eq!(
            select_columns(&labels, &tickers(&["TSLA", "BND", "SPY"])),
            Ok(vec![2, 0, 1])
        );
    }

    #[test]
    fn adj_close_group_beats_earlier_close_columns() {
        let labels = two_level(&[("Close", "TSLA"), ("Open", "TSLA"), ("Adj Close", "TSLA")]);
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![2]));
    }

    #[test]
    fn adj_close_group_is_used_exclusively() {
        let labels = two_level(&[("Adj Close", "TSLA"), ("Close", "SPY")]);
        assert_eq!(
            select_columns(&labels, &tickers(&["TSLA", "SPY"])),
            Err(ColumnResolutionError::MissingTicker("SPY".into()))
        );
    }

    #[test]
    fn two_level_falls_back_to_close() {
        let labels = two_level(&[
            ("Close", "SPY"),
            ("Close", "TSLA"),
            ("High", "SPY"),
            ("High", "TSLA"),
            ("Volume", "SPY"),
            ("Volume", "TSLA"),
        ]);
        assert_eq!(
            select_columns(&labels, &tickers(&["TSLA", "SPY"])),
            Ok(vec![1, 0])
        );
    }

    #[test]
    fn two_level_unknown_tickers_get_synthesized_names() {
        let labels = two_level(&[("Close", "AAPL"), ("Price", "")]);
        let found = candidates(&labels, &tickers(&["TSLA"]));
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Close_AAPL", "Price"]);
        // Only the column without a ticker stands in for a single ticker
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![1]));
        assert_eq!(
            select_columns(&labels, &tickers(&["TSLA", "MSFT"])),
            Err(ColumnResolutionError::MissingTicker("TSLA".into()))
        );
    }

    #[test]
    fn flat_single_ticker_close() {
        let labels = flat(&["Open", "High", "Low", "Close", "Volume"]);
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![3]));
    }

    #[test]
    fn flat_single_ticker_takes_any_close_label() {
        let labels = flat(&["Open", "Last Close", "Volume"]);
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![1]));
        let labels = flat(&["Close (USD)", "Adj Close (USD)"]);
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![1]));
        // Several tickers still need columns naming them
        assert_eq!(
            select_columns(&flat(&["Last Close"]), &tickers(&["TSLA", "SPY"])),
            Err(ColumnResolutionError::MissingTicker("TSLA".into()))
        );
    }

    #[test]
    fn flat_prefers_adjusted_close() {
        let labels = flat(&["Open", "Close", "Adj Close", "Volume"]);
        assert_eq!(select_columns(&labels, &tickers(&["TSLA"])), Ok(vec![2]));
    }

    #[test]
    fn flat_labels_named_by_ticker() {
        let labels = flat(&[
            "TSLA Adj Close",
            "BND Adj Close",
            "TSLA Volume",
            "SPY_close",
            "Adjusted Close (BND)",
        ]);
        assert_eq!(
            select_columns(&labels, &tickers(&["SPY", "TSLA", "BND"])),
            Ok(vec![3, 0, 1])
        );
    }

    #[test]
    fn strips_every_price_token() {
        assert_eq!(strip_price_tokens("TSLA Adj Close"), "TSLA");
        assert_eq!(strip_price_tokens("Adjusted Close TSLA"), "TSLA");
        assert_eq!(strip_price_tokens("Close"), "");
        assert_eq!(strip_price_tokens("price_spy"), "spy");
    }

    #[test]
    fn no_price_column() {
        assert_eq!(
            select_columns(&two_level(&[("Volume", "TSLA"), ("Open", "TSLA")]), &tickers(&["TSLA"])),
            Err(ColumnResolutionError::NoPriceColumn { shape: "two-level" })
        );
        assert_eq!(
            select_columns(&flat(&["Open", "High", "Volume"]), &tickers(&["TSLA"])),
            Err(ColumnResolutionError::NoPriceColumn { shape: "flat" })
        );
    }

    #[test]
    fn extracts_values() {
        let raw = RawTable {
            index: vec!["2024-01-02".into(), "2024-01-03".into()],
            labels: two_level(&[("Adj Close", "BND"), ("Adj Close", "TSLA"), ("Volume", "TSLA")]),
            columns: vec![vec![72.1, 72.3], vec![248.42, 238.45], vec![1e8, 1.2e8]],
        };
        assert_eq!(
            adjusted_close(&raw, &tickers(&["TSLA", "BND"])).unwrap(),
            vec![vec![248.42, 238.45], vec![72.1, 72.3]]
        );
    }
}
