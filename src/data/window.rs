/*!
Sequence windows: the supervised form of a series
*/
use crate::{Error, GpuFloat, Result};

/// All overlapping windows of a series, each labelled with the value that follows it.
///
/// For a series of length `L` and window size `W` there are `L - W` windows; window `i` holds
/// positions `[i, i + W)` and its label is position `i + W`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindows {
    sequence_length: usize,
    inputs: Vec<GpuFloat>,
    labels: Vec<GpuFloat>,
}

/// One input window and its label
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SequenceWindow<'a> {
    /// `sequence_length` consecutive values
    pub input: &'a [GpuFloat],
    /// The value following `input`
    pub label: GpuFloat,
}

impl SequenceWindows {
    /// Window a series. Fails with [`Error::InsufficientData`] unless the series is strictly
    /// longer than the window.
    pub fn new(series: &[GpuFloat], sequence_length: usize) -> Result<SequenceWindows> {
        if sequence_length == 0 {
            return Err(Error::Config("sequence length must be positive".into()));
        }
        if series.len() <= sequence_length {
            return Err(Error::InsufficientData {
                rows: series.len(),
                sequence_length,
            });
        }
        let count = series.len() - sequence_length;
        let mut inputs = Vec::with_capacity(count * sequence_length);
        for window in series.windows(sequence_length).take(count) {
            inputs.extend_from_slice(window);
        }
        let labels = series[sequence_length..].to_vec();
        Ok(SequenceWindows {
            sequence_length,
            inputs,
            labels,
        })
    }

    /// The number of values in each window
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// The number of windows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no windows
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get a window
    pub fn get(&self, ix: usize) -> Option<SequenceWindow> {
        let label = *self.labels.get(ix)?;
        let start = ix * self.sequence_length;
        Some(SequenceWindow {
            input: &self.inputs[start..start + self.sequence_length],
            label,
        })
    }

    /// Iterate over the windows in series order
    pub fn iter(&self) -> impl Iterator<Item = SequenceWindow> + '_ {
        self.inputs
            .chunks_exact(self.sequence_length)
            .zip(self.labels.iter())
            .map(|(input, &label)| SequenceWindow { input, label })
    }

    /// All inputs, window after window
    pub fn inputs(&self) -> &[GpuFloat] {
        &self.inputs
    }

    /// All labels, in window order
    pub fn labels(&self) -> &[GpuFloat] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(len: usize) -> Vec<GpuFloat> {
        (0..len).map(|i| i as GpuFloat).collect()
    }

    #[test]
    fn four_hundred_rows_make_340_windows() {
        let values = series(400);
        let windows = SequenceWindows::new(&values, 60).unwrap();
        assert_eq!(windows.len(), 340);
        let first = windows.get(0).unwrap();
        assert_eq!(first.input, &values[0..60]);
        assert_eq!(first.label, values[60]);
        assert!(windows.get(340).is_none());
    }

    #[test]
    fn labels_and_last_inputs_rebuild_the_series() {
        let values: Vec<GpuFloat> = (0..37).map(|i| ((i * 7) % 11) as GpuFloat / 10.0).collect();
        for w in 1..values.len() {
            let windows = SequenceWindows::new(&values, w).unwrap();
            assert_eq!(windows.len(), values.len() - w);
            for (i, window) in windows.iter().enumerate() {
                assert_eq!(window.input, &values[i..i + w]);
                assert_eq!(window.label, values[i + w]);
            }
            let rebuilt: Vec<GpuFloat> = windows
                .iter()
                .map(|window| window.input[w - 1])
                .chain(std::iter::once(windows.labels()[windows.len() - 1]))
                .collect();
            assert_eq!(&rebuilt[..], &values[w - 1..]);
            assert_eq!(windows.labels(), &values[w..]);
        }
    }

    #[test]
    fn short_series_is_insufficient() {
        for len in [0, 1, 59, 60].iter().copied() {
            match SequenceWindows::new(&series(len), 60) {
                Err(Error::InsufficientData {
                    rows,
                    sequence_length: 60,
                }) => assert_eq!(rows, len),
                other => panic!("expected insufficient data, got {:?}", other),
            }
        }
    }

    #[test]
    fn zero_length_windows_are_rejected() {
        assert!(matches!(
            SequenceWindows::new(&series(3), 0),
            Err(Error::Config(_))
        ));
    }
}
