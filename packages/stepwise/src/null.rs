use crate::{KeyedReader, MetricKey, MetricMap, ReadMap, Reader, Reporter, Result, Step};

/// A [`Reporter`] that discards everything it is given.
///
/// Its reader is an [`EmptyReader`]. This is what
/// [`active_reporter()`][crate::active_reporter] returns when no reporter has been activated.
#[derive(Clone, Copy, Debug, Default)]
#[non_exhaustive]
pub struct NullReporter;

impl NullReporter {
    /// Creates a new null reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for NullReporter {
    fn report_all(&self, _step: Step, _metrics: MetricMap) -> Result<()> {
        Ok(())
    }

    fn reader(&self) -> Option<Box<dyn Reader>> {
        Some(Box::new(EmptyReader))
    }
}

/// A [`Reader`] that has no values for any key.
#[derive(Clone, Copy, Debug, Default)]
#[non_exhaustive]
pub struct EmptyReader;

impl EmptyReader {
    /// Creates a new empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Reader for EmptyReader {
    fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap> {
        Ok(keys.iter().map(|key| (key.clone(), Vec::new())).collect())
    }
}

impl KeyedReader for EmptyReader {
    fn keys(&self) -> Result<Vec<MetricKey>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{Metric, metrics, params};

    #[test]
    fn null_reporter_accepts_everything() {
        let reporter = NullReporter::new();

        reporter.report_all(0, metrics! { "a" => 1 }).unwrap();
        reporter.report(1, "b".into(), Metric::Int(2)).unwrap();
        reporter.report_params(params! { "c" => 3 }).unwrap();
        reporter.close().unwrap();
    }

    #[test]
    fn null_reporter_reads_back_nothing() {
        let reporter = NullReporter::new();
        reporter.report(0, "a".into(), Metric::Int(1)).unwrap();

        let reader = reporter.reader().unwrap();

        assert!(reader.read(&"a".into()).unwrap().is_empty());
    }

    #[test]
    fn empty_reader_returns_every_requested_key() {
        let values = EmptyReader::new()
            .read_all(&["x".into(), "y".into()])
            .unwrap();

        assert_eq!(values.len(), 2);
        assert!(values.values().all(Vec::is_empty));
    }

    #[test]
    fn empty_reader_has_no_keys() {
        assert!(EmptyReader::new().keys().unwrap().is_empty());
    }
}
