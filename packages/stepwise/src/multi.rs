use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use tracing::{debug, trace, warn};

use crate::{Metric, MetricKey, MetricMap, ParamMap, Reporter, Result, Step};

/// A [`Reporter`] that broadcasts every call to several reporters, in order.
///
/// Created by [`ReporterExt::plus()`][crate::ReporterExt::plus] or [`MultiReporter::new()`].
///
/// Reporting stops at the first reporter that fails and the error is returned; reporters after
/// it do not receive the call. Closing attempts every reporter and returns the first failure.
///
/// There is no single store to read back from, so [`reader()`][Reporter::reader] is `None`.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, Reporter, ReporterExt};
///
/// let primary = MemoryReporter::new();
/// let backup = MemoryReporter::new();
///
/// let both = primary.clone().plus(backup.clone());
/// both.report(0, "loss".into(), Metric::from(0.3)).unwrap();
///
/// assert_eq!(primary.memory_reader().read(&"loss".into()).unwrap().len(), 1);
/// assert_eq!(backup.memory_reader().read(&"loss".into()).unwrap().len(), 1);
/// ```
pub struct MultiReporter<R = Box<dyn Reporter>> {
    reporters: Vec<R>,
}

impl<R> MultiReporter<R>
where
    R: Reporter,
{
    /// Broadcasts to `reporters` in the order given.
    #[must_use]
    pub fn new(reporters: Vec<R>) -> Self {
        Self { reporters }
    }

    /// The reporters that receive the broadcast.
    #[must_use]
    pub fn reporters(&self) -> &[R] {
        &self.reporters
    }

    fn each(&self, mut f: impl FnMut(&R) -> Result<()>) -> Result<()> {
        for reporter in &self.reporters {
            f(reporter)?;
        }

        Ok(())
    }
}

impl MultiReporter {
    /// Adds one more reporter to the end of the broadcast.
    #[must_use]
    pub fn plus(mut self, other: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(other));
        self
    }
}

impl<R> Reporter for MultiReporter<R>
where
    R: Reporter,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        trace!(step, reporters = self.reporters.len(), "broadcasting metrics");

        self.each(|reporter| reporter.report_all(step, metrics.clone()))
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.each(|reporter| reporter.report(step, key.clone(), value.clone()))
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        self.each(|reporter| reporter.report_params(params.clone()))
    }

    fn report_param(&self, key: &str, value: Metric) -> Result<()> {
        self.each(|reporter| reporter.report_param(key, value.clone()))
    }

    fn close(&self) -> Result<()> {
        debug!(reporters = self.reporters.len(), "closing broadcast reporters");

        let mut first_error = None;

        for (index, reporter) in self.reporters.iter().enumerate() {
            let Err(error) = reporter.close() else {
                continue;
            };

            if first_error.is_none() {
                first_error = Some(error);
            } else {
                warn!(index, %error, "reporter failed to close after an earlier reporter had already failed");
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<R> Debug for MultiReporter<R> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("reporters", &self.reporters.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io;

    use mockall::Sequence;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        Error, KeyedReader, MemoryReporter, MockReporter, Reader, ReporterExt, metrics, params,
    };

    fn failing_close() -> MockReporter {
        let mut mock = MockReporter::new();
        mock.expect_close()
            .times(1)
            .returning(|| Err(Error::Io(io::Error::other("close failed"))));
        mock
    }

    fn clean_close() -> MockReporter {
        let mut mock = MockReporter::new();
        mock.expect_close().times(1).returning(|| Ok(()));
        mock
    }

    #[test]
    fn broadcasts_to_every_reporter_in_order() {
        let mut sequence = Sequence::new();

        let mut first = MockReporter::new();
        first
            .expect_report_all()
            .with(eq(1), eq(metrics! { "a" => 1 }))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));

        let mut second = MockReporter::new();
        second
            .expect_report_all()
            .with(eq(1), eq(metrics! { "a" => 1 }))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));

        first.plus(second).report_all(1, metrics! { "a" => 1 }).unwrap();
    }

    #[test]
    fn same_store_twice_records_twice() {
        let store = MemoryReporter::new();

        let multi = MultiReporter::new(vec![store.clone(), store.clone(), store.clone()]);
        multi.report(0, "a".into(), Metric::Int(1)).unwrap();

        assert_eq!(store.memory_reader().keys().unwrap().len(), 1);
        assert_eq!(store.memory_reader().read(&"a".into()).unwrap().len(), 3);
    }

    #[test]
    fn report_stops_at_first_error() {
        let mut failing = MockReporter::new();
        failing
            .expect_report()
            .times(1)
            .returning(|_, _, _| Err(Error::Io(io::Error::other("full"))));

        // Any call to the second reporter would fail the test as unexpected.
        let untouched = MockReporter::new();

        let result = failing.plus(untouched).report(0, "a".into(), Metric::Int(1));

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn params_are_broadcast_unchanged() {
        let first = MemoryReporter::new();
        let second = MemoryReporter::new();

        first
            .clone()
            .plus(second.clone())
            .report_params(params! { "seed" => 4 })
            .unwrap();

        assert_eq!(first.params(), params! { "seed" => 4 });
        assert_eq!(second.params(), params! { "seed" => 4 });
    }

    #[test]
    fn close_attempts_every_reporter_and_returns_first_error() {
        let multi = failing_close().plus(clean_close()).plus(failing_close());

        assert!(matches!(multi.close(), Err(Error::Io(_))));
    }

    #[test]
    fn close_succeeds_when_all_succeed() {
        clean_close().plus(clean_close()).close().unwrap();
    }

    #[test]
    fn plus_on_multi_appends_instead_of_nesting() {
        let multi = MemoryReporter::new()
            .plus(MemoryReporter::new())
            .plus(MemoryReporter::new());

        assert_eq!(multi.reporters().len(), 3);
    }

    #[test]
    fn has_no_reader() {
        assert!(
            MemoryReporter::new()
                .plus(MemoryReporter::new())
                .reader()
                .is_none()
        );
    }
}
